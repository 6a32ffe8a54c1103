/// In-place quicksort (Lomuto partition) of the 16 ints at `arr`, called from the entry
/// point, which returns afterwards.
pub const QUICKSORT: &str = r"
main:
    la   a0, arr
    li   a1, 0
    li   a2, 15
    addi sp, sp, -4
    sw   ra, 0(sp)
    call qsort
    lw   ra, 0(sp)
    addi sp, sp, 4
    ret

# qsort(a0 = base, a1 = lo, a2 = hi)
qsort:
    bge  a1, a2, qs_done
    addi sp, sp, -16
    sw   ra, 12(sp)
    sw   s0, 8(sp)
    sw   s1, 4(sp)
    sw   s2, 0(sp)
    mv   s0, a1
    mv   s1, a2
    slli t0, s1, 2
    add  t0, a0, t0
    lw   t1, 0(t0)          # pivot = arr[hi]
    addi t2, s0, -1         # i = lo - 1
    mv   t3, s0             # j = lo
qs_loop:
    bge  t3, s1, qs_place
    slli t4, t3, 2
    add  t4, a0, t4
    lw   t5, 0(t4)
    bgt  t5, t1, qs_next
    addi t2, t2, 1
    slli t6, t2, 2
    add  t6, a0, t6
    lw   a3, 0(t6)
    sw   t5, 0(t6)
    sw   a3, 0(t4)
qs_next:
    addi t3, t3, 1
    j    qs_loop
qs_place:
    addi t2, t2, 1
    slli t6, t2, 2
    add  t6, a0, t6
    lw   a3, 0(t6)
    sw   a3, 0(t0)
    sw   t1, 0(t6)
    mv   s2, t2
    mv   a1, s0
    addi a2, s2, -1
    call qsort
    addi a1, s2, 1
    mv   a2, s1
    call qsort
    lw   s2, 0(sp)
    lw   s1, 4(sp)
    lw   s0, 8(sp)
    lw   ra, 12(sp)
    addi sp, sp, 16
qs_done:
    ret
";

/// Unsorted input of [`QUICKSORT`].
pub const QUICKSORT_INPUT: [i64; 16] = [9, 3, 14, 1, 16, 7, 12, 5, 2, 11, 15, 4, 8, 13, 6, 10];

/// Counts `x1` down from 10; the `bnez` is taken 9 times out of 10.
pub const COUNTDOWN: &str = r"
    li   x1, 10
loop:
    addi x1, x1, -1
    bnez x1, loop
";
