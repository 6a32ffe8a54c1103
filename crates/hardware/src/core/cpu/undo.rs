//! Undo frames for backward stepping.
//!
//! A frame holds, for one tick, the pre-tick value of every tracked component that was
//! mutated during the tick plus the journals of main memory and the predictor tables.
//! Components that were not touched cost nothing.

use super::{CpuState, Status};
use crate::core::arch::RegisterFile;
use crate::core::instruction::InstructionArena;
use crate::core::pipeline::decode::DecodeUnit;
use crate::core::pipeline::fetch::FetchUnit;
use crate::core::pipeline::issue::IssueWindow;
use crate::core::pipeline::rob::Rob;
use crate::core::units::bru::btb::BtbEntry;
use crate::core::units::bru::{BitPredictor, Ghr};
use crate::core::units::cache::Cache;
use crate::core::units::fu::FunctionalUnit;
use crate::core::units::lsu::{LoadBuffer, StoreBuffer};
use crate::core::units::memory::JournalEntry;
use crate::stats::SimStats;

macro_rules! undo_frame {
    ($($field:ident: $ty:ty),* $(,)?) => {
        /// State captured while simulating one tick.
        #[derive(Debug, Clone, Default)]
        pub struct UndoFrame {
            /// Tick counter before the tick.
            pub tick: u64,
            /// Main memory bytes overwritten during the tick.
            pub memory: Vec<JournalEntry>,
            /// Branch target buffer entries overwritten during the tick.
            pub btb: Vec<(usize, BtbEntry)>,
            /// Pattern history table entries overwritten during the tick.
            pub pht: Vec<(usize, BitPredictor)>,
            $(
                #[doc = concat!("Pre-tick `", stringify!($field), "`, if it changed.")]
                pub $field: Option<$ty>,
            )*
        }

        impl CpuState {
            /// Collects the captures of the tick that started at `prev_tick` and opens a
            /// new capture window.
            pub fn take_undo(&mut self, prev_tick: u64) -> UndoFrame {
                UndoFrame {
                    tick: prev_tick,
                    memory: self.memory.take_journal(),
                    btb: self.btb.take_journal(),
                    pht: self.pht.take_journal(),
                    $($field: self.$field.take_before(),)*
                }
            }

            /// Drops the captures of the current tick without recording them.
            pub fn seal_undo(&mut self) {
                let _ = self.memory.take_journal();
                let _ = self.btb.take_journal();
                let _ = self.pht.take_journal();
                $(self.$field.seal();)*
            }

            /// Steps back over the tick recorded in `frame`.
            pub fn apply_undo(&mut self, frame: UndoFrame) {
                self.tick = frame.tick;
                self.memory.undo(&frame.memory);
                self.btb.undo(&frame.btb);
                self.pht.undo(&frame.pht);
                $(
                    if let Some(value) = frame.$field {
                        self.$field.restore(value);
                    }
                )*
            }
        }

        impl UndoFrame {
            /// Number of components the tick changed.
            pub fn changed(&self) -> usize {
                let journals = [
                    !self.memory.is_empty(),
                    !self.btb.is_empty(),
                    !self.pht.is_empty(),
                ];
                journals.iter().filter(|&&c| c).count()
                    $(+ usize::from(self.$field.is_some()))*
            }
        }
    };
}

undo_frame! {
    arena: InstructionArena,
    fetch: FetchUnit,
    decode: DecodeUnit,
    rob: Rob,
    regs: RegisterFile,
    ghr: Ghr,
    windows: Vec<IssueWindow>,
    units: Vec<FunctionalUnit>,
    load_buffer: LoadBuffer,
    store_buffer: StoreBuffer,
    cache: Option<Cache>,
    stats: SimStats,
    call_depth: u64,
    status: Status,
}
