//! Assembly source reader.
//!
//! Splits source text into instruction statements, label definitions and the bytes of
//! the `.data` section. Operands are kept as text here; binding them to registers,
//! immediates and label addresses happens once every label is known.

use crate::common::error::ParseError;

/// One instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Mnemonic as written.
    pub mnemonic: String,
    /// Operand tokens in source order.
    pub operands: Vec<String>,
    /// 1-based source line.
    pub line: usize,
}

/// A label and the position it marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelDef {
    /// Label name.
    pub name: String,
    /// Instruction index (code labels) or byte offset (data labels).
    pub position: usize,
    /// 1-based source line.
    pub line: usize,
}

/// A data word whose value is a label address, patched after layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixup {
    /// Byte offset in the data section.
    pub offset: usize,
    /// Width of the patched value in bytes.
    pub size: usize,
    /// Referenced label.
    pub label: String,
    /// 1-based source line.
    pub line: usize,
}

/// Contents of the `.data` section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSection {
    /// Initialized bytes.
    pub bytes: Vec<u8>,
    /// Labels defined inside the section.
    pub labels: Vec<LabelDef>,
    /// Label references to patch.
    pub fixups: Vec<Fixup>,
    /// Largest alignment exponent requested; the section start is aligned to it.
    pub alignment: u32,
}

/// Everything read from one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceUnit {
    /// Instructions in program order.
    pub statements: Vec<Statement>,
    /// Labels of the `.text` section.
    pub code_labels: Vec<LabelDef>,
    /// The `.data` section.
    pub data: DataSection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Text,
    Data,
}

/// Largest accepted alignment exponent.
const MAX_ALIGNMENT: u32 = 12;

/// Reads `source`, appending every problem to `errors`.
pub fn read_source(source: &str, errors: &mut Vec<ParseError>) -> SourceUnit {
    let mut unit = SourceUnit::default();
    let mut section = Section::Text;

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let mut text = strip_comment(raw).trim();

        while let Some((name, rest)) = split_label(text) {
            let label = match section {
                Section::Text => LabelDef {
                    name: name.to_string(),
                    position: unit.statements.len(),
                    line,
                },
                Section::Data => LabelDef {
                    name: name.to_string(),
                    position: unit.data.bytes.len(),
                    line,
                },
            };
            match section {
                Section::Text => unit.code_labels.push(label),
                Section::Data => unit.data.labels.push(label),
            }
            text = rest.trim();
        }
        if text.is_empty() {
            continue;
        }

        let (head, rest) = text
            .split_once(char::is_whitespace)
            .map_or((text, ""), |(h, r)| (h, r.trim()));

        if head.starts_with('.') {
            if let Some(next) = section_switch(head, rest) {
                section = next;
                continue;
            }
            if !is_data_directive(head) {
                tracing::trace!(line, directive = head, "ignoring directive");
                continue;
            }
            if section == Section::Text {
                errors.push(ParseError::new(
                    line,
                    format!("data directive {head} outside of the .data section"),
                ));
                continue;
            }
            if let Err(message) = data_directive(&mut unit.data, head, rest, line) {
                errors.push(ParseError::new(line, message));
            }
            continue;
        }

        if section == Section::Data {
            errors.push(ParseError::new(
                line,
                format!("instruction '{head}' inside the .data section"),
            ));
            continue;
        }

        unit.statements.push(Statement {
            mnemonic: head.to_string(),
            operands: rest
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            line,
        });
    }
    unit
}

/// Removes `#`, `;` and `//` comments outside string literals.
fn strip_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut escaped = false;
    for (i, &c) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == b'\\' {
                escaped = true;
            } else if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'#' | b';' => return &line[..i],
            b'/' if bytes.get(i + 1) == Some(&b'/') => return &line[..i],
            _ => {}
        }
    }
    line
}

fn split_label(text: &str) -> Option<(&str, &str)> {
    let (name, rest) = text.split_once(':')?;
    let name = name.trim();
    is_identifier(name).then_some((name, rest))
}

/// Label names: letters, digits, `_`, `.` and `$`, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with(|c: char| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$'))
}

fn section_switch(head: &str, rest: &str) -> Option<Section> {
    match head {
        ".text" => Some(Section::Text),
        ".data" | ".rodata" | ".bss" | ".sdata" => Some(Section::Data),
        ".section" => Some(if rest.starts_with(".text") {
            Section::Text
        } else {
            Section::Data
        }),
        _ => None,
    }
}

fn is_data_directive(head: &str) -> bool {
    matches!(
        head,
        ".byte"
            | ".half"
            | ".short"
            | ".2byte"
            | ".word"
            | ".long"
            | ".4byte"
            | ".dword"
            | ".quad"
            | ".8byte"
            | ".float"
            | ".double"
            | ".zero"
            | ".space"
            | ".skip"
            | ".align"
            | ".p2align"
            | ".balign"
            | ".ascii"
            | ".asciz"
            | ".string"
    )
}

fn data_directive(data: &mut DataSection, head: &str, args: &str, line: usize) -> Result<(), String> {
    let items = || args.split(',').map(str::trim).filter(|s| !s.is_empty());
    match head {
        ".byte" | ".half" | ".short" | ".2byte" | ".word" | ".long" | ".4byte" | ".dword"
        | ".quad" | ".8byte" => {
            let size = match head {
                ".byte" => 1,
                ".half" | ".short" | ".2byte" => 2,
                ".word" | ".long" | ".4byte" => 4,
                _ => 8,
            };
            for item in items() {
                if let Some(value) = parse_integer(item) {
                    data.bytes
                        .extend_from_slice(&value.to_le_bytes()[..size]);
                } else if is_identifier(item) {
                    data.fixups.push(Fixup {
                        offset: data.bytes.len(),
                        size,
                        label: item.to_string(),
                        line,
                    });
                    data.bytes.extend(std::iter::repeat_n(0, size));
                } else {
                    return Err(format!("invalid value '{item}' for {head}"));
                }
            }
        }
        ".float" => {
            for item in items() {
                let value: f32 = item
                    .parse()
                    .map_err(|_| format!("invalid float '{item}'"))?;
                data.bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        ".double" => {
            for item in items() {
                let value: f64 = item
                    .parse()
                    .map_err(|_| format!("invalid double '{item}'"))?;
                data.bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        ".zero" | ".space" | ".skip" => {
            let count = parse_integer(args)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| format!("invalid size '{args}'"))?;
            data.bytes.extend(std::iter::repeat_n(0, count));
        }
        ".align" | ".p2align" | ".balign" => {
            let first = items().next().unwrap_or("");
            let value = parse_integer(first)
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| format!("invalid alignment '{first}'"))?;
            let exponent = if head == ".balign" {
                if !value.is_power_of_two() {
                    return Err(format!("alignment {value} is not a power of two"));
                }
                value.trailing_zeros()
            } else {
                value
            };
            if exponent > MAX_ALIGNMENT {
                return Err(format!("alignment 2^{exponent} exceeds 2^{MAX_ALIGNMENT}"));
            }
            data.alignment = data.alignment.max(exponent);
            let step = 1usize << exponent;
            let padded = data.bytes.len().div_ceil(step) * step;
            data.bytes.resize(padded, 0);
        }
        ".ascii" | ".asciz" | ".string" => {
            let mut bytes = parse_string(args)?;
            if head != ".ascii" {
                bytes.push(0);
            }
            data.bytes.extend_from_slice(&bytes);
        }
        _ => return Err(format!("unsupported directive {head}")),
    }
    Ok(())
}

/// Parses decimal, `0x` hexadecimal, `0b` binary and `'c'` character literals.
pub fn parse_integer(token: &str) -> Option<i64> {
    let token = token.trim();
    if let Some(ch) = token.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        let mut chars = ch.chars();
        let c = chars.next()?;
        return chars.next().is_none().then_some(c as i64);
    }
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let magnitude = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16).ok()? as i64
    } else if let Some(bin) = digits.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()? as i64
    } else if digits.starts_with(|c: char| c.is_ascii_digit()) {
        digits.parse::<u64>().ok()? as i64
    } else {
        return None;
    };
    Some(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}

fn parse_string(args: &str) -> Result<Vec<u8>, String> {
    let inner = args
        .trim()
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("expected a quoted string, found '{args}'"))?;
    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let escaped = match chars.next() {
            Some('n') => b'\n',
            Some('t') => b'\t',
            Some('r') => b'\r',
            Some('0') => 0,
            Some('\\') => b'\\',
            Some('"') => b'"',
            Some('\'') => b'\'',
            other => return Err(format!("unknown escape sequence \\{}", other.unwrap_or(' '))),
        };
        out.push(escaped);
    }
    Ok(out)
}
