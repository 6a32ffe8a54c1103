//! Placement of initialized data in simulated memory.
//!
//! Memory is laid out as:
//! 1. **Call stack:** `[0, callStackSize)`, growing down from `callStackSize`.
//! 2. **Configured locations:** each `memoryLocations` entry, aligned to `2^alignment`.
//! 3. **Data section:** the program's `.data` bytes, aligned to its largest `.align`.

use std::collections::BTreeMap;

use super::parser::DataSection;
use crate::common::error::ParseError;
use crate::config::{MemoryConfig, MemoryLocation};

/// Largest accepted alignment exponent of a configured location.
const MAX_LOCATION_ALIGNMENT: u32 = 12;

/// Initialized bytes at a fixed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataBlock {
    /// Label of the block (`.data` for the program's data section).
    pub name: String,
    /// First byte address.
    pub address: u64,
    /// Contents.
    pub bytes: Vec<u8>,
}

impl DataBlock {
    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.address + self.bytes.len() as u64
    }
}

/// Placed data blocks.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Blocks in address order.
    pub blocks: Vec<DataBlock>,
    /// Index of the `.data` section block, if the program has one.
    pub section: Option<usize>,
}

const fn align_up(value: u64, exponent: u32) -> u64 {
    let step = 1u64 << exponent;
    value.div_ceil(step) * step
}

/// Assigns addresses to configured locations and the data section.
///
/// Labels of both are added to `labels`; conflicts and overflow of main memory are
/// appended to `errors`.
pub fn place(
    memory: &MemoryConfig,
    locations: &[MemoryLocation],
    section: &DataSection,
    labels: &mut BTreeMap<String, u64>,
    errors: &mut Vec<ParseError>,
) -> Layout {
    let mut layout = Layout::default();
    let mut cursor = memory.call_stack_size as u64;

    for location in locations {
        if location.alignment > MAX_LOCATION_ALIGNMENT {
            errors.push(ParseError::new(
                0,
                format!(
                    "memory location '{}' alignment 2^{} exceeds 2^{MAX_LOCATION_ALIGNMENT}",
                    location.name, location.alignment
                ),
            ));
            continue;
        }
        cursor = align_up(cursor, location.alignment);
        define(labels, &location.name, cursor, 0, errors);
        let block = DataBlock {
            name: location.name.clone(),
            address: cursor,
            bytes: location.to_bytes(),
        };
        cursor = block.end();
        layout.blocks.push(block);
    }

    if !section.bytes.is_empty() || !section.labels.is_empty() {
        cursor = align_up(cursor, section.alignment);
        for label in &section.labels {
            define(labels, &label.name, cursor + label.position as u64, label.line, errors);
        }
        let block = DataBlock {
            name: ".data".to_string(),
            address: cursor,
            bytes: section.bytes.clone(),
        };
        cursor = block.end();
        layout.section = Some(layout.blocks.len());
        layout.blocks.push(block);
    }

    if cursor > memory.memory_size as u64 {
        errors.push(ParseError::new(
            0,
            format!(
                "data ends at {cursor:#x}, beyond the {} byte main memory",
                memory.memory_size
            ),
        ));
    }
    layout
}

/// Writes label addresses into `.word`-style references of the data section.
pub fn apply_fixups(
    layout: &mut Layout,
    section: &DataSection,
    labels: &BTreeMap<String, u64>,
    errors: &mut Vec<ParseError>,
) {
    let Some(block) = layout.section.and_then(|i| layout.blocks.get_mut(i)) else {
        return;
    };
    for fixup in &section.fixups {
        let Some(&address) = labels.get(&fixup.label) else {
            errors.push(ParseError::new(
                fixup.line,
                format!("unknown label '{}'", fixup.label),
            ));
            continue;
        };
        let end = fixup.offset + fixup.size;
        if let Some(slot) = block.bytes.get_mut(fixup.offset..end) {
            slot.copy_from_slice(&address.to_le_bytes()[..fixup.size]);
        }
    }
}

/// Adds `name` to the label table, reporting duplicates.
pub fn define(
    labels: &mut BTreeMap<String, u64>,
    name: &str,
    address: u64,
    line: usize,
    errors: &mut Vec<ParseError>,
) {
    if labels.insert(name.to_string(), address).is_some() {
        errors.push(ParseError::new(line, format!("label '{name}' is defined twice")));
    }
}
