//! String literal interning: each distinct literal gets one data
//! segment, lazily hashed/compared by the runtime-side `$stringGetByte`
//! helper (spec §6).

use std::collections::HashMap;

use crate::wasm::ModuleBuilder;

#[derive(Default)]
pub struct StringTable {
    segments: HashMap<String, u32>,
}

impl StringTable {
    /// Returns the data segment index for `literal`, creating one the
    /// first time this literal is seen so repeated occurrences of the
    /// same string share a segment.
    pub fn intern(&mut self, builder: &mut ModuleBuilder, literal: &str) -> u32 {
        if let Some(&index) = self.segments.get(literal) {
            return index;
        }
        let index = builder.add_data_segment(literal.as_bytes().to_vec());
        self.segments.insert(literal.to_string(), index);
        index
    }
}

/// FNV-1a, used for the lazily computed string hash cached on first
/// access by `$stringGetByte`-adjacent helpers rather than recomputed
/// per comparison.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c9dc5;
    for &byte in bytes {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}
