//! Canonical Huffman decode tables.
//!
//! A table consists of two parts:
//! - a direct lookup array indexed by the top `table_bits` bits of the bit window. Every entry whose index has a
//!   short symbol's code as a prefix holds that symbol. For example, if `100b` encodes symbol 0xB and the table is
//!   12 bits wide, entries `100xxxxxxxxxb` (0x800 to 0x9FF) all hold 0xB.
//! - an overflow tree for codes longer than `table_bits`. The direct entry for such a code's prefix holds the index
//!   of a tree node instead of a symbol. Indexes below the alphabet size are symbols; indexes at or above it are
//!   nodes in a [`NodeArena`]. Decoding walks the tree one window bit at a time, 1 selecting `right` and 0 `left`,
//!   until it lands on a symbol.
//!
//! Bits are always consumed by the decoded symbol's own code length, never by the number of tree steps taken.

use alloc::{vec, vec::Vec};

use crate::{
    bit_window::{BitWindow, WINDOW_BITS},
    error::{Lz77Error, TableFault},
    source::ByteSource,
};

/// Longest code length the format allows.
pub(crate) const MAX_CODE_LENGTH: usize = 16;

/// Marks a lookup entry or tree child that has not been assigned.
const UNSET: u16 = u16::MAX;

/// Backing store for the overflow tree's internal nodes.
///
/// Node handles start at the alphabet size so they never collide with symbols. An alphabet of `n` symbols has at
/// most `n - 1` internal nodes, so handles stay below `2n - 1`.
#[derive(Debug, Clone)]
pub(crate) struct NodeArena {
    first: usize,
    capacity: usize,
    left: Vec<u16>,
    right: Vec<u16>,
}

impl NodeArena {
    fn new(symbol_count: usize) -> Self {
        let capacity = (2 * symbol_count).saturating_sub(1);
        Self { first: symbol_count, capacity, left: Vec::new(), right: Vec::new() }
    }

    fn alloc(&mut self) -> Result<u16, TableFault> {
        let handle = self.first + self.left.len();
        if handle >= self.capacity || handle >= UNSET as usize {
            Err(TableFault::ArenaExhausted)?;
        }
        self.left.push(UNSET);
        self.right.push(UNSET);
        Ok(handle as u16)
    }

    fn slot(&self, handle: u16) -> Result<usize, TableFault> {
        (handle as usize)
            .checked_sub(self.first)
            .filter(|idx| *idx < self.left.len())
            .ok_or(TableFault::SymbolOutOfRange(handle))
    }

    fn child(&self, handle: u16, bit: bool) -> Result<u16, TableFault> {
        let idx = self.slot(handle)?;
        Ok(if bit { self.right[idx] } else { self.left[idx] })
    }

    fn len(&self) -> usize {
        self.left.len()
    }
}

// Where a value is stored while the overflow tree is being built.
enum TablePointer {
    Table(usize),
    Left(u16),
    Right(u16),
}

impl TablePointer {
    fn get(&self, lookup: &[u16], arena: &NodeArena) -> Result<u16, TableFault> {
        match self {
            TablePointer::Table(idx) => Ok(lookup[*idx]),
            TablePointer::Left(node) => arena.child(*node, false),
            TablePointer::Right(node) => arena.child(*node, true),
        }
    }

    fn set(&self, lookup: &mut [u16], arena: &mut NodeArena, val: u16) -> Result<(), TableFault> {
        match self {
            TablePointer::Table(idx) => lookup[*idx] = val,
            TablePointer::Left(node) => {
                let idx = arena.slot(*node)?;
                arena.left[idx] = val;
            }
            TablePointer::Right(node) => {
                let idx = arena.slot(*node)?;
                arena.right[idx] = val;
            }
        }
        Ok(())
    }
}

/// A decode table for one alphabet, immutable once built.
#[derive(Debug, Clone)]
pub(crate) struct HuffmanTable {
    table_bits: usize,
    lookup: Vec<u16>,
    arena: NodeArena,
    lengths: Vec<u8>,
}

impl HuffmanTable {
    /// Builds a table from a per-symbol code length array (0 = unused symbol).
    ///
    /// The lengths must describe a complete canonical code: the sum of `count[len] << (16 - len)` over all lengths
    /// must be exactly `1 << 16`. Anything else, including an array with no used symbols, is rejected.
    pub(crate) fn build(lengths: &[u8], table_bits: usize) -> Result<Self, TableFault> {
        if table_bits == 0 || table_bits > MAX_CODE_LENGTH {
            Err(TableFault::IndexOverflow)?;
        }
        let symbol_count = lengths.len();
        if symbol_count >= UNSET as usize {
            Err(TableFault::SymbolOutOfRange(UNSET))?;
        }

        // number of symbols for each code length.
        let mut count = [0u32; MAX_CODE_LENGTH + 1];
        for &len in lengths {
            if len as usize > MAX_CODE_LENGTH {
                Err(TableFault::CodeLengthTooLong(len))?;
            }
            count[len as usize] += 1;
        }

        // left-aligned 16-bit code of the first symbol of each length.
        let mut start = [0u32; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            start[len + 1] = start[len] + (count[len] << (MAX_CODE_LENGTH - len));
        }
        if start[MAX_CODE_LENGTH + 1] != 1 << MAX_CODE_LENGTH {
            Err(TableFault::IncompleteCode)?;
        }

        let extended_bits = MAX_CODE_LENGTH - table_bits;
        let table_len = 1usize << table_bits;
        let mut lookup = vec![UNSET; table_len];
        let mut arena = NodeArena::new(symbol_count);

        for (symbol, &len) in lengths.iter().enumerate() {
            let len = len as usize;
            if len == 0 {
                continue;
            }
            let code = start[len];
            let next_code = code + (1 << (MAX_CODE_LENGTH - len));

            if len <= table_bits {
                let lo = (code >> extended_bits) as usize;
                let hi = (next_code >> extended_bits) as usize;
                if lo >= hi || hi > table_len {
                    Err(TableFault::IndexOverflow)?;
                }
                lookup[lo..hi].fill(symbol as u16);
            } else {
                let mut pointer = TablePointer::Table((code >> extended_bits) as usize);
                for step in 0..len - table_bits {
                    let mut node = pointer.get(&lookup, &arena)?;
                    if node == UNSET {
                        node = arena.alloc()?;
                        pointer.set(&mut lookup, &mut arena, node)?;
                    } else if (node as usize) < symbol_count {
                        // a shorter code is a prefix of this one.
                        Err(TableFault::BrokenTree)?;
                    }
                    let bit = (code >> (MAX_CODE_LENGTH - 1 - table_bits - step)) & 1 != 0;
                    pointer = if bit { TablePointer::Right(node) } else { TablePointer::Left(node) };
                }
                if pointer.get(&lookup, &arena)? != UNSET {
                    Err(TableFault::BrokenTree)?;
                }
                pointer.set(&mut lookup, &mut arena, symbol as u16)?;
            }

            start[len] = next_code;
        }

        log::trace!(
            "built {}-bit table for {} symbols ({} overflow nodes)",
            table_bits,
            symbol_count,
            arena.len()
        );
        Ok(Self { table_bits, lookup, arena, lengths: lengths.to_vec() })
    }

    /// Builds the degenerate table of an alphabet with a single used symbol.
    ///
    /// Every bit pattern decodes to `symbol` and no bits are consumed.
    pub(crate) fn single(symbol_count: usize, table_bits: usize, symbol: u16) -> Result<Self, TableFault> {
        if symbol as usize >= symbol_count {
            Err(TableFault::SymbolOutOfRange(symbol))?;
        }
        if table_bits == 0 || table_bits > MAX_CODE_LENGTH {
            Err(TableFault::IndexOverflow)?;
        }
        Ok(Self {
            table_bits,
            lookup: vec![symbol; 1 << table_bits],
            arena: NodeArena::new(symbol_count),
            lengths: vec![0; symbol_count],
        })
    }

    pub(crate) fn symbol_count(&self) -> usize {
        self.lengths.len()
    }

    /// Decodes one symbol from the window and consumes its code.
    pub(crate) fn decode<S: ByteSource + ?Sized>(&self, window: &mut BitWindow<'_, S>) -> Result<u16, Lz77Error> {
        let mut symbol = self.lookup[window.peek(self.table_bits) as usize];
        let mut bit_idx = self.table_bits;
        while symbol as usize >= self.symbol_count() {
            if symbol == UNSET || bit_idx >= WINDOW_BITS {
                Err(TableFault::BrokenTree)?;
            }
            symbol = self.arena.child(symbol, window.bit(bit_idx))?;
            bit_idx += 1;
        }
        window.consume(self.lengths[symbol as usize] as usize)?;
        Ok(symbol)
    }
}
