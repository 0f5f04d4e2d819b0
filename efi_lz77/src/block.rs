//! Block header parsing and per-block Huffman table rebuilds.
//!
//! Nomenclature: Char&Len set = 'C', Position set = 'P', Extra set = 'T'.
//!
//! Every block starts with a 16-bit count of Char&Len symbols, followed by the code length arrays of the Extra set,
//! the Char&Len set and the Position set, in that order. The Extra set only exists to compress the Char&Len length
//! array and is dropped once that table is built.
//!
//! Refer to UEFI Specification 2.10, section 19.2.3.1.

use alloc::vec;

use crate::{
    bit_window::{BitWindow, WINDOW_BITS},
    error::{Lz77Error, SymbolSet, TableFault},
    huffman::{HuffmanTable, MAX_CODE_LENGTH},
    source::ByteSource,
    variant::FormatVariant,
};

//Size of Char&Len set
pub(crate) const NC: usize = 0xFF + 256 + 2 - 3;
pub(crate) const CBIT: usize = 9;
const CTABLE_BITSIZE: usize = 12;

//Size of Extra Set
pub(crate) const NT: usize = MAX_CODE_LENGTH + 3;
pub(crate) const TBIT: usize = 5;
const PTABLE_BITSIZE: usize = 8;

//Size of Position Set (count field width depends on the variant)
pub(crate) const MAXNP: usize = 31;

const BLOCK_SIZE_BITS: usize = 16;

/// Decodes Char&Len and Position symbols, rebuilding the tables at every block boundary.
pub(crate) struct BlockCodec {
    variant: FormatVariant,
    remaining: u32,
    char_table: Option<HuffmanTable>,
    position_table: Option<HuffmanTable>,
}

impl BlockCodec {
    pub(crate) fn new(variant: FormatVariant) -> Self {
        Self { variant, remaining: 0, char_table: None, position_table: None }
    }

    /// Returns the next Char&Len symbol, reading a new block header first if the current block is exhausted.
    pub(crate) fn next_symbol<S: ByteSource + ?Sized>(
        &mut self,
        window: &mut BitWindow<'_, S>,
    ) -> Result<u16, Lz77Error> {
        if self.remaining == 0 {
            self.read_block_header(window)?;
        }
        if self.remaining == 0 {
            Err(Lz77Error::NoBlocksRemained)?;
        }
        self.remaining -= 1;
        match &self.char_table {
            Some(table) => table.decode(window),
            None => Err(TableFault::BrokenTree.into()),
        }
    }

    /// Decodes a String Position value.
    ///
    /// The Huffman-coded Position symbol `v` is the bit length of the value. For `v <= 1` the value is `v` itself;
    /// otherwise `v - 1` raw bits follow, holding the value without its implicit leading 1. For example, 18 is coded
    /// as the symbol for 5 followed by `0010b`.
    pub(crate) fn decode_position<S: ByteSource + ?Sized>(
        &self,
        window: &mut BitWindow<'_, S>,
    ) -> Result<usize, Lz77Error> {
        let table = self.position_table.as_ref().ok_or(TableFault::BrokenTree)?;
        let val = table.decode(window)? as usize;
        if val <= 1 {
            return Ok(val);
        }
        let extra_bits = val - 1;
        if extra_bits > WINDOW_BITS {
            Err(TableFault::SymbolOutOfRange(val as u16))?;
        }
        Ok((1 << extra_bits) + window.take(extra_bits)? as usize)
    }

    fn read_block_header<S: ByteSource + ?Sized>(&mut self, window: &mut BitWindow<'_, S>) -> Result<(), Lz77Error> {
        self.remaining = window.take(BLOCK_SIZE_BITS)?;
        log::trace!("{} block header: {} symbols", self.variant, self.remaining);

        let extra = read_pt_len(window, NT, TBIT, Some(3)).map_err(|err| err.in_table(SymbolSet::Extra))?;
        self.char_table = Some(read_c_len(window, &extra).map_err(|err| err.in_table(SymbolSet::CharLength))?);
        self.position_table = Some(
            read_pt_len(window, MAXNP, self.variant.position_bits(), None)
                .map_err(|err| err.in_table(SymbolSet::Position))?,
        );
        Ok(())
    }
}

// Reads one Extra or Position set code length.
//
// A length below 7 is a 3-bit value. Otherwise it is `111b` followed by one '1' per additional length and a
// terminating '0', so "7" is `1110b` and "12" is `111111110b`.
fn read_code_length<S: ByteSource + ?Sized>(window: &mut BitWindow<'_, S>) -> Result<u8, Lz77Error> {
    let mut len = window.peek(3) as usize;
    let mut consumed = 3;
    if len == 7 {
        while consumed < WINDOW_BITS && window.bit(consumed) {
            len += 1;
            consumed += 1;
        }
        // terminating zero.
        consumed += 1;
    }
    if len > MAX_CODE_LENGTH {
        Err(TableFault::CodeLengthTooLong(len.min(u8::MAX as usize) as u8))?;
    }
    window.consume(consumed)?;
    Ok(len as u8)
}

/// Reads the Extra set or Position set code length array and builds its table.
///
/// The array is preceded by a `count_bits` field giving its length. A zero length means the alphabet uses a single
/// symbol, named by a second `count_bits` field.
///
/// If `special` is set, a 2-bit field follows the length at that index giving a run of zero lengths. For example
/// the lengths [2,9,0,0,5,7] are coded as `010 111110 10 101 1110` with the special index at 3, and as
/// `010 111110 000 000 101 1110` without it.
pub(crate) fn read_pt_len<S: ByteSource + ?Sized>(
    window: &mut BitWindow<'_, S>,
    symbol_count: usize,
    count_bits: usize,
    special: Option<usize>,
) -> Result<HuffmanTable, Lz77Error> {
    let count = window.take(count_bits)? as usize;
    if count == 0 {
        // this represents the only Huffman code used.
        let symbol = window.take(count_bits)? as u16;
        return Ok(HuffmanTable::single(symbol_count, PTABLE_BITSIZE, symbol)?);
    }
    if count > symbol_count {
        Err(TableFault::LengthArrayOverflow)?;
    }

    let mut lengths = vec![0u8; symbol_count];
    let mut idx = 0;
    while idx < count {
        lengths[idx] = read_code_length(window)?;
        idx += 1;

        if Some(idx) == special {
            let zero_count = window.take(2)? as usize;
            if idx + zero_count > symbol_count {
                Err(TableFault::LengthArrayOverflow)?;
            }
            // lengths are already zero; skip over the run.
            idx += zero_count;
        }
    }

    Ok(HuffmanTable::build(&lengths, PTABLE_BITSIZE)?)
}

/// Reads the Char&Len set code length array and builds its table.
///
/// The array is preceded by a 9-bit length field; zero means a single symbol, named by a second 9-bit field.
/// Each entry is an Extra set symbol, decoded with `extra`:
///  - 0: one zero length.
///  - 1: a 4-bit field follows; `3 + field` zero lengths.
///  - 2: a 9-bit field follows; `20 + field` zero lengths.
///  - n: a code length of `n - 2`.
pub(crate) fn read_c_len<S: ByteSource + ?Sized>(
    window: &mut BitWindow<'_, S>,
    extra: &HuffmanTable,
) -> Result<HuffmanTable, Lz77Error> {
    let count = window.take(CBIT)? as usize;
    if count == 0 {
        // this represents the only Huffman code used.
        let symbol = window.take(CBIT)? as u16;
        return Ok(HuffmanTable::single(NC, CTABLE_BITSIZE, symbol)?);
    }
    if count > NC {
        Err(TableFault::LengthArrayOverflow)?;
    }

    let mut lengths = vec![0u8; NC];
    let mut idx = 0;
    while idx < count {
        let symbol = extra.decode(window)?;
        let zero_run = match symbol {
            0 => 1,
            1 => window.take(4)? as usize + 3,
            2 => window.take(CBIT)? as usize + 20,
            len => {
                lengths[idx] = (len - 2) as u8;
                idx += 1;
                continue;
            }
        };
        if idx + zero_run > NC {
            Err(TableFault::LengthArrayOverflow)?;
        }
        idx += zero_run;
    }

    Ok(HuffmanTable::build(&lengths, CTABLE_BITSIZE)?)
}
