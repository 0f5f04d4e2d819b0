//! Test-only encoder producing EFI LZ77 streams from explicit tokens.
//!
//! It emits the block headers the same way the EDK2 compressor does, but leaves match finding to the caller so
//! tests control exactly which literals, back-references and code shapes reach the decoder.

use std::{collections::BTreeSet, vec, vec::Vec};

use crate::{
    block::{CBIT, MAXNP, NC, NT, TBIT},
    decoder::THRESHOLD,
    variant::FormatVariant,
};

/// MSB-first bit writer.
pub(crate) struct BitWriter {
    bytes: Vec<u8>,
    acc: u64,
    bits: usize,
}

impl BitWriter {
    pub(crate) fn new() -> Self {
        Self { bytes: Vec::new(), acc: 0, bits: 0 }
    }

    pub(crate) fn put(&mut self, value: u32, count: usize) {
        assert!(count <= 32);
        if count == 0 {
            return;
        }
        assert!(count == 32 || value < (1 << count), "{value:#x} does not fit in {count} bits");
        self.acc = (self.acc << count) | value as u64;
        self.bits += count;
        while self.bits >= 8 {
            self.bits -= 8;
            self.bytes.push((self.acc >> self.bits) as u8);
        }
        self.acc &= (1 << self.bits) - 1;
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        if self.bits > 0 {
            self.bytes.push((self.acc << (8 - self.bits)) as u8);
        }
        self.bytes
    }
}

/// Canonical `(code, length)` per symbol, assigned in symbol order within each length.
pub(crate) fn canonical_codes(lengths: &[u8]) -> Vec<(u32, u8)> {
    let mut count = [0u32; 17];
    for &len in lengths {
        count[len as usize] += 1;
    }
    let mut start = [0u32; 18];
    for len in 1..=16 {
        start[len + 1] = start[len] + (count[len] << (16 - len));
    }
    lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return (0, 0);
            }
            let len = len as usize;
            let code = start[len] >> (16 - len);
            start[len] += 1 << (16 - len);
            (code, len as u8)
        })
        .collect()
}

/// A complete, nearly balanced code over `symbols` (at least two) in an alphabet of `alphabet` symbols.
pub(crate) fn complete_lengths(symbols: &[usize], alphabet: usize) -> Vec<u8> {
    let k = symbols.len();
    assert!(k >= 2);
    let depth = usize::BITS - (k - 1).leading_zeros();
    let short = (1usize << depth) - k;
    let mut lengths = vec![0u8; alphabet];
    for (idx, &sym) in symbols.iter().enumerate() {
        lengths[sym] = if idx < short { depth as u8 - 1 } else { depth as u8 };
    }
    lengths
}

/// A maximally unbalanced complete code: lengths 1, 2, .., k-1, k-1.
pub(crate) fn skewed_lengths(symbols: &[usize], alphabet: usize) -> Vec<u8> {
    let k = symbols.len();
    assert!((2..=17).contains(&k));
    let mut lengths = vec![0u8; alphabet];
    for (idx, &sym) in symbols.iter().enumerate() {
        lengths[sym] = (idx + 1).min(k - 1) as u8;
    }
    lengths
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    Literal(u8),
    /// Copy `length` bytes starting `distance` bytes behind the cursor.
    Match { length: usize, distance: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CodeShape {
    Balanced,
    Skewed,
}

fn shaped_lengths(symbols: &[usize], alphabet: usize, shape: CodeShape) -> Vec<u8> {
    match shape {
        CodeShape::Skewed if symbols.len() <= 17 => skewed_lengths(symbols, alphabet),
        _ => complete_lengths(symbols, alphabet),
    }
}

fn char_symbol(token: &Token) -> usize {
    match token {
        Token::Literal(byte) => *byte as usize,
        Token::Match { length, .. } => length + 0x100 - THRESHOLD,
    }
}

// position symbol plus its raw extra bits.
fn position_symbol(distance: usize) -> (usize, u32, usize) {
    let offset = distance - 1;
    if offset <= 1 {
        return (offset, 0, 0);
    }
    let bit_len = (usize::BITS - offset.leading_zeros()) as usize;
    (bit_len, (offset - (1 << (bit_len - 1))) as u32, bit_len - 1)
}

fn write_code_length(writer: &mut BitWriter, len: u8) {
    if len < 7 {
        writer.put(len as u32, 3);
    } else {
        let bits = len as usize - 3;
        writer.put((1 << bits) - 2, bits);
    }
}

// Extra or position set length array, trailing zeros trimmed.
fn write_pt_len(writer: &mut BitWriter, lengths: &[u8], count_bits: usize, special: Option<usize>) {
    let mut n = lengths.len();
    while n > 0 && lengths[n - 1] == 0 {
        n -= 1;
    }
    writer.put(n as u32, count_bits);
    let mut idx = 0;
    while idx < n {
        write_code_length(writer, lengths[idx]);
        idx += 1;
        if Some(idx) == special {
            while idx < 6 && lengths.get(idx) == Some(&0) {
                idx += 1;
            }
            writer.put((idx - 3) as u32, 2);
        }
    }
}

// The char&len length array as extra-set symbols with their raw extra fields.
fn char_length_symbols(lengths: &[u8]) -> Vec<(usize, u32, usize)> {
    let mut n = lengths.len();
    while n > 0 && lengths[n - 1] == 0 {
        n -= 1;
    }
    let mut out = Vec::new();
    let mut idx = 0;
    while idx < n {
        let len = lengths[idx];
        idx += 1;
        if len != 0 {
            out.push((len as usize + 2, 0, 0));
            continue;
        }
        let mut run = 1;
        while idx < n && lengths[idx] == 0 {
            idx += 1;
            run += 1;
        }
        match run {
            1 | 2 => out.extend(core::iter::repeat((0, 0, 0)).take(run)),
            3..=18 => out.push((1, run as u32 - 3, 4)),
            19 => {
                out.push((0, 0, 0));
                out.push((1, 15, 4));
            }
            _ => out.push((2, run as u32 - 20, CBIT)),
        }
    }
    out
}

/// Writes one block: header, three tables, then the tokens.
pub(crate) fn write_block(writer: &mut BitWriter, tokens: &[Token], variant: FormatVariant, shape: CodeShape) {
    let position_bits = variant.position_bits();
    writer.put(tokens.len() as u32, 16);

    let char_symbols: BTreeSet<usize> = tokens.iter().map(char_symbol).collect();
    let char_symbols: Vec<usize> = char_symbols.into_iter().collect();
    let char_lengths = if char_symbols.len() == 1 {
        writer.put(0, TBIT);
        writer.put(0, TBIT);
        writer.put(0, CBIT);
        writer.put(char_symbols[0] as u32, CBIT);
        vec![0u8; NC]
    } else {
        let char_lengths = shaped_lengths(&char_symbols, NC, shape);
        let encoded = char_length_symbols(&char_lengths);
        let extra_symbols: BTreeSet<usize> = encoded.iter().map(|(sym, _, _)| *sym).collect();
        let extra_symbols: Vec<usize> = extra_symbols.into_iter().collect();
        let extra_lengths = if extra_symbols.len() == 1 {
            writer.put(0, TBIT);
            writer.put(extra_symbols[0] as u32, TBIT);
            vec![0u8; NT]
        } else {
            let extra_lengths = complete_lengths(&extra_symbols, NT);
            write_pt_len(writer, &extra_lengths, TBIT, Some(3));
            extra_lengths
        };
        let extra_codes = canonical_codes(&extra_lengths);
        let n = char_lengths.iter().rposition(|len| *len != 0).map_or(0, |idx| idx + 1);
        writer.put(n as u32, CBIT);
        for (sym, extra, extra_bits) in encoded {
            let (code, len) = extra_codes[sym];
            writer.put(code, len as usize);
            writer.put(extra, extra_bits);
        }
        char_lengths
    };

    let position_symbols: BTreeSet<usize> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Match { distance, .. } => Some(position_symbol(*distance).0),
            Token::Literal(_) => None,
        })
        .collect();
    let position_symbols: Vec<usize> = position_symbols.into_iter().collect();
    let position_lengths = if position_symbols.len() <= 1 {
        writer.put(0, position_bits);
        writer.put(position_symbols.first().copied().unwrap_or(0) as u32, position_bits);
        vec![0u8; MAXNP]
    } else {
        let position_lengths = shaped_lengths(&position_symbols, MAXNP, shape);
        write_pt_len(writer, &position_lengths, position_bits, None);
        position_lengths
    };

    let char_codes = canonical_codes(&char_lengths);
    let position_codes = canonical_codes(&position_lengths);
    for token in tokens {
        let (code, len) = char_codes[char_symbol(token)];
        writer.put(code, len as usize);
        if let Token::Match { distance, .. } = token {
            let (sym, extra, extra_bits) = position_symbol(*distance);
            let (code, len) = position_codes[sym];
            writer.put(code, len as usize);
            writer.put(extra, extra_bits);
        }
    }
}

/// Encodes `blocks` as one payload.
pub(crate) fn encode(blocks: &[&[Token]], variant: FormatVariant, shape: CodeShape) -> Vec<u8> {
    let mut writer = BitWriter::new();
    for tokens in blocks {
        write_block(&mut writer, tokens, variant, shape);
    }
    writer.finish()
}

/// Prefixes `payload` with the 8-byte size header.
pub(crate) fn wrap(payload: &[u8], dst_size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&dst_size.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Reference expansion of a token list.
pub(crate) fn expand(blocks: &[&[Token]]) -> Vec<u8> {
    let mut out = Vec::new();
    for token in blocks.iter().flat_map(|tokens| tokens.iter()) {
        match *token {
            Token::Literal(byte) => out.push(byte),
            Token::Match { length, distance } => {
                for _ in 0..length {
                    out.push(out[out.len() - distance]);
                }
            }
        }
    }
    out
}

/// Tokenises `text` as literals with greedy back-references to earlier occurrences.
pub(crate) fn tokenize(text: &[u8], max_distance: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let mut best = (0, 0);
        for distance in 1..=pos.min(max_distance) {
            let mut length = 0;
            while pos + length < text.len() && length < 256 && text[pos + length - distance] == text[pos + length] {
                length += 1;
            }
            if length > best.0 {
                best = (length, distance);
            }
        }
        if best.0 >= THRESHOLD {
            tokens.push(Token::Match { length: best.0, distance: best.1 });
            pos += best.0;
        } else {
            tokens.push(Token::Literal(text[pos]));
            pos += 1;
        }
    }
    tokens
}

#[cfg(test)]
mod test {
    use super::{canonical_codes, expand, tokenize, BitWriter, Token};

    #[test]
    fn bit_writer_packs_msb_first() {
        let mut writer = BitWriter::new();
        writer.put(0b101, 3);
        writer.put(0b10001, 5);
        writer.put(0x2345, 16);
        writer.put(1, 1);
        assert_eq!(writer.finish(), [0xB1, 0x23, 0x45, 0x80]);
    }

    #[test]
    fn canonical_codes_follow_length_then_symbol_order() {
        assert_eq!(canonical_codes(&[2, 1, 3, 3]), [(0b10, 2), (0b0, 1), (0b110, 3), (0b111, 3)]);
    }

    #[test]
    fn tokenize_round_trips_through_expand() {
        let text = b"abcabcabcabcxyzxyzxyz aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
        let tokens = tokenize(text, 64);
        assert!(tokens.iter().any(|t| matches!(t, Token::Match { .. })));
        assert_eq!(expand(&[&tokens]), text);
    }
}
