use bitvec::{field::BitField, order::Msb0, view::BitView};

use crate::{error::Lz77Error, source::ByteSource};

/// Width of the bit window register.
pub(crate) const WINDOW_BITS: usize = 32;

/// A 32-bit register fed MSB-first from a byte source.
///
/// Bits are shifted in from a one-byte lookahead (`carry`); `pending` counts the carry bits not yet shifted in.
/// Once the payload is exhausted the window is padded with zero bits. Running out of input is never an error here;
/// the decoder fails instead when the zero padding does not decode into the declared output.
pub(crate) struct BitWindow<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
    window: u32,
    carry: u8,
    pending: usize,
    budget: usize,
}

impl<'a, S: ByteSource + ?Sized> BitWindow<'a, S> {
    /// Creates a window reading at most `budget` bytes from `source`.
    pub(crate) fn new(source: &'a mut S, budget: usize) -> Self {
        Self { source, window: 0, carry: 0, pending: 0, budget }
    }

    /// Pre-loads the full register. Must be called once before any symbol is decoded.
    pub(crate) fn fill(&mut self) -> Result<(), Lz77Error> {
        self.consume(WINDOW_BITS)
    }

    /// Returns the top `count` bits of the window without consuming them.
    pub(crate) fn peek(&self, count: usize) -> u32 {
        debug_assert!(count <= WINDOW_BITS);
        if count == 0 {
            return 0;
        }
        self.window.view_bits::<Msb0>()[..count].load_be::<u32>()
    }

    /// Returns bit `idx` of the window, counting from the most significant bit.
    pub(crate) fn bit(&self, idx: usize) -> bool {
        self.window.view_bits::<Msb0>()[idx]
    }

    /// Discards the top `count` bits and shifts in as many fresh bits.
    pub(crate) fn consume(&mut self, count: usize) -> Result<(), Lz77Error> {
        debug_assert!(count <= WINDOW_BITS);
        let mut count = count;
        self.window = ((self.window as u64) << count) as u32;

        while count > self.pending {
            count -= self.pending;
            self.window |= ((self.carry as u64) << count) as u32;
            self.carry = self.next_byte()?;
            self.pending = 8;
        }

        self.pending -= count;
        self.window |= (self.carry >> self.pending) as u32;
        Ok(())
    }

    /// Pops `count` bits (at most 32) as an integer.
    pub(crate) fn take(&mut self, count: usize) -> Result<u32, Lz77Error> {
        let value = self.peek(count);
        self.consume(count)?;
        Ok(value)
    }

    fn next_byte(&mut self) -> Result<u8, Lz77Error> {
        if self.budget == 0 {
            return Ok(0);
        }
        match self.source.read_byte()? {
            Some(byte) => {
                self.budget -= 1;
                Ok(byte)
            }
            None => {
                // no more bits from the source, pad with zeros from here on.
                self.budget = 0;
                Ok(0)
            }
        }
    }
}
