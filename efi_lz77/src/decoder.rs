use alloc::{vec, vec::Vec};

use crate::{
    bit_window::BitWindow, block::BlockCodec, error::Lz77Error, source::ByteSource, variant::FormatVariant,
};

/// Shortest back-reference; Char&Len symbol 256 encodes a match of this length.
pub(crate) const THRESHOLD: usize = 3;

/// One decode attempt under a single variant.
///
/// Owns the whole decode state. Any error leaves the attempt unusable; callers retry with a fresh decoder.
pub(crate) struct Decoder<'a, S: ByteSource + ?Sized> {
    window: BitWindow<'a, S>,
    codec: BlockCodec,
    output: Vec<u8>,
    cursor: usize,
}

impl<'a, S: ByteSource + ?Sized> Decoder<'a, S> {
    /// Prepares to decode `src_size` payload bytes from the current position of `source` into `dst_size` bytes.
    pub(crate) fn new(source: &'a mut S, src_size: usize, dst_size: usize, variant: FormatVariant) -> Self {
        Self {
            window: BitWindow::new(source, src_size),
            codec: BlockCodec::new(variant),
            output: vec![0u8; dst_size],
            cursor: 0,
        }
    }

    /// Runs the attempt to completion. On success the output is exactly `dst_size` bytes long.
    pub(crate) fn run(mut self) -> Result<Vec<u8>, Lz77Error> {
        self.window.fill()?;

        while self.cursor < self.output.len() {
            let symbol = self.codec.next_symbol(&mut self.window)? as usize;
            if symbol < 0x100 {
                // symbol is an original character literal.
                self.output[self.cursor] = symbol as u8;
                self.cursor += 1;
            } else {
                // symbol is a string length; a string position follows.
                let length = symbol - (0x100 - THRESHOLD);
                let offset = self.codec.decode_position(&mut self.window)?;
                self.copy_match(offset, length)?;
            }
        }
        Ok(self.output)
    }

    // Copies `length` bytes starting `offset + 1` bytes behind the cursor.
    //
    // note: the source range may overlap the bytes written by this same copy (e.g. offset 0 repeats the last byte),
    // so bytes are copied one at a time; slice::copy_within would copy the stale bytes instead.
    fn copy_match(&mut self, offset: usize, length: usize) -> Result<(), Lz77Error> {
        let position = self.cursor;
        let bad_pointer = || Lz77Error::BadPointerOffset { position, offset };
        let mut src = self.cursor.checked_sub(offset).and_then(|x| x.checked_sub(1)).ok_or_else(bad_pointer)?;
        for _ in 0..length {
            if self.cursor >= self.output.len() || src >= self.output.len() {
                return Err(bad_pointer());
            }
            self.output[self.cursor] = self.output[src];
            self.cursor += 1;
            src += 1;
        }
        Ok(())
    }
}
