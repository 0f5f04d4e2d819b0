#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! Decompressor for the EFI 1.1 ("legacy") and Tiano LZ77 encodings found in older firmware volumes and capsules.
//!
//! The format is LZ77 with per-block canonical Huffman tables. A compressed image is an 8-byte header (compressed
//! size, then uncompressed size, both little-endian `u32`) followed by the payload. The two encodings differ only in
//! the width of one block header field and nothing in the data says which one was used, so by default both are
//! tried, Tiano first, and the first one that decodes cleanly wins.
//!
//! ## Example
//!
//! ```
//! use efi_lz77::Lz77Decompressor;
//!
//! // 1 block of 4 symbols, every table a single symbol: 'A' four times.
//! let image = [6, 0, 0, 0, 4, 0, 0, 0, 0x00, 0x04, 0x00, 0x00, 0x04, 0x10];
//! let decompressed = Lz77Decompressor::new().decompress_slice(&image).unwrap();
//! assert_eq!(decompressed.data, b"AAAA");
//! ```
//!
//! ## License
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
//!

extern crate alloc;

mod bit_window;
mod block;
mod decoder;
pub mod error;
pub mod header;
mod huffman;
pub mod size;
pub mod source;
pub mod variant;

#[cfg(test)]
mod test_stream;

use alloc::vec::Vec;

pub use error::{Lz77Error, SymbolSet, TableFault};
pub use header::{Lz77Header, HEADER_SIZE};
#[cfg(any(test, feature = "std"))]
pub use source::IoSource;
pub use source::{ByteSource, SliceSource};
pub use variant::{FormatVariant, TIANO_DECOMPRESS_SECTION_GUID};

use decoder::Decoder;

/// Default ceiling on the declared uncompressed size.
pub const DEFAULT_SIZE_MAX: usize = 64 * 1024 * 1024;

/// The complete result of a successful decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompressed {
    /// Exactly the declared uncompressed size.
    pub data: Vec<u8>,
    /// The variant the data decoded under.
    pub variant: FormatVariant,
}

impl Decompressed {
    /// Numeric version tag of the variant, as stored by firmware containers.
    pub fn version_raw(&self) -> u32 {
        self.variant.version_raw()
    }
}

/// Decompressor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz77Decompressor {
    size_max: usize,
    hint: Option<FormatVariant>,
}

impl Default for Lz77Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Lz77Decompressor {
    pub const fn new() -> Self {
        Self { size_max: DEFAULT_SIZE_MAX, hint: None }
    }

    /// Sets the largest uncompressed size that will be accepted.
    pub const fn with_size_max(mut self, size_max: usize) -> Self {
        self.size_max = size_max;
        self
    }

    /// Decodes only as `variant` instead of trying both, e.g. when the section type already says which one it is.
    pub const fn with_variant_hint(mut self, variant: FormatVariant) -> Self {
        self.hint = Some(variant);
        self
    }

    pub const fn size_max(&self) -> usize {
        self.size_max
    }

    /// Decompresses the image starting at the current position of `source`.
    ///
    /// Each candidate variant is decoded from the start of the payload; the first that produces exactly the declared
    /// number of bytes is returned. If all fail, the error lists every attempt.
    pub fn decompress<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<Decompressed, Lz77Error> {
        let (header, payload_start) = self.prepare(source)?;
        let variants: &[FormatVariant] = match &self.hint {
            Some(variant) => core::slice::from_ref(variant),
            None => &FormatVariant::TRIAL_ORDER,
        };

        let mut failures = Vec::new();
        for &variant in variants {
            source.seek_to(payload_start)?;
            match Self::attempt(source, &header, variant) {
                Ok(data) => {
                    log::info!("decompressed {} bytes as {}", data.len(), variant);
                    return Ok(Decompressed { data, variant });
                }
                Err(err) if err.is_read_failure() => return Err(err.in_variant(variant)),
                Err(err) => {
                    log::debug!("{} decode failed: {}", variant, err);
                    failures.push((variant, err));
                }
            }
        }

        match failures.len() {
            1 => {
                let (variant, err) = failures.remove(0);
                Err(err.in_variant(variant))
            }
            _ => Err(Lz77Error::AllVariantsFailed(failures)),
        }
    }

    /// Decompresses the image starting at the current position of `source` as `variant` only.
    pub fn decompress_as<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        variant: FormatVariant,
    ) -> Result<Decompressed, Lz77Error> {
        self.with_variant_hint(variant).decompress(source)
    }

    /// Decompresses an in-memory image.
    pub fn decompress_slice(&self, image: &[u8]) -> Result<Decompressed, Lz77Error> {
        self.decompress(&mut SliceSource::new(image))
    }

    // Reads and validates the header, returning it with the absolute offset of the payload.
    fn prepare<S: ByteSource + ?Sized>(&self, source: &mut S) -> Result<(Lz77Header, usize), Lz77Error> {
        let start = source.stream_position()?;
        let header = Lz77Header::read(source)?;
        let payload_start = start + HEADER_SIZE;
        let available = source.stream_len()?.saturating_sub(payload_start);
        header.validate(available, self.size_max)?;
        log::debug!(
            "lz77 image at {:#x}: {} compressed bytes, {} uncompressed bytes",
            start,
            header.src_size,
            header.dst_size
        );
        Ok((header, payload_start))
    }

    fn attempt<S: ByteSource + ?Sized>(
        source: &mut S,
        header: &Lz77Header,
        variant: FormatVariant,
    ) -> Result<Vec<u8>, Lz77Error> {
        log::debug!("attempting {} decode", variant);
        Decoder::new(source, header.src_size as usize, header.dst_size as usize, variant).run()
    }
}
