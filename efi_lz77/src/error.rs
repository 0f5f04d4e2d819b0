//! Decompression error definitions.
//!
//! Every failure is specific to one decode attempt. When trial decoding is used, the per-variant errors are kept
//! and reported together so a corrupt image can be told apart from a wrong variant guess.

use alloc::{boxed::Box, string::String, vec::Vec};
use core::fmt;

use r_efi::efi;

use crate::{size::ByteSize, variant::FormatVariant};

/// The structural check that rejected a Huffman table. All of these render as "bad table".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFault {
    /// A code length above 16 bits.
    CodeLengthTooLong(u8),
    /// The canonical code lengths do not exactly tile the 16-bit code space.
    IncompleteCode,
    /// A direct-lookup range ran past the end of the lookup table.
    IndexOverflow,
    /// The overflow tree needed more internal nodes than the alphabet allows.
    ArenaExhausted,
    /// A symbol or node index outside the alphabet was referenced.
    SymbolOutOfRange(u16),
    /// The encoded code-length array declared more entries than the alphabet has.
    LengthArrayOverflow,
    /// A tree walk reached an unset child or ran out of window bits.
    BrokenTree,
}

/// Names the three Huffman alphabets, used to prefix table construction errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSet {
    Extra,
    CharLength,
    Position,
}

impl fmt::Display for SymbolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolSet::Extra => f.write_str("extra set"),
            SymbolSet::CharLength => f.write_str("char&len"),
            SymbolSet::Position => f.write_str("the position set"),
        }
    }
}

/// Decompress Error Definitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lz77Error {
    /// Fewer than the 8 header bytes were available.
    HeaderTruncated,
    /// The declared compressed size is larger than what the stream holds.
    SourceTruncated { declared: usize, available: usize },
    /// The declared uncompressed size is zero.
    DestinationSizeZero,
    /// The declared uncompressed size is above the configured ceiling.
    DestinationTooLarge { size: usize, limit: usize },
    /// A Huffman table failed a structural check.
    BadTable(TableFault),
    /// A back-reference would read or write outside the output buffer.
    BadPointerOffset { position: usize, offset: usize },
    /// A block header declared zero symbols while output was still required.
    NoBlocksRemained,
    /// The byte source failed for a reason other than end of stream.
    Read(String),
    /// A numeric version tag that names no known variant.
    UnknownVersion(u32),
    /// An error raised while building one of the block's Huffman tables.
    Table { set: SymbolSet, source: Box<Lz77Error> },
    /// An error raised while decoding under one variant.
    Variant { variant: FormatVariant, source: Box<Lz77Error> },
    /// Every attempted variant failed; errors are kept in attempt order.
    AllVariantsFailed(Vec<(FormatVariant, Lz77Error)>),
}

impl Lz77Error {
    pub(crate) fn in_table(self, set: SymbolSet) -> Self {
        Lz77Error::Table { set, source: Box::new(self) }
    }

    pub(crate) fn in_variant(self, variant: FormatVariant) -> Self {
        Lz77Error::Variant { variant, source: Box::new(self) }
    }

    /// The innermost error beneath any table or variant prefixes.
    pub fn root_cause(&self) -> &Lz77Error {
        match self {
            Lz77Error::Table { source, .. } | Lz77Error::Variant { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// True if the byte source itself failed. Such errors are not retried under another variant.
    pub fn is_read_failure(&self) -> bool {
        matches!(self.root_cause(), Lz77Error::Read(_))
    }

    /// True for errors caused by the compressed data itself rather than by the header, the configured limits or the
    /// byte source.
    pub fn is_malformed_data(&self) -> bool {
        match self {
            Lz77Error::BadTable(_) | Lz77Error::BadPointerOffset { .. } | Lz77Error::NoBlocksRemained => true,
            Lz77Error::Table { source, .. } | Lz77Error::Variant { source, .. } => source.is_malformed_data(),
            Lz77Error::AllVariantsFailed(errors) => errors.iter().all(|(_, err)| err.is_malformed_data()),
            _ => false,
        }
    }
}

impl From<TableFault> for Lz77Error {
    fn from(fault: TableFault) -> Self {
        Lz77Error::BadTable(fault)
    }
}

impl fmt::Display for Lz77Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lz77Error::HeaderTruncated => f.write_str("header truncated"),
            Lz77Error::SourceTruncated { .. } => f.write_str("source buffer is truncated"),
            Lz77Error::DestinationSizeZero => f.write_str("destination size is zero"),
            Lz77Error::DestinationTooLarge { size, limit } => {
                write!(f, "destination size is too large ({}, limit {})", ByteSize(*size), ByteSize(*limit))
            }
            Lz77Error::BadTable(_) => f.write_str("bad table"),
            Lz77Error::BadPointerOffset { .. } => f.write_str("bad pointer offset"),
            Lz77Error::NoBlocksRemained => f.write_str("no blocks remained"),
            Lz77Error::Read(msg) => write!(f, "failed to read source: {msg}"),
            Lz77Error::UnknownVersion(version) => write!(f, "unknown version {version:#x}"),
            Lz77Error::Table { set: SymbolSet::CharLength, source } => {
                write!(f, "failed to generate the code mapping table for char&len: {source}")
            }
            Lz77Error::Table { set, source } => {
                write!(f, "failed to generate the Huffman code mapping table for {set}: {source}")
            }
            Lz77Error::Variant { variant, source } => write!(f, "failed to parse {variant}: {source}"),
            Lz77Error::AllVariantsFailed(errors) => {
                for (idx, (variant, err)) in errors.iter().enumerate() {
                    if idx != 0 {
                        f.write_str(": ")?;
                    }
                    write!(f, "failed to parse {variant}: {err}")?;
                }
                Ok(())
            }
        }
    }
}

impl core::error::Error for Lz77Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Lz77Error::Table { source, .. } | Lz77Error::Variant { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<Lz77Error> for efi::Status {
    fn from(err: Lz77Error) -> Self {
        match err.root_cause() {
            Lz77Error::DestinationTooLarge { .. } => efi::Status::OUT_OF_RESOURCES,
            Lz77Error::Read(_) => efi::Status::DEVICE_ERROR,
            Lz77Error::UnknownVersion(_) => efi::Status::INVALID_PARAMETER,
            _ => efi::Status::VOLUME_CORRUPTED,
        }
    }
}
