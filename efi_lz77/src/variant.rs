use core::fmt;

use r_efi::efi;

use crate::error::Lz77Error;

/// GUID of a GUID-defined firmware section holding Tiano-compressed data.
pub const TIANO_DECOMPRESS_SECTION_GUID: efi::Guid =
    efi::Guid::from_fields(0xA31280AD, 0x481E, 0x41B6, 0x95, 0xE8, &[0x12, 0x7F, 0x4C, 0x98, 0x47, 0x79]);

/// The two EFI LZ77 encodings.
///
/// They differ only in the width of the position-set count field in each block header. Nothing in the stream
/// says which one was used, so a variant is a decode hypothesis rather than a parsed fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVariant {
    /// EFI 1.1 compression, 4-bit position count field.
    Legacy,
    /// TianoCompress, 5-bit position count field.
    Tiano,
}

impl FormatVariant {
    /// Trial order used when no hint is supplied.
    pub const TRIAL_ORDER: [FormatVariant; 2] = [FormatVariant::Tiano, FormatVariant::Legacy];

    /// The variant used by standard (non GUID-defined) EFI compression sections.
    pub const STANDARD_COMPRESSION: FormatVariant = FormatVariant::Legacy;

    /// Width in bits of the position-set code length count field.
    pub const fn position_bits(self) -> usize {
        match self {
            FormatVariant::Legacy => 4,
            FormatVariant::Tiano => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            FormatVariant::Legacy => "legacy",
            FormatVariant::Tiano => "tiano",
        }
    }

    /// Numeric version tag recorded by firmware containers.
    pub const fn version_raw(self) -> u32 {
        match self {
            FormatVariant::Legacy => 1,
            FormatVariant::Tiano => 2,
        }
    }

    /// Maps a GUID-defined section GUID to the variant it implies, if any.
    pub fn from_section_guid(guid: &efi::Guid) -> Option<FormatVariant> {
        if *guid == TIANO_DECOMPRESS_SECTION_GUID {
            Some(FormatVariant::Tiano)
        } else {
            None
        }
    }
}

impl TryFrom<u32> for FormatVariant {
    type Error = Lz77Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FormatVariant::Legacy),
            2 => Ok(FormatVariant::Tiano),
            other => Err(Lz77Error::UnknownVersion(other)),
        }
    }
}

impl fmt::Display for FormatVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
