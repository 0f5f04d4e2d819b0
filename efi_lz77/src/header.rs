use crate::{error::Lz77Error, source::ByteSource};

/// Size of the header preceding the compressed payload.
pub const HEADER_SIZE: usize = 8;

/// The size header preceding every compressed payload: two little-endian `u32`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lz77Header {
    /// Compressed payload size in bytes.
    pub src_size: u32,
    /// Uncompressed size in bytes.
    pub dst_size: u32,
}

impl Lz77Header {
    /// Parses the header from the first 8 bytes of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, Lz77Error> {
        let bytes: &[u8; HEADER_SIZE] =
            bytes.get(..HEADER_SIZE).and_then(|b| b.try_into().ok()).ok_or(Lz77Error::HeaderTruncated)?;
        Ok(Self {
            src_size: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            dst_size: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    /// Reads the header from the current position of `source`, leaving the cursor at the start of the payload.
    pub fn read<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, Lz77Error> {
        let mut bytes = [0u8; HEADER_SIZE];
        for byte in bytes.iter_mut() {
            *byte = source.read_byte()?.ok_or(Lz77Error::HeaderTruncated)?;
        }
        Self::parse(&bytes)
    }

    /// Checks the header against the bytes left after it and the caller's output ceiling.
    ///
    /// Nothing is decoded unless all three preconditions hold: the payload fits in the stream, the output is not
    /// empty, and the output does not exceed `size_max`.
    pub fn validate(&self, payload_available: usize, size_max: usize) -> Result<(), Lz77Error> {
        let declared = self.src_size as usize;
        if payload_available < declared {
            Err(Lz77Error::SourceTruncated { declared, available: payload_available })?;
        }
        let size = self.dst_size as usize;
        if size == 0 {
            Err(Lz77Error::DestinationSizeZero)?;
        }
        if size > size_max {
            Err(Lz77Error::DestinationTooLarge { size, limit: size_max })?;
        }
        Ok(())
    }
}
