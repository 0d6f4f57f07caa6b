
//! Contains the compression attribute definition
//! and methods to compress and decompress the packed block stream.


// private modules make non-breaking changes easier
mod rle;

pub use self::rle::{RUN_TAG, LITERAL_TAG, MAX_CHUNK_LENGTH};

use crate::error::{Result};


/// A byte vector.
pub type ByteVec = Vec<u8>;

/// A byte slice.
pub type Bytes<'s> = &'s [u8];

/// Specifies whether the packed block stream is compacted any further.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compression {

    /// Store the packed blocks as they are.
    Uncompressed,

    /// Replace repeated bytes with run chunks and
    /// copy all other bytes in literal chunks.
    /// Works best for images with large flat areas, where many blocks are identical.
    /// This compression method is lossless.
    RLE,
}

impl Default for Compression {
    fn default() -> Self { Compression::RLE }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} compression", match self {
            Compression::Uncompressed => "no",
            Compression::RLE => "rle",
        })
    }
}


impl Compression {

    /// Compress the packed block bytes.
    pub fn compress_bytes(self, uncompressed: Bytes<'_>) -> ByteVec {
        match self {
            Compression::Uncompressed => uncompressed.to_vec(),
            Compression::RLE => rle::compress_bytes(uncompressed),
        }
    }

    /// Decompress the packed block bytes.
    /// Returns `Error::Invalid` if the bytes are damaged.
    pub fn decompress_bytes(self, compressed: Bytes<'_>, expected_byte_size: usize) -> Result<ByteVec> {
        match self {
            Compression::Uncompressed => Ok(compressed.to_vec()),
            Compression::RLE => rle::decompress_bytes(compressed, expected_byte_size),
        }
    }

    /// Compress the bytes, but fall back to no compression
    /// if the compressed bytes would not be any smaller.
    /// Returns the compression method that was actually used.
    pub fn compress_if_smaller(self, uncompressed: Bytes<'_>) -> (Compression, ByteVec) {
        let compressed = self.compress_bytes(uncompressed);

        if self == Compression::Uncompressed || compressed.len() < uncompressed.len() {
            (self, compressed)
        }
        else {
            (Compression::Uncompressed, uncompressed.to_vec())
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn falls_back_to_uncompressed(){
        let noise = [1_u8, 2, 3, 4, 5];
        let (method, bytes) = Compression::RLE.compress_if_smaller(&noise);
        assert_eq!(method, Compression::Uncompressed);
        assert_eq!(bytes, noise.to_vec());

        let flat = [9_u8; 64];
        let (method, bytes) = Compression::RLE.compress_if_smaller(&flat);
        assert_eq!(method, Compression::RLE);
        assert_eq!(bytes, vec![RUN_TAG, 64, 9]);
        assert_eq!(method.decompress_bytes(&bytes, 64).unwrap(), flat.to_vec());
    }

    #[test]
    fn display(){
        assert_eq!(Compression::RLE.to_string(), "rle compression");
        assert_eq!(Compression::Uncompressed.to_string(), "no compression");
    }
}
