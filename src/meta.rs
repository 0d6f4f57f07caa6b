
//! Describes how an image is quantized, and
//! the header that precedes every serialized block stream.

use crate::math::*;
use crate::compression::Compression;
use crate::error::{Error, Result, UnitResult, usize_to_u8};
use crate::io::{Data, Read, Write};
use bit_field::BitField;
use std::ops::RangeInclusive;


/// The bytes every stream starts with.
pub const MAGIC_NUMBER: [u8; 4] = *b"YCCB";

/// The only stream layout version written by this implementation.
pub const FORMAT_VERSION: u8 = 1;

/// Valid number of bits for stored luma residuals and for averaged chroma.
pub const BIT_COUNT_RANGE: RangeInclusive<u8> = 1 ..= 8;

/// Valid width and height of a block.
pub const BLOCK_SIZE_RANGE: RangeInclusive<usize> = 2 ..= 8;

/// Bit of the flags byte that is set when the packed blocks are run length encoded.
const RLE_FLAG_BIT: usize = 0;


/// Controls how much precision is discarded.
/// All values are guaranteed to be inside their valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Parameters {
    y_delta_bits: u8,
    crcb_bits: u8,
    block_size: usize,
}

impl Default for Parameters {
    fn default() -> Self {
        Self { y_delta_bits: 4, crcb_bits: 4, block_size: 8 }
    }
}

impl Parameters {

    /// Validate the parameters.
    /// Bit counts must be within `1 ..= 8`, the block size must be an even number in `2 ..= 8`.
    pub fn new(y_delta_bits: u8, crcb_bits: u8, block_size: usize) -> Result<Self> {
        validate_bit_count(y_delta_bits, "luma residual bit count")?;
        validate_bit_count(crcb_bits, "chroma bit count")?;
        validate_block_size(block_size)?;
        Ok(Self { y_delta_bits, crcb_bits, block_size })
    }

    /// Move each value into its valid range instead of failing.
    /// An odd block size is rounded up to the next even number,
    /// such that the chroma of a block is always averaged symmetrically.
    pub fn clamped(y_delta_bits: i64, crcb_bits: i64, block_size: i64) -> Self {
        let clamp_bits = |bits: i64| bits.clamp(
            i64::from(*BIT_COUNT_RANGE.start()),
            i64::from(*BIT_COUNT_RANGE.end())
        ) as u8;

        let block_size = block_size.clamp(
            *BLOCK_SIZE_RANGE.start() as i64,
            *BLOCK_SIZE_RANGE.end() as i64
        ) as usize;

        Self {
            y_delta_bits: clamp_bits(y_delta_bits),
            crcb_bits: clamp_bits(crcb_bits),
            block_size: block_size + block_size % 2,
        }
    }

    /// Parse textual values, as they would be typed on a command line.
    /// Values that are not integers are replaced by the default value,
    /// values that are out of range are clamped.
    pub fn from_strings(y_delta_bits: &str, crcb_bits: &str, block_size: &str) -> Self {
        let defaults = Self::default();
        let parse = |text: &str, default: i64| text.trim().parse::<i64>().unwrap_or(default);

        Self::clamped(
            parse(y_delta_bits, i64::from(defaults.y_delta_bits)),
            parse(crcb_bits, i64::from(defaults.crcb_bits)),
            parse(block_size, defaults.block_size as i64),
        )
    }

    /// Bits stored per pixel for the luma residual.
    #[inline] pub fn y_delta_bits(&self) -> u8 { self.y_delta_bits }

    /// Bits stored per block for each of the two averaged chroma channels.
    #[inline] pub fn crcb_bits(&self) -> u8 { self.crcb_bits }

    /// Nominal width and height of a block. Blocks at the right and bottom edges may be smaller.
    #[inline] pub fn block_size(&self) -> usize { self.block_size }

    /// Number of blocks in each dimension, including the partial blocks at the edges.
    pub fn block_count(&self, resolution: Vec2<usize>) -> Vec2<usize> {
        resolution.map(|length| RoundingMode::Up.divide(length, self.block_size))
    }
}

fn validate_bit_count(bits: u8, name: &'static str) -> UnitResult {
    if BIT_COUNT_RANGE.contains(&bits) { Ok(()) }
    else { Err(Error::invalid(format!("{} {} is not within 1 to 8", name, bits))) }
}

/// Block sizes must be an even number in `2 ..= 8`.
pub fn validate_block_size(block_size: usize) -> UnitResult {
    if !BLOCK_SIZE_RANGE.contains(&block_size) {
        return Err(Error::invalid(format!("block size {} is not within 2 to 8", block_size)));
    }

    if block_size % 2 != 0 {
        return Err(Error::invalid(format!("block size {} is not even", block_size)));
    }

    Ok(())
}


/// Precedes the packed blocks.
/// Contains everything required to locate each block,
/// as the blocks themselves do not store their position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {

    /// Width and height of the whole image in pixels.
    pub resolution: Vec2<usize>,

    /// Nominal size of each block.
    pub block_size: usize,

    /// How the packed blocks are stored after the header.
    pub compression: Compression,
}

impl Header {

    /// Number of bytes written by `Header::write`.
    pub const BYTE_SIZE: usize = std::mem::size_of::<[u8; 4]>() + 2 * u8::BYTE_SIZE + 2 * u32::BYTE_SIZE + u8::BYTE_SIZE;

    /// Check that the block size could have been produced by valid `Parameters`.
    pub fn validate(&self) -> UnitResult {
        validate_block_size(self.block_size)
    }

    /// Write the magic number, version, flags, resolution and block size.
    pub fn write(&self, write: &mut impl Write) -> UnitResult {
        self.validate()?;

        let mut flags = 0_u8;
        flags.set_bit(RLE_FLAG_BIT, self.compression == Compression::RLE);

        u8::write_slice(write, &MAGIC_NUMBER)?;
        FORMAT_VERSION.write(write)?;
        flags.write(write)?;

        let resolution = self.resolution.to_u32("image resolution")?;
        resolution.width().write(write)?;
        resolution.height().write(write)?;

        usize_to_u8(self.block_size, "block size")?.write(write)?;
        Ok(())
    }

    /// Read and validate a header.
    pub fn read(read: &mut impl Read) -> Result<Self> {
        let mut magic_number = [0_u8; 4];
        u8::read_slice(read, &mut magic_number)?;

        if magic_number != MAGIC_NUMBER {
            return Err(Error::invalid("stream identifier missing"));
        }

        let version = u8::read(read)?;
        if version != FORMAT_VERSION {
            return Err(Error::unsupported(format!("stream format version {}", version)));
        }

        let flags = u8::read(read)?;

        // all bits except the rle bit are reserved and should be 0
        if flags >> (RLE_FLAG_BIT + 1) != 0 {
            return Err(Error::unsupported("stream flags"));
        }

        let compression = if flags.get_bit(RLE_FLAG_BIT) { Compression::RLE } else { Compression::Uncompressed };

        let width = u32::read(read)?;
        let height = u32::read(read)?;
        let resolution = Vec2(width, height).to_usize("image resolution")?;
        let block_size = usize::from(u8::read(read)?);

        let header = Header { resolution, block_size, compression };
        header.validate()?;
        Ok(header)
    }
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parameters_reject_out_of_range(){
        assert!(Parameters::new(4, 4, 8).is_ok());
        assert!(Parameters::new(1, 8, 2).is_ok());

        assert!(Parameters::new(0, 4, 8).is_err());
        assert!(Parameters::new(9, 4, 8).is_err());
        assert!(Parameters::new(4, 0, 8).is_err());
        assert!(Parameters::new(4, 9, 8).is_err());
        assert!(Parameters::new(4, 4, 1).is_err());
        assert!(Parameters::new(4, 4, 10).is_err());
        assert!(Parameters::new(4, 4, 5).is_err());
    }

    #[test]
    fn block_size_must_be_even_and_in_range(){
        for block_size in [2, 4, 6, 8] {
            assert!(validate_block_size(block_size).is_ok());
        }

        for block_size in [0, 1, 3, 5, 7, 9, 10, 64] {
            assert!(matches!(validate_block_size(block_size), Err(Error::Invalid(_))));
        }
    }

    #[test]
    fn parameters_clamp(){
        assert_eq!(Parameters::clamped(0, 12, 1), Parameters::new(1, 8, 2).unwrap());
        assert_eq!(Parameters::clamped(-3, 3, 5), Parameters::new(1, 3, 6).unwrap());
        assert_eq!(Parameters::clamped(4, 4, 7), Parameters::new(4, 4, 8).unwrap());
        assert_eq!(Parameters::clamped(4, 4, 100), Parameters::new(4, 4, 8).unwrap());
    }

    #[test]
    fn parameters_from_text(){
        assert_eq!(Parameters::from_strings("2", "6", "4"), Parameters::new(2, 6, 4).unwrap());
        assert_eq!(Parameters::from_strings("x", "", "three"), Parameters::default());
        assert_eq!(Parameters::from_strings(" 20 ", "-1", "3"), Parameters::new(8, 1, 4).unwrap());
    }

    #[test]
    fn block_count_includes_partial_blocks(){
        let parameters = Parameters::new(4, 4, 4).unwrap();
        assert_eq!(parameters.block_count(Vec2(8, 9)), Vec2(2, 3));
        assert_eq!(parameters.block_count(Vec2(1, 1)), Vec2(1, 1));
        assert_eq!(parameters.block_count(Vec2(0, 0)), Vec2(0, 0));
    }

    #[test]
    fn header_round_trip(){
        let header = Header { resolution: Vec2(640, 3), block_size: 6, compression: Compression::RLE };

        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        assert_eq!(bytes.len(), Header::BYTE_SIZE);
        assert_eq!(&bytes[.. 4], b"YCCB");
        assert_eq!(bytes[5], 0b1);

        assert_eq!(Header::read(&mut bytes.as_slice()).unwrap(), header);
    }

    #[test]
    fn damaged_header(){
        let header = Header { resolution: Vec2(4, 4), block_size: 4, compression: Compression::Uncompressed };
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();

        let mut wrong_magic = bytes.clone();
        wrong_magic[0] = b'X';
        assert!(matches!(Header::read(&mut wrong_magic.as_slice()), Err(Error::Invalid(_))));

        let mut future_version = bytes.clone();
        future_version[4] = 2;
        assert!(matches!(Header::read(&mut future_version.as_slice()), Err(Error::NotSupported(_))));

        let mut unknown_flags = bytes.clone();
        unknown_flags[5] = 0b10;
        assert!(matches!(Header::read(&mut unknown_flags.as_slice()), Err(Error::NotSupported(_))));

        let mut huge_blocks = bytes.clone();
        huge_blocks[Header::BYTE_SIZE - 1] = 200;
        assert!(Header::read(&mut huge_blocks.as_slice()).is_err());

        assert!(matches!(Header::read(&mut &bytes[.. 7]), Err(Error::Invalid(_))));
    }
}
