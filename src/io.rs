
//! Specialized binary input and output.
//! Contains the bit level packing used by the block stream,
//! and little endian primitives for the stream header.
//! Uses the error handling for this crate.

pub use ::std::io::{Read, Write};
use bit_field::BitField;
use lebe::prelude::*;
use crate::compression::{ByteVec, Bytes};
use crate::error::{Error, Result, UnitResult};


/// Append-only buffer of bit fields with arbitrary widths.
///
/// Each field is written starting with its least significant bit.
/// Fields are not byte aligned, they continue in the
/// byte where the previous field ended. A new byte is only
/// allocated as soon as the first bit of it is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitPacker {
    bytes: ByteVec,

    /// The next free bit in the last byte, always in `0 .. 8`.
    /// Zero means that the last byte is full (or no byte exists yet).
    bit_index: u8,
}

impl BitPacker {

    /// Create an empty packer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty packer that will not reallocate for the first `byte_capacity` bytes.
    pub fn with_capacity(byte_capacity: usize) -> Self {
        Self { bytes: Vec::with_capacity(byte_capacity), bit_index: 0 }
    }

    /// Append the `bit_count` least significant bits of `value`.
    /// Any higher bits of `value` are silently dropped.
    /// Panics if `bit_count` is larger than 32.
    pub fn write(&mut self, value: u32, bit_count: u8) {
        for bit in 0 .. usize::from(bit_count) {
            if self.bit_index == 0 {
                self.bytes.push(0);
            }

            let last_index = self.bytes.len() - 1;
            self.bytes[last_index].set_bit(usize::from(self.bit_index), value.get_bit(bit));
            self.bit_index = (self.bit_index + 1) % 8;
        }
    }

    /// Append a full byte.
    #[inline]
    pub fn write_byte(&mut self, value: u8) {
        self.write(u32::from(value), 8)
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        match self.bit_index {
            0 => self.bytes.len() * 8,
            partial => (self.bytes.len() - 1) * 8 + usize::from(partial),
        }
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The packed bytes. The unused high bits of the last byte are zero.
    pub fn as_bytes(&self) -> Bytes<'_> {
        &self.bytes
    }

    /// Copy the packed bytes. The unused high bits of the last byte are zero.
    pub fn to_bytes(&self) -> ByteVec {
        self.bytes.clone()
    }

    /// Return the packed bytes without copying.
    pub fn into_bytes(self) -> ByteVec {
        self.bytes
    }
}


/// Reads the bit fields written by a `BitPacker`, in the same order and with the same widths.
#[derive(Debug, Clone)]
pub struct BitReader<'s> {
    bytes: Bytes<'s>,
    bit_position: usize,
}

impl<'s> BitReader<'s> {

    /// Start reading at the first bit of the slice.
    pub fn new(bytes: Bytes<'s>) -> Self {
        Self { bytes, bit_position: 0 }
    }

    /// Read a field of `bit_count` bits, least significant bit first.
    /// Returns `Error::Invalid` if the slice does not contain enough bits.
    /// Panics if `bit_count` is larger than 32.
    pub fn read(&mut self, bit_count: u8) -> Result<u32> {
        let bit_count = usize::from(bit_count);

        if bit_count > self.remaining_bits() {
            return Err(Error::invalid("bit stream ends inside a field"));
        }

        let mut value = 0_u32;
        for bit in 0 .. bit_count {
            let position = self.bit_position + bit;
            value.set_bit(bit, self.bytes[position / 8].get_bit(position % 8));
        }

        self.bit_position += bit_count;
        Ok(value)
    }

    /// Read a full byte.
    #[inline]
    pub fn read_byte(&mut self) -> Result<u8> {
        self.read(8).map(|value| value as u8)
    }

    /// How many bits have not been read yet, including the padding of the last byte.
    pub fn remaining_bits(&self) -> usize {
        self.bytes.len() * 8 - self.bit_position
    }
}


/// Generic trait that defines common binary operations such as reading and writing for this type.
pub trait Data: Sized + Default + Clone {

    /// Number of bytes this would consume in a file.
    const BYTE_SIZE: usize = ::std::mem::size_of::<Self>();

    /// Read a value of type `Self`.
    fn read(read: &mut impl Read) -> Result<Self>;

    /// Read as many values of type `Self` as fit into the specified slice.
    /// If the slice cannot be filled completely, returns `Error::Invalid`.
    fn read_slice(read: &mut impl Read, slice: &mut[Self]) -> UnitResult;

    /// Write this value to the writer.
    fn write(self, write: &mut impl Write) -> UnitResult;

    /// Write all values of that slice to the writer.
    fn write_slice(write: &mut impl Write, slice: &[Self]) -> UnitResult;
}


macro_rules! implement_data_for_primitive {
    ($kind: ident) => {
        impl Data for $kind {
            #[inline]
            fn read(read: &mut impl Read) -> Result<Self> {
                Ok(read.read_from_little_endian()?)
            }

            #[inline]
            fn write(self, write: &mut impl Write) -> Result<()> {
                write.write_as_little_endian(&self)?;
                Ok(())
            }

            #[inline]
            fn read_slice(read: &mut impl Read, slice: &mut [Self]) -> Result<()> {
                read.read_from_little_endian_into(slice)?;
                Ok(())
            }

            #[inline]
            fn write_slice(write: &mut impl Write, slice: &[Self]) -> Result<()> {
                write.write_as_little_endian(slice)?;
                Ok(())
            }
        }
    };
}

implement_data_for_primitive!(u8);
implement_data_for_primitive!(u32);


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fields_of_mixed_width_read_back(){
        let widths = [3_u8, 5, 8, 1];
        let values = [5_u32, 17, 200, 1];

        let mut packer = BitPacker::new();
        for (&value, &width) in values.iter().zip(&widths) {
            packer.write(value, width);
        }

        assert_eq!(packer.bit_len(), 17);
        assert_eq!(packer.as_bytes().len(), 3);

        let bytes = packer.into_bytes();
        let mut reader = BitReader::new(&bytes);
        for (&value, &width) in values.iter().zip(&widths) {
            assert_eq!(reader.read(width).unwrap(), value);
        }

        assert_eq!(reader.remaining_bits(), 7);
    }

    #[test]
    fn least_significant_bit_first(){
        let mut packer = BitPacker::new();
        packer.write(0b1, 1);
        packer.write(0b10, 2);
        assert_eq!(packer.as_bytes(), &[0b101]);

        packer.write(0b11111, 5);
        assert_eq!(packer.as_bytes(), &[0b1111_1101]);

        // the cursor wrapped, so the next bit allocates a new byte
        packer.write(1, 1);
        assert_eq!(packer.as_bytes(), &[0b1111_1101, 0b1]);
    }

    #[test]
    fn fields_cross_byte_boundaries(){
        let mut packer = BitPacker::new();
        packer.write(0, 6);
        packer.write(0b1111, 4);
        assert_eq!(packer.to_bytes(), vec![0b1100_0000, 0b11]);
    }

    #[test]
    fn excess_bits_are_dropped(){
        let mut packer = BitPacker::new();
        packer.write(0b1_0110, 4);
        packer.write_byte(0);
        assert_eq!(packer.as_bytes(), &[0b0110, 0]);
    }

    #[test]
    fn empty_packer(){
        let packer = BitPacker::new();
        assert!(packer.is_empty());
        assert_eq!(packer.bit_len(), 0);
        assert!(packer.into_bytes().is_empty());

        // writing zero bits does not allocate
        let mut packer = BitPacker::new();
        packer.write(123, 0);
        assert!(packer.is_empty());
    }

    #[test]
    fn reading_beyond_end_fails(){
        let bytes = [0xff_u8];
        let mut reader = BitReader::new(&bytes);
        assert_eq!(reader.read(5).unwrap(), 0b11111);
        assert!(reader.read(4).is_err());
        assert_eq!(reader.read(3).unwrap(), 0b111);
        assert!(reader.read_byte().is_err());
    }

    #[test]
    fn little_endian_primitives(){
        let mut bytes = Vec::new();
        0x0403_0201_u32.write(&mut bytes).unwrap();
        7_u8.write(&mut bytes).unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4, 7]);

        let mut read = bytes.as_slice();
        assert_eq!(u32::read(&mut read).unwrap(), 0x0403_0201);
        assert_eq!(u8::read(&mut read).unwrap(), 7);
        assert!(u8::read(&mut read).is_err());
    }
}
