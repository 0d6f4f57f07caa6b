
//! Quantization of a single rectangular tile of pixels.
//! Each block stores every pixel's luma relative to the darkest pixel,
//! and only one averaged chroma value for the whole block.

use smallvec::SmallVec;
use crate::color::{Rgb, ycrcb_to_rgb};
use crate::error::{Error, Result};
use crate::image::GetPixel;
use crate::io::{BitPacker, BitReader};
use crate::math::*;
use crate::meta::{Parameters, BIT_COUNT_RANGE};


/// Luma residuals of all pixels in a block, row by row.
/// Blocks never contain more than 8 by 8 pixels.
pub type Residuals = SmallVec<[u8; 64]>;

/// Bytes that every block costs, regardless of its contents:
/// the two bit counts, the base luma, and the luma range.
pub const HEADER_BYTE_SIZE: usize = 4;


/// One compressed tile of an image.
/// Created once from the source pixels and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantizedBlock {
    position: Vec2<usize>,
    size: Vec2<usize>,

    y_delta_bits: u8,
    crcb_bits: u8,

    base_y: u8,
    max_delta: u8,
    y_residuals: Residuals,

    avg_cr: u8,
    avg_cb: u8,
}

impl QuantizedBlock {

    /// The block starting at `position`, clipped to the image.
    /// Blocks at the right and bottom edge may be smaller than the nominal block size.
    /// Panics if the position is not inside the image.
    pub fn clipped_size(resolution: Vec2<usize>, position: Vec2<usize>, block_size: usize) -> Vec2<usize> {
        assert!(
            position.x() < resolution.width() && position.y() < resolution.height(),
            "block position {:?} outside of image {:?}", position, resolution
        );

        Vec2(block_size, block_size).min(resolution - position)
    }

    /// Quantize the block of pixels whose top left corner is at `position`.
    /// Panics if the position is not inside the image.
    pub fn encode(image: &impl GetPixel, position: Vec2<usize>, parameters: Parameters) -> Self {
        let size = Self::clipped_size(image.resolution(), position, parameters.block_size());

        let mut y_residuals = Residuals::with_capacity(size.area());
        let (mut min_y, mut max_y) = (u8::MAX, u8::MIN);
        let (mut cr_sum, mut cb_sum) = (0_usize, 0_usize);

        for y in 0 .. size.height() {
            for x in 0 .. size.width() {
                let pixel = image.get_pixel(position + Vec2(x, y)).to_ycrcb();

                min_y = min_y.min(pixel.y);
                max_y = max_y.max(pixel.y);
                cr_sum += usize::from(pixel.cr);
                cb_sum += usize::from(pixel.cb);

                y_residuals.push(pixel.y);
            }
        }

        let max_delta = max_y - min_y;
        let shift = quantization_shift(max_delta, parameters.y_delta_bits());

        for luma in &mut y_residuals {
            *luma = (*luma - min_y) >> shift;
        }

        let chroma_shift = 8 - parameters.crcb_bits();
        let average = |sum: usize| (RoundingMode::Down.divide(sum, size.area()) >> chroma_shift) as u8;

        log::trace!(
            "block at {:?} of size {:?}: base luma {}, luma range {}, discarding {} bits",
            position, size, min_y, max_delta, shift
        );

        QuantizedBlock {
            position, size,
            y_delta_bits: parameters.y_delta_bits(),
            crcb_bits: parameters.crcb_bits(),
            base_y: min_y,
            max_delta,
            y_residuals,
            avg_cr: average(cr_sum),
            avg_cb: average(cb_sum),
        }
    }

    /// Reconstruct the pixels of this block, row by row.
    /// Returns exactly `size.area()` pixels.
    pub fn decode(&self) -> Vec<Rgb> {
        let chroma_shift = 8 - self.crcb_bits;
        let cr = self.avg_cr << chroma_shift;
        let cb = self.avg_cb << chroma_shift;

        let shift = self.quantization_shift();
        let base_y = u32::from(self.base_y);

        self.y_residuals.iter()
            .map(|&residual| {
                // only damaged streams could exceed the maximum
                let y = ((u32::from(residual) << shift) + base_y).min(u32::from(u8::MAX));
                ycrcb_to_rgb(y as u8, cr, cb)
            })
            .collect()
    }

    /// The number of bytes this block is expected to occupy.
    /// A block without any luma variation only needs its header.
    pub fn compressed_byte_size(&self) -> usize {
        let residual_byte_size =
            if self.max_delta == 0 { 0 }
            else { RoundingMode::Up.divide(self.pixel_count() * usize::from(self.y_delta_bits), 8) };

        HEADER_BYTE_SIZE + residual_byte_size
    }

    /// Append all fields of this block to the packer.
    /// The block position and size are not written, they are implied by the order of the blocks.
    /// Residuals are only written if the luma varies.
    pub fn write(&self, packer: &mut BitPacker) {
        packer.write_byte(self.crcb_bits);
        packer.write(u32::from(self.avg_cr), self.crcb_bits);
        packer.write(u32::from(self.avg_cb), self.crcb_bits);
        packer.write_byte(self.y_delta_bits);
        packer.write_byte(self.base_y);
        packer.write_byte(self.max_delta);

        if self.max_delta > 0 {
            // a residual of exactly 2^bits cannot be stored and is saturated
            let max_field_value = (1_u32 << self.y_delta_bits) - 1;

            for &residual in &self.y_residuals {
                packer.write(u32::from(residual).min(max_field_value), self.y_delta_bits);
            }
        }
    }

    /// Read a block that was written with `QuantizedBlock::write`.
    /// The position and size must be known from the order of the blocks.
    pub fn read(reader: &mut BitReader<'_>, position: Vec2<usize>, size: Vec2<usize>) -> Result<Self> {
        let crcb_bits = read_bit_count(reader, "chroma bit count")?;
        let avg_cr = reader.read(crcb_bits)? as u8;
        let avg_cb = reader.read(crcb_bits)? as u8;

        let y_delta_bits = read_bit_count(reader, "luma residual bit count")?;
        let base_y = reader.read_byte()?;
        let max_delta = reader.read_byte()?;

        if u32::from(base_y) + u32::from(max_delta) > u32::from(u8::MAX) {
            return Err(Error::invalid("block luma range"));
        }

        if size.area() == 0 || size.area() > 64 {
            return Err(Error::invalid("block size"));
        }

        let y_residuals = {
            if max_delta == 0 { smallvec![0; size.area()] }
            else {
                (0 .. size.area())
                    .map(|_| reader.read(y_delta_bits).map(|residual| residual as u8))
                    .collect::<Result<Residuals>>()?
            }
        };

        Ok(QuantizedBlock {
            position, size,
            y_delta_bits, crcb_bits,
            base_y, max_delta, y_residuals,
            avg_cr, avg_cb,
        })
    }

    /// Smallest `b` such that `2^b >= max_delta`.
    pub fn residual_bits_needed(&self) -> u8 {
        ceil_log_2(u32::from(self.max_delta)) as u8
    }

    /// How many low bits of each residual were discarded.
    pub fn quantization_shift(&self) -> u8 {
        quantization_shift(self.max_delta, self.y_delta_bits)
    }

    /// Top left pixel of the block inside the image.
    #[inline] pub fn position(&self) -> Vec2<usize> { self.position }

    /// Width and height of the block, clipped to the image.
    #[inline] pub fn size(&self) -> Vec2<usize> { self.size }

    /// Number of pixels in this block.
    #[inline] pub fn pixel_count(&self) -> usize { self.size.area() }

    /// Bits per stored luma residual.
    #[inline] pub fn y_delta_bits(&self) -> u8 { self.y_delta_bits }

    /// Bits of each averaged chroma value.
    #[inline] pub fn crcb_bits(&self) -> u8 { self.crcb_bits }

    /// The smallest luma value in the block.
    #[inline] pub fn base_y(&self) -> u8 { self.base_y }

    /// The difference between the largest and smallest luma value in the block.
    #[inline] pub fn max_delta(&self) -> u8 { self.max_delta }

    /// Quantized luma of each pixel, relative to the base luma.
    #[inline] pub fn y_residuals(&self) -> &[u8] { &self.y_residuals }

    /// Quantized average red difference.
    #[inline] pub fn avg_cr(&self) -> u8 { self.avg_cr }

    /// Quantized average blue difference.
    #[inline] pub fn avg_cb(&self) -> u8 { self.avg_cb }
}

fn quantization_shift(max_delta: u8, y_delta_bits: u8) -> u8 {
    let bits_needed = ceil_log_2(u32::from(max_delta)) as u8;
    bits_needed.saturating_sub(y_delta_bits)
}

fn read_bit_count(reader: &mut BitReader<'_>, name: &'static str) -> Result<u8> {
    let bits = reader.read_byte()?;

    if BIT_COUNT_RANGE.contains(&bits) { Ok(bits) }
    else { Err(Error::invalid(name)) }
}
