
//! Whole images: splits an image into blocks, quantizes them,
//! and writes or reads the complete compressed stream.
//!
//! The stream consists of a `Header` followed by the packed bits of all blocks,
//! optionally run length encoded. The blocks are stored row by row,
//! from left to right and from top to bottom.

use crate::block::QuantizedBlock;
use crate::color::Rgb;
use crate::compression::{ByteVec, Bytes, Compression};
use crate::error::{Error, Result};
use crate::io::{BitPacker, BitReader, Read, Write};
use crate::math::*;
use crate::meta::{validate_block_size, Header, Parameters, BIT_COUNT_RANGE};

#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelIterator, ParallelIterator};


/// A source of pixels that can be compressed.
/// Might be accessed from multiple threads at the same time.
pub trait GetPixel: Sync {

    /// Width and height of the image in pixels.
    fn resolution(&self) -> Vec2<usize>;

    /// Inspect a single pixel. The position will not exceed the resolution.
    fn get_pixel(&self, position: Vec2<usize>) -> Rgb;
}


/// Stores all pixels of an image in a single vector, row by row.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbImage {
    resolution: Vec2<usize>,
    pixels: Vec<Rgb>,
}

impl RgbImage {

    /// Create a new image, checking the length of the provided pixels vector.
    pub fn new(resolution: impl Into<Vec2<usize>>, pixels: Vec<Rgb>) -> Self {
        let resolution = resolution.into();
        assert_eq!(resolution.area(), pixels.len(), "expected {} pixels, but vector length is {}", resolution.area(), pixels.len());
        Self { resolution, pixels }
    }

    /// Create an image where every pixel has the same color.
    pub fn filled(resolution: impl Into<Vec2<usize>>, pixel: Rgb) -> Self {
        let resolution = resolution.into();
        Self { resolution, pixels: vec![pixel; resolution.area()] }
    }

    /// Compute each pixel from its position.
    pub fn from_fn(resolution: impl Into<Vec2<usize>>, pixel: impl FnMut(Vec2<usize>) -> Rgb) -> Self {
        let resolution = resolution.into();

        let pixels = (0 .. resolution.height())
            .flat_map(|y| (0 .. resolution.width()).map(move |x| Vec2(x, y)))
            .map(pixel)
            .collect();

        Self { resolution, pixels }
    }

    /// Create an image from packed `0xRRGGBB` values, row by row.
    pub fn from_packed(resolution: impl Into<Vec2<usize>>, packed: &[u32]) -> Result<Self> {
        let resolution = resolution.into();

        if packed.len() != resolution.area() {
            return Err(Error::invalid("pixel count does not match resolution"));
        }

        Ok(Self { resolution, pixels: packed.iter().map(|&pixel| Rgb::from_packed(pixel)).collect() })
    }

    /// Create an image from interleaved red, green and blue bytes, row by row.
    pub fn from_rgb8_bytes(resolution: impl Into<Vec2<usize>>, bytes: Bytes<'_>) -> Result<Self> {
        let resolution = resolution.into();

        if bytes.len() != resolution.area() * 3 {
            return Err(Error::invalid("byte count does not match resolution"));
        }

        let pixels = bytes.chunks_exact(3)
            .map(|rgb| Rgb::new(rgb[0], rgb[1], rgb[2]))
            .collect();

        Ok(Self { resolution, pixels })
    }

    /// Interleaved red, green and blue bytes, row by row.
    pub fn to_rgb8_bytes(&self) -> ByteVec {
        self.pixels.iter().flat_map(|pixel| [pixel.r, pixel.g, pixel.b]).collect()
    }

    /// Packed `0xRRGGBB` values, row by row.
    pub fn to_packed(&self) -> Vec<u32> {
        self.pixels.iter().map(|pixel| pixel.to_packed()).collect()
    }

    /// Width and height in pixels.
    #[inline] pub fn resolution(&self) -> Vec2<usize> { self.resolution }

    /// All pixels, row by row.
    #[inline] pub fn pixels(&self) -> &[Rgb] { &self.pixels }

    /// Compute the flat index of a specific pixel.
    /// Panics for invalid pixel coordinates.
    #[inline]
    pub fn compute_pixel_index(&self, position: Vec2<usize>) -> usize {
        position.flat_index_for_size(self.resolution)
    }

    /// Overwrite a rectangle of pixels. The pixels are expected row by row.
    /// Panics if the rectangle is not inside the image.
    pub fn write_block(&mut self, position: Vec2<usize>, size: Vec2<usize>, pixels: &[Rgb]) {
        assert_eq!(size.area(), pixels.len(), "block pixel count does not match block size");
        assert!(
            position.x() + size.width() <= self.resolution.width() && position.y() + size.height() <= self.resolution.height(),
            "block {:?} of size {:?} is outside of image {:?}", position, size, self.resolution
        );

        for (row_index, row) in pixels.chunks_exact(size.width().max(1)).enumerate() {
            let start = self.compute_pixel_index(position + Vec2(0, row_index));
            self.pixels[start .. start + size.width()].copy_from_slice(row);
        }
    }
}

impl GetPixel for RgbImage {
    #[inline] fn resolution(&self) -> Vec2<usize> { self.resolution }

    #[inline]
    fn get_pixel(&self, position: Vec2<usize>) -> Rgb {
        self.pixels[self.compute_pixel_index(position)]
    }
}

impl std::fmt::Debug for RgbImage {
    #[inline] fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "RgbImage {{ resolution: {:?}, pixels: [Rgb; {}] }}", self.resolution, self.pixels.len())
    }
}


/// Sizes collected while compressing an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionStats {

    /// Width and height of the image in pixels.
    pub resolution: Vec2<usize>,

    /// Number of quantized blocks, including partial edge blocks.
    pub block_count: usize,

    /// Three bytes per pixel.
    pub original_byte_size: usize,

    /// Sum of `QuantizedBlock::compressed_byte_size` of all blocks.
    pub estimated_byte_size: usize,

    /// Bytes of all packed blocks, before run length encoding.
    pub packed_byte_size: usize,

    /// Bytes actually written, including the header.
    pub written_byte_size: usize,

    /// The compression that was actually used, which may differ from the requested one.
    pub compression: Compression,
}

impl CompressionStats {

    /// Percentage of the original size that the estimated block sizes occupy.
    pub fn estimated_ratio(&self) -> f64 {
        percentage(self.estimated_byte_size, self.original_byte_size)
    }

    /// Percentage of the original size that the written stream occupies.
    pub fn written_ratio(&self) -> f64 {
        percentage(self.written_byte_size, self.original_byte_size)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 { 0.0 } else { part as f64 * 100.0 / whole as f64 }
}

/// Sum of the expected sizes of all blocks.
pub fn estimated_byte_size(blocks: &[QuantizedBlock]) -> usize {
    blocks.iter().map(QuantizedBlock::compressed_byte_size).sum()
}


/// The top left corner of each block, in the order the blocks are stored.
/// Row by row, from left to right and from top to bottom.
pub fn block_positions(resolution: Vec2<usize>, block_size: usize) -> impl Iterator<Item = Vec2<usize>> {
    (0 .. resolution.height()).step_by(block_size)
        .flat_map(move |y| (0 .. resolution.width()).step_by(block_size).map(move |x| Vec2(x, y)))
}

/// Quantize all blocks of the image, in stream order.
/// Uses all cores if the `rayon` feature is enabled.
pub fn encode_blocks(image: &impl GetPixel, parameters: Parameters) -> Vec<QuantizedBlock> {
    let positions: Vec<Vec2<usize>> = block_positions(image.resolution(), parameters.block_size()).collect();

    #[cfg(feature = "rayon")]
    let blocks = positions.into_par_iter()
        .map(|position| QuantizedBlock::encode(image, position, parameters))
        .collect();

    #[cfg(not(feature = "rayon"))]
    let blocks = positions.into_iter()
        .map(|position| QuantizedBlock::encode(image, position, parameters))
        .collect();

    blocks
}

/// Decode all blocks into a new image.
/// Pixels that are not covered by any block stay black.
pub fn reconstruct(resolution: Vec2<usize>, blocks: &[QuantizedBlock]) -> RgbImage {
    let mut image = RgbImage::filled(resolution, Rgb::default());

    for block in blocks {
        image.write_block(block.position(), block.size(), &block.decode());
    }

    image
}

/// Quantize and immediately reconstruct the image, to inspect the loss of quality.
pub fn preview(image: &impl GetPixel, parameters: Parameters) -> RgbImage {
    reconstruct(image.resolution(), &encode_blocks(image, parameters))
}

/// Append the fields of all blocks to a single bit stream.
pub fn pack_blocks(blocks: &[QuantizedBlock]) -> ByteVec {
    let mut packer = BitPacker::with_capacity(estimated_byte_size(blocks));

    for block in blocks {
        block.write(&mut packer);
    }

    packer.into_bytes()
}

/// Read all blocks of an image with the specified resolution and block size.
/// Fails if the bytes contain more or less than the blocks.
pub fn unpack_blocks(packed: Bytes<'_>, resolution: Vec2<usize>, block_size: usize) -> Result<Vec<QuantizedBlock>> {
    validate_block_size(block_size)?;

    // a block without residuals has two full bytes, two bit counts, and two chroma values
    let min_block_bits = 4 * 8 + 2 * usize::from(*BIT_COUNT_RANGE.start());
    let max_block_count = packed.len() * 8 / min_block_bits;

    let block_count = RoundingMode::Up.divide(resolution.width(), block_size)
        .checked_mul(RoundingMode::Up.divide(resolution.height(), block_size))
        .ok_or_else(|| Error::invalid("image resolution"))?;

    if block_count > max_block_count {
        return Err(Error::invalid("image resolution exceeds packed blocks"));
    }

    let mut reader = BitReader::new(packed);
    let mut blocks = Vec::with_capacity(block_count);

    for position in block_positions(resolution, block_size) {
        let size = QuantizedBlock::clipped_size(resolution, position, block_size);
        blocks.push(QuantizedBlock::read(&mut reader, position, size)?);
    }

    if reader.remaining_bits() >= 8 {
        return Err(Error::invalid("unexpected bytes after last block"));
    }

    Ok(blocks)
}


/// Compress the image and write the stream to the writer.
/// Tries the requested compression, but stores the packed blocks
/// uncompressed if run length encoding would not make them smaller.
/// Use a `BufWriter` for files.
pub fn write_to_buffered(
    image: &impl GetPixel, parameters: Parameters,
    compression: Compression, write: &mut impl Write
) -> Result<CompressionStats>
{
    let resolution = image.resolution();
    let blocks = encode_blocks(image, parameters);
    let packed = pack_blocks(&blocks);

    let (compression, payload) = compression.compress_if_smaller(&packed);
    let header = Header { resolution, block_size: parameters.block_size(), compression };

    header.write(write)?;
    write.write_all(&payload)?;

    let stats = CompressionStats {
        resolution, compression,
        block_count: blocks.len(),
        original_byte_size: resolution.area() * 3,
        estimated_byte_size: estimated_byte_size(&blocks),
        packed_byte_size: packed.len(),
        written_byte_size: Header::BYTE_SIZE + payload.len(),
    };

    log::debug!(
        "wrote {} blocks of {:?} pixels with {}: {} bytes ({:.1}% of original, {:.1}% estimated)",
        stats.block_count, resolution, compression, stats.written_byte_size,
        stats.written_ratio(), stats.estimated_ratio(),
    );

    Ok(stats)
}

/// Compress the image into a new byte vector.
pub fn write_to_vec(image: &impl GetPixel, parameters: Parameters, compression: Compression) -> Result<ByteVec> {
    let mut bytes = Vec::new();
    write_to_buffered(image, parameters, compression, &mut bytes)?;
    Ok(bytes)
}

/// Read a complete stream and reconstruct the image.
/// Use a `BufReader` for files.
pub fn read_from_buffered(read: &mut impl Read) -> Result<RgbImage> {
    let header = Header::read(read)?;

    let mut payload = Vec::new();
    read.read_to_end(&mut payload)?;

    let packed = header.compression.decompress_bytes(&payload, payload.len())?;
    let blocks = unpack_blocks(&packed, header.resolution, header.block_size)?;

    log::debug!(
        "read {} blocks of {:?} pixels with {}",
        blocks.len(), header.resolution, header.compression
    );

    Ok(reconstruct(header.resolution, &blocks))
}

/// Read a complete stream from memory and reconstruct the image.
pub fn read_from_slice(mut bytes: Bytes<'_>) -> Result<RgbImage> {
    read_from_buffered(&mut bytes)
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::block::HEADER_BYTE_SIZE;

    fn gradient(resolution: Vec2<usize>) -> RgbImage {
        RgbImage::from_fn(resolution, |Vec2(x, y)| Rgb::new((x * 13) as u8, (y * 7) as u8, ((x + y) * 3) as u8))
    }

    #[test]
    fn traversal_order(){
        let positions: Vec<Vec2<usize>> = block_positions(Vec2(5, 3), 2).collect();
        assert_eq!(positions, vec![
            Vec2(0, 0), Vec2(2, 0), Vec2(4, 0),
            Vec2(0, 2), Vec2(2, 2), Vec2(4, 2),
        ]);

        assert_eq!(block_positions(Vec2(0, 0), 8).count(), 0);
        assert_eq!(block_positions(Vec2(0, 4), 8).count(), 0);
    }

    #[test]
    fn block_count_matches_parameters(){
        for &resolution in &[Vec2(1, 1), Vec2(8, 8), Vec2(9, 8), Vec2(17, 3)] {
            let parameters = Parameters::default();
            let image = gradient(resolution);
            let blocks = encode_blocks(&image, parameters);
            assert_eq!(blocks.len(), parameters.block_count(resolution).area());

            let covered: usize = blocks.iter().map(QuantizedBlock::pixel_count).sum();
            assert_eq!(covered, resolution.area());
        }
    }

    #[test]
    fn flat_image_reconstructs_exactly(){
        let image = RgbImage::filled(Vec2(13, 7), Rgb::gray(77));
        let preview = preview(&image, Parameters::new(1, 1, 4).unwrap());

        // the chroma of gray survives even a single bit, as 128 is the top bit
        assert_eq!(preview, image);
    }

    #[test]
    fn write_block_places_rows(){
        let mut image = RgbImage::filled((4, 3), Rgb::gray(0));
        assert_eq!(image.resolution(), Vec2(4, 3));

        image.write_block(Vec2(2, 1), Vec2(2, 2), &[Rgb::gray(1), Rgb::gray(2), Rgb::gray(3), Rgb::gray(4)]);

        assert_eq!(image.get_pixel(Vec2(2, 1)), Rgb::gray(1));
        assert_eq!(image.get_pixel(Vec2(3, 1)), Rgb::gray(2));
        assert_eq!(image.get_pixel(Vec2(2, 2)), Rgb::gray(3));
        assert_eq!(image.get_pixel(Vec2(3, 2)), Rgb::gray(4));
        assert_eq!(image.get_pixel(Vec2(1, 1)), Rgb::gray(0));
    }

    #[test]
    fn byte_conversions(){
        let image = gradient(Vec2(3, 2));
        assert_eq!(RgbImage::from_rgb8_bytes(Vec2(3, 2), &image.to_rgb8_bytes()).unwrap(), image);
        assert_eq!(RgbImage::from_packed(Vec2(3, 2), &image.to_packed()).unwrap(), image);

        assert!(RgbImage::from_rgb8_bytes(Vec2(3, 2), &[0; 17]).is_err());
        assert!(RgbImage::from_packed(Vec2(3, 2), &[0; 5]).is_err());
    }

    #[test]
    fn stream_matches_preview(){
        let image = RgbImage::from_fn(Vec2(21, 10), |Vec2(x, y)| Rgb::gray((x * 11 + y * 5) as u8));

        for &compression in &[Compression::RLE, Compression::Uncompressed] {
            for &parameters in &[Parameters::default(), Parameters::new(8, 8, 2).unwrap(), Parameters::new(2, 3, 6).unwrap()] {
                let bytes = write_to_vec(&image, parameters, compression).unwrap();
                let decoded = read_from_slice(&bytes).unwrap();
                let preview = preview(&image, parameters);
                assert_eq!(decoded.resolution(), image.resolution());

                // saturated residuals lose at most one quantization step
                let tolerance = 1_i32 << (8 - parameters.y_delta_bits());

                for (decoded, preview) in decoded.pixels().iter().zip(preview.pixels()) {
                    assert!((i32::from(decoded.r) - i32::from(preview.r)).abs() <= tolerance);
                    assert_eq!(decoded.r, decoded.g);
                }
            }
        }
    }

    #[test]
    fn stats(){
        let image = RgbImage::filled(Vec2(16, 16), Rgb::gray(10));
        let mut bytes = Vec::new();
        let stats = write_to_buffered(&image, Parameters::default(), Compression::RLE, &mut bytes).unwrap();

        assert_eq!(stats.block_count, 4);
        assert_eq!(stats.original_byte_size, 16 * 16 * 3);
        assert_eq!(stats.estimated_byte_size, 4 * HEADER_BYTE_SIZE);
        assert_eq!(stats.written_byte_size, bytes.len());
        assert!(stats.written_ratio() < 10.0);
        assert!(stats.estimated_ratio() > 0.0);
    }

    #[test]
    fn trailing_bytes_are_rejected(){
        let image = RgbImage::filled(Vec2(4, 4), Rgb::gray(10));
        let packed = pack_blocks(&encode_blocks(&image, Parameters::default()));
        assert!(unpack_blocks(&packed, Vec2(4, 4), 8).is_ok());

        let mut longer = packed.clone();
        longer.push(0);
        assert!(unpack_blocks(&longer, Vec2(4, 4), 8).is_err());

        assert!(unpack_blocks(&packed, Vec2(40000, 40000), 8).is_err());
    }

    #[test]
    fn unpacking_requires_valid_block_size(){
        // a single clipped block of 3 by 3 pixels, which is also what a block size of 3 would produce
        let image = RgbImage::filled(Vec2(3, 3), Rgb::gray(10));
        let packed = pack_blocks(&encode_blocks(&image, Parameters::new(4, 4, 4).unwrap()));
        assert!(unpack_blocks(&packed, Vec2(3, 3), 4).is_ok());

        for &block_size in &[0, 1, 3, 5, 9] {
            assert!(matches!(unpack_blocks(&packed, Vec2(3, 3), block_size), Err(Error::Invalid(_))));
        }
    }
}
