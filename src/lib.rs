
//! Lossy compression of 24-bit RGB images.
//!
//! The image is split into small square blocks. Per block, the luma of each pixel
//! is stored relative to the darkest pixel of the block, using only a few bits,
//! while the chroma of the whole block is averaged into a single value.
//! The packed blocks may then be run length encoded.
//!
//! ```
//! use ycc_blocks::prelude::*;
//!
//! let image = RgbImage::from_fn(Vec2(32, 16), |Vec2(x, y)| Rgb::new(x as u8 * 8, y as u8 * 16, 128));
//!
//! let bytes = write_to_vec(&image, Parameters::default(), Compression::RLE).unwrap();
//! let decoded = read_from_slice(&bytes).unwrap();
//! assert_eq!(decoded.resolution(), image.resolution());
//! ```

#![forbid(unsafe_code)]


pub mod io;
pub mod math;
pub mod color;
pub mod compression;
pub mod meta;
pub mod block;
pub mod image;
pub mod error;

#[macro_use]
extern crate smallvec;


/// Export the most important items from `ycc_blocks`.
pub mod prelude {

    // main exports
    pub use crate::image::{
        write_to_buffered, write_to_vec,
        read_from_buffered, read_from_slice,
        encode_blocks, reconstruct, preview,
        GetPixel, RgbImage, CompressionStats,
    };

    // core data types
    pub use crate::block::QuantizedBlock;
    pub use crate::color::{Rgb, YCrCb};
    pub use crate::compression::Compression;
    pub use crate::meta::Parameters;
    pub use crate::math::Vec2;

    // secondary data types
    pub use crate::meta;
    pub use crate::error::{self, Error, Result};
}
