
//! Conversion between 24-bit RGB pixels and the luma/chroma representation.
//!
//! All coefficients are applied in fixed point with a scale of 1000,
//! so that every intermediate result is truncated towards zero exactly
//! as the decimal formulas would be, without floating point noise.

/// Fixed point scale of all conversion coefficients.
const SCALE: i32 = 1000;

/// The chroma value of a colorless pixel.
pub const CHROMA_OFFSET: u8 = 128;

mod forward {
    pub const Y_R: i32 = 299;
    pub const Y_G: i32 = 587;
    pub const Y_B: i32 = 114;

    pub const CR: i32 = 713;
    pub const CB: i32 = 564;
}

mod inverse {
    pub const R_CR: i32 = 1403;
    pub const G_CB: i32 = -344;
    pub const G_CR: i32 = -714;
    pub const B_CB: i32 = 1770;
}


/// A pixel with 8 bits of red, green and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {

    /// Red component.
    pub r: u8,

    /// Green component.
    pub g: u8,

    /// Blue component.
    pub b: u8,
}

impl Rgb {

    /// Create a pixel from its components.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Create a gray pixel where all three components are equal.
    pub const fn gray(value: u8) -> Self {
        Self::new(value, value, value)
    }

    /// Unpack a `0xRRGGBB` value. Any bits above the lower 24 bits are ignored.
    pub const fn from_packed(packed: u32) -> Self {
        Self::new((packed >> 16) as u8, (packed >> 8) as u8, packed as u8)
    }

    /// Pack into a `0xRRGGBB` value.
    pub const fn to_packed(self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// Convert this pixel to luma and chroma.
    #[inline]
    pub fn to_ycrcb(self) -> YCrCb {
        YCrCb::from(self)
    }
}

impl From<u32> for Rgb {
    fn from(packed: u32) -> Self { Rgb::from_packed(packed) }
}

impl From<Rgb> for u32 {
    fn from(rgb: Rgb) -> Self { rgb.to_packed() }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from((r, g, b): (u8, u8, u8)) -> Self { Rgb::new(r, g, b) }
}


/// Luma and the two chroma differences of a single pixel.
/// Chroma is offset by 128, such that gray pixels have a chroma of 128.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YCrCb {

    /// Perceived brightness.
    pub y: u8,

    /// Red difference, offset by 128.
    pub cr: u8,

    /// Blue difference, offset by 128.
    pub cb: u8,
}

impl YCrCb {

    /// Create from already converted components.
    pub const fn new(y: u8, cr: u8, cb: u8) -> Self {
        Self { y, cr, cb }
    }

    /// Convert back to RGB. This is not an exact inverse of the forward conversion.
    #[inline]
    pub fn to_rgb(self) -> Rgb {
        ycrcb_to_rgb(self.y, self.cr, self.cb)
    }
}

impl From<Rgb> for YCrCb {
    #[inline]
    fn from(rgb: Rgb) -> Self {
        rgb_to_ycrcb(rgb.r, rgb.g, rgb.b)
    }
}

impl From<YCrCb> for Rgb {
    #[inline]
    fn from(ycrcb: YCrCb) -> Self {
        ycrcb.to_rgb()
    }
}


/// Only the luma of a pixel. Equal to the `y` of `rgb_to_ycrcb`.
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (i32::from(r), i32::from(g), i32::from(b));
    clamp_to_u8((forward::Y_R * r + forward::Y_G * g + forward::Y_B * b) / SCALE)
}

/// Convert RGB to luma and offset chroma. Truncates all intermediate values towards zero.
#[inline]
pub fn rgb_to_ycrcb(r: u8, g: u8, b: u8) -> YCrCb {
    let y = i32::from(luma(r, g, b));
    let offset = i32::from(CHROMA_OFFSET) * SCALE;

    let cr = (forward::CR * (i32::from(r) - y) + offset) / SCALE;
    let cb = (forward::CB * (i32::from(b) - y) + offset) / SCALE;

    YCrCb::new(y as u8, clamp_to_u8(cr), clamp_to_u8(cb))
}

/// Convert luma and offset chroma back to RGB.
/// Each channel is truncated towards zero and then clamped to `0 ..= 255`.
#[inline]
pub fn ycrcb_to_rgb(y: u8, cr: u8, cb: u8) -> Rgb {
    let y = i32::from(y) * SCALE;
    let cr = i32::from(cr) - i32::from(CHROMA_OFFSET);
    let cb = i32::from(cb) - i32::from(CHROMA_OFFSET);

    let r = (y + inverse::R_CR * cr) / SCALE;
    let g = (y + inverse::G_CB * cb + inverse::G_CR * cr) / SCALE;
    let b = (y + inverse::B_CB * cb) / SCALE;

    Rgb::new(clamp_to_u8(r), clamp_to_u8(g), clamp_to_u8(b))
}

#[inline]
fn clamp_to_u8(value: i32) -> u8 {
    value.clamp(0, i32::from(u8::MAX)) as u8
}
