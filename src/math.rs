
//! Simple math utilities.

use crate::error::{Result, u32_to_usize, usize_to_u32};

/// Simple two-dimensional vector of any numerical type.
/// Supports only few mathematical operations
/// as this is used mainly as data struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Vec2<T> (pub T, pub T);

impl<T> Vec2<T> {

    /// Returns the vector with the minimum of either coordinates.
    pub fn min(self, other: Self) -> Self where T: Ord {
        Vec2(self.0.min(other.0), self.1.min(other.1))
    }

    /// Maps all components of this vector to a new type, yielding a vector of that new type.
    pub fn map<B>(self, map: impl Fn(T) -> B) -> Vec2<B> {
        Vec2(map(self.0), map(self.1))
    }

    /// Seeing this vector as a dimension or size (width and height),
    /// this returns the area that this dimensions contains (`width * height`).
    #[inline] pub fn area(self) -> T where T: std::ops::Mul<T, Output = T> {
        self.0 * self.1
    }

    /// The first component of this 2D vector.
    #[inline] pub fn x(self) -> T { self.0 }

    /// The second component of this 2D vector.
    #[inline] pub fn y(self) -> T { self.1 }

    /// The first component of this 2D vector.
    #[inline] pub fn width(self) -> T { self.0 }

    /// The second component of this 2D vector.
    #[inline] pub fn height(self) -> T { self.1 }
}


impl Vec2<usize> {

    /// Try to convert to `Vec2<u32>`, returning an error on too large numbers.
    pub fn to_u32(self, error_message: &'static str) -> Result<Vec2<u32>> {
        let x = usize_to_u32(self.0, error_message)?;
        let y = usize_to_u32(self.1, error_message)?;
        Ok(Vec2(x, y))
    }

    /// Seeing `self` as a two-dimensional index inside a rectangle of the specified size,
    /// this computes the index into a row-major flat array.
    #[inline]
    pub fn flat_index_for_size(self, resolution: Vec2<usize>) -> usize {
        debug_assert!(
            self.x() < resolution.width() && self.y() < resolution.height(),
            "Vec2 index {:?} is invalid for resolution {:?}", self, resolution
        );

        let Vec2(x, y) = self;
        y * resolution.width() + x
    }
}

impl Vec2<u32> {

    /// Try to convert to `Vec2<usize>`, returning an error if the platform cannot address it.
    pub fn to_usize(self, error_message: &'static str) -> Result<Vec2<usize>> {
        let x = u32_to_usize(self.0, error_message)?;
        let y = u32_to_usize(self.1, error_message)?;
        Ok(Vec2(x, y))
    }
}


impl<T: std::ops::Add<T>> std::ops::Add<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn add(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 + other.0, self.1 + other.1)
    }
}

impl<T: std::ops::Sub<T>> std::ops::Sub<Vec2<T>> for Vec2<T> {
    type Output = Vec2<T::Output>;
    fn sub(self, other: Vec2<T>) -> Self::Output {
        Vec2(self.0 - other.0, self.1 - other.1)
    }
}

impl<T> From<(T, T)> for Vec2<T> {
    fn from((x, y): (T, T)) -> Self { Vec2(x, y) }
}


/// Computes `ceil(log(x)/log(2))`, which is
/// the smallest `b` with `2^b >= x`. Returns 0 where argument is 0.
pub(crate) fn ceil_log_2(mut number: u32) -> u32 {
    let mut log = 0;
    let mut round_up = 0;

    while number > 1 {
        if number & 1 != 0 {
            round_up = 1;
        }

        log +=  1;
        number >>= 1;
    }

    log + round_up
}


/// Round up or down in specific calculations.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RoundingMode {

    /// Round down.
    Down,

    /// Round up.
    Up,
}

impl RoundingMode {
    pub(crate) fn divide(self, dividend: usize, divisor: usize) -> usize {
        match self {
            RoundingMode::Up => (dividend + divisor - 1) / divisor, // only works for positive numbers
            RoundingMode::Down => dividend / divisor,
        }
    }
}
