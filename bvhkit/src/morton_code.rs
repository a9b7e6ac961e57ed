use std::fmt;
use std::ops::BitXor;

use glam::Vec3;

use crate::BuildError;

/// 63-bit key made by interleaving three 21-bit coordinates; sorting by it
/// walks the points along a Z-order curve.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MortonCode(u64);

impl MortonCode {
    /// Number of bits available per coordinate.
    pub const BITS_PER_AXIS: u32 = 21;

    /// Largest (exclusive) coordinate accepted by [`Self::encode3`].
    pub const LIMIT: u32 = 1 << Self::BITS_PER_AXIS;

    pub fn new(code: u64) -> Self {
        Self(code)
    }

    /// Interleaves given coordinates, `x` landing on the lowest bit.
    ///
    /// Each coordinate must be smaller than [`Self::LIMIT`].
    pub fn encode3(x: u32, y: u32, z: u32) -> Self {
        debug_assert!(
            x < Self::LIMIT && y < Self::LIMIT && z < Self::LIMIT,
            "Coordinates out of range: ({x}, {y}, {z})"
        );

        let x = expand_bits(x as u64);
        let y = expand_bits(y as u64) << 1;
        let z = expand_bits(z as u64) << 2;

        Self(x | y | z)
    }

    pub fn try_encode3(x: u32, y: u32, z: u32) -> Result<Self, BuildError> {
        if x >= Self::LIMIT || y >= Self::LIMIT || z >= Self::LIMIT {
            return Err(BuildError::MortonOutOfRange { x, y, z });
        }

        Ok(Self::encode3(x, y, z))
    }

    pub fn decode3(self) -> (u32, u32, u32) {
        let x = compact_bits(self.0);
        let y = compact_bits(self.0 >> 1);
        let z = compact_bits(self.0 >> 2);

        (x as u32, y as u32, z as u32)
    }

    /// Quantizes a point from `0.0 ..= 1.0` into a grid of `2^bits` cells per
    /// axis and encodes it.
    pub fn from_normalized(point: Vec3, bits: u32) -> Self {
        debug_assert!(bits > 0 && bits <= Self::BITS_PER_AXIS);

        let cells = (1u32 << bits) as f32;
        let max = (1u32 << bits) - 1;
        let quantize = |v: f32| ((v * cells) as u32).min(max);

        Self::encode3(quantize(point.x), quantize(point.y), quantize(point.z))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn bit(self, n: u32) -> bool {
        (self.0 >> n) & 1 == 1
    }

    pub fn leading_zeros(self) -> u32 {
        self.0.leading_zeros()
    }
}

impl BitXor for MortonCode {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self::Output {
        Self(self.0 ^ rhs.0)
    }
}

impl fmt::Debug for MortonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MortonCode({:#018x})", self.0)
    }
}

/// Expands a 21-bit number into a 63-bit one by inserting two zeros after
/// every bit.
fn expand_bits(mut x: u64) -> u64 {
    x &= 0x1fffff;
    x = (x | x << 32) & 0x1f00000000ffff;
    x = (x | x << 16) & 0x1f0000ff0000ff;
    x = (x | x << 8) & 0x100f00f00f00f00f;
    x = (x | x << 4) & 0x10c30c30c30c30c3;
    x = (x | x << 2) & 0x1249249249249249;
    x
}

/// Inverse of [`expand_bits()`].
fn compact_bits(mut x: u64) -> u64 {
    x &= 0x1249249249249249;
    x = (x | x >> 2) & 0x10c30c30c30c30c3;
    x = (x | x >> 4) & 0x100f00f00f00f00f;
    x = (x | x >> 8) & 0x1f0000ff0000ff;
    x = (x | x >> 16) & 0x1f00000000ffff;
    x = (x | x >> 32) & 0x1fffff;
    x
}
