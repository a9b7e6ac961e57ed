use std::ops::{Add, AddAssign};

use glam::Vec3;

use crate::Axis;

/// Cost of testing a ray against the two child boxes of an internal node,
/// relative to the cost of a single primitive test.
pub const INTERSECT_COST: f32 = 1.0;

/// Axis-aligned bounding box.
///
/// The default value is the empty box (`min = MAX`, `max = MIN`), which acts
/// as the identity for unions.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().collect()
    }

    pub fn min(&self) -> Vec3 {
        self.min
    }

    pub fn max(&self) -> Vec3 {
        self.max
    }

    pub fn extent(&self) -> Vec3 {
        if self.is_set() {
            self.max() - self.min()
        } else {
            Vec3::ZERO
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    pub fn half_area(&self) -> f32 {
        let extent = self.extent();

        extent.x * extent.y + extent.y * extent.z + extent.z * extent.x
    }

    pub fn surface_area(&self) -> f32 {
        2.0 * self.half_area()
    }

    pub fn volume(&self) -> f32 {
        let extent = self.extent();

        extent.x * extent.y * extent.z
    }

    pub fn largest_axis(&self) -> Axis {
        let extent = self.extent();

        if extent.x >= extent.y && extent.x >= extent.z {
            Axis::X
        } else if extent.y >= extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    pub fn union(self, other: Self) -> Self {
        self + other
    }

    /// Unions three boxes at once; handy when combining two already-unioned
    /// halves with a third box.
    pub fn union3(self, b: Self, c: Self) -> Self {
        self + b + c
    }

    pub fn contains(&self, other: &Self) -> bool {
        if !other.is_set() {
            return true;
        }

        self.is_set()
            && self.min.cmple(other.min).all()
            && self.max.cmpge(other.max).all()
    }

    pub fn is_set(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Returns whether this box has no volume (a point, a segment or a flat
    /// rectangle).
    pub fn is_degenerate(&self) -> bool {
        self.volume() <= 0.0
    }

    /// Maps `p` from `self.min() ..= self.max()` to `0.0 ..= 1.0`.
    pub fn map(&self, mut p: Vec3) -> Vec3 {
        p = (p - self.min()) / self.extent();

        // Flat boxes produce NaNs (or infinities) on their collapsed axes;
        // every point shares the same coordinate there anyway.
        for axis in Axis::all() {
            if !p[axis].is_finite() {
                p[axis] = 0.0;
            }
        }

        p.clamp(Vec3::ZERO, Vec3::ONE)
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::MAX, Vec3::MIN)
    }
}

impl Add<Vec3> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Vec3) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Vec3> for BoundingBox {
    fn add_assign(&mut self, rhs: Vec3) {
        self.min = self.min.min(rhs);
        self.max = self.max.max(rhs);
    }
}

impl FromIterator<Vec3> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Vec3>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}

impl Add<Self> for BoundingBox {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign<Self> for BoundingBox {
    fn add_assign(&mut self, rhs: Self) {
        if rhs.is_set() {
            *self += rhs.min;
            *self += rhs.max;
        }
    }
}

impl FromIterator<Self> for BoundingBox {
    fn from_iter<T>(iter: T) -> Self
    where
        T: IntoIterator<Item = Self>,
    {
        let mut this = Self::default();

        for item in iter {
            this += item;
        }

        this
    }
}
