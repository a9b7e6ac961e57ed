use std::fmt;
use std::ops::{Index, IndexMut};

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub fn all() -> impl Iterator<Item = Self> {
        [Self::X, Self::Y, Self::Z].into_iter()
    }

    /// Returns the axis that follows this one in the `X -> Y -> Z -> X`
    /// cycle.
    pub fn next(self) -> Self {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::Z,
            Axis::Z => Axis::X,
        }
    }
}

impl From<usize> for Axis {
    fn from(value: usize) -> Self {
        match value {
            0 => Axis::X,
            1 => Axis::Y,
            2 => Axis::Z,
            _ => panic!("Invalid axis: {value}"),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::X => write!(f, "x"),
            Axis::Y => write!(f, "y"),
            Axis::Z => write!(f, "z"),
        }
    }
}

impl Index<Axis> for Vec3 {
    type Output = f32;

    fn index(&self, index: Axis) -> &Self::Output {
        match index {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }
}

impl IndexMut<Axis> for Vec3 {
    fn index_mut(&mut self, index: Axis) -> &mut Self::Output {
        match index {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }
}

/// Hands out split axes in a round-robin fashion; used when a group is too
/// large (or too deep) to afford an exact sweep.
#[derive(Clone, Copy, Debug)]
pub struct AxisCycle {
    next: Axis,
}

impl AxisCycle {
    pub fn new() -> Self {
        Self { next: Axis::X }
    }

    pub fn advance(&mut self) -> Axis {
        let axis = self.next;

        self.next = axis.next();
        axis
    }
}

impl Default for AxisCycle {
    fn default() -> Self {
        Self::new()
    }
}
