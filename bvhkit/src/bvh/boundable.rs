use glam::Vec3;

use crate::{Axis, BoundingBox};

/// Anything that can be placed inside the hierarchy.
pub trait Boundable {
    fn bounding_box(&self) -> BoundingBox;

    fn center(&self) -> Vec3 {
        self.bounding_box().center()
    }

    fn axis_center(&self, axis: Axis) -> f32 {
        self.center()[axis]
    }

    /// Cost of testing a ray against this primitive, relative to the other
    /// primitives in the scene.
    fn intersect_cost(&self) -> f32 {
        1.0
    }
}

impl<T> Boundable for &T
where
    T: Boundable + ?Sized,
{
    fn bounding_box(&self) -> BoundingBox {
        T::bounding_box(self)
    }

    fn center(&self) -> Vec3 {
        T::center(self)
    }

    fn axis_center(&self, axis: Axis) -> f32 {
        T::axis_center(self, axis)
    }

    fn intersect_cost(&self) -> f32 {
        T::intersect_cost(self)
    }
}

impl Boundable for BoundingBox {
    fn bounding_box(&self) -> BoundingBox {
        *self
    }
}

/// Position of a primitive within the slice given to a builder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PrimitiveId(u32);

impl PrimitiveId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }

    /// Returns ids of all primitives within given slice, in order.
    pub fn all<P>(primitives: &[P]) -> Vec<Self> {
        (0..primitives.len() as u32).map(Self::new).collect()
    }
}

/// Per-primitive data builders look up over and over again, gathered once so
/// that the sweeps don't have to go through the trait.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PrimitiveInfo {
    pub bounds: BoundingBox,
    pub center: Vec3,
    pub cost: f32,
}

impl PrimitiveInfo {
    pub fn gather<P>(primitives: &[P]) -> Vec<Self>
    where
        P: Boundable,
    {
        let infos: Vec<_> = primitives
            .iter()
            .map(|primitive| Self {
                bounds: primitive.bounding_box(),
                center: primitive.center(),
                cost: primitive.intersect_cost(),
            })
            .collect();

        let degenerate = infos
            .iter()
            .filter(|info| info.bounds.is_degenerate())
            .count();

        if degenerate > 0 {
            log::warn!(
                "Found {} degenerate (zero-volume) primitive(s) out of {}",
                degenerate,
                infos.len()
            );
        }

        infos
    }
}
