//! Scene generators and tree checks shared by the builders' tests.

use glam::{vec3, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{BoundingBox, BvhNode, PrimitiveId};

pub fn unit_cube(center: Vec3) -> BoundingBox {
    BoundingBox::new(center - 0.5, center + 0.5)
}

/// Unit cubes centered at random points within `0.0 ..= extent` on each axis.
pub fn random_cubes(len: usize, extent: f32, seed: u64) -> Vec<BoundingBox> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..len)
        .map(|_| {
            unit_cube(vec3(
                rng.gen_range(0.0..=extent),
                rng.gen_range(0.0..=extent),
                rng.gen_range(0.0..=extent),
            ))
        })
        .collect()
}

/// Five unit cubes lined up along the X axis, ten units apart.
pub fn cubes_in_line() -> Vec<BoundingBox> {
    (0..5)
        .map(|i| unit_cube(vec3(10.0 * (i as f32), 0.0, 0.0)))
        .collect()
}

/// Asserts that every primitive appears in the tree exactly once.
pub fn assert_covers(root: &BvhNode, len: usize) {
    let mut ids = root.primitives();

    ids.sort();

    let expected: Vec<_> = (0..len as u32).map(PrimitiveId::new).collect();

    assert_eq!(
        expected, ids,
        "tree doesn't cover all primitives exactly once"
    );
}

/// Asserts that no child's box is larger than its parent's.
pub fn assert_monotonic(node: &BvhNode) {
    if let BvhNode::Internal {
        bounds,
        left,
        right,
    } = node
    {
        for child in [left, right] {
            assert!(bounds.contains(&child.bounds()));
            assert!(child.bounds().surface_area() <= bounds.surface_area());

            assert_monotonic(child);
        }
    }
}

/// Runs all of the checks above, plus [`BvhNode::validate()`].
pub fn assert_well_formed(root: &BvhNode, primitives: &[BoundingBox]) {
    assert_covers(root, primitives.len());
    assert_monotonic(root);

    if let Err(err) = root.validate(primitives) {
        panic!("tree is malformed: {err}");
    }
}
