use std::cmp::Ordering;

use derivative::Derivative;

use crate::bvh::PrimitiveInfo;
use crate::{
    sah_leaf_cost, sah_split_cost, Axis, AxisCycle, Boundable, BoundingBox,
    BuildError, BvhBuilder, BvhNode, PrimitiveId,
};

/// Costs closer than this are considered equal; such ties are settled by
/// picking the axis along which the gaps between sorted centers vary the
/// most.
const TIE_EPSILON: f64 = 1e-9;

/// Number of centers looked at when splitting a large group by sampling.
const SAMPLES: usize = 32;

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BottomUpSahConfig {
    /// Depth from which groups are split at their midpoint instead of going
    /// through the exact sweep.
    #[derivative(Default(value = "usize::MAX"))]
    pub max_depth: usize,

    /// Largest group that still goes through the exact sweep.
    #[derivative(Default(value = "50"))]
    pub exact_limit: usize,

    /// Groups larger than this get split by sampling their centers, even
    /// after the exact sweep has decided a split is worth it.
    #[derivative(Default(value = "100"))]
    pub sampled_limit: usize,
}

/// Builds BVH by recursively splitting primitives top-down, evaluating every
/// possible split for small groups and falling back to cheap midpoint splits
/// for large ones.
///
/// Special thanks to:
/// - https://jacco.ompf2.com/2022/04/13/how-to-build-a-bvh-part-1-basics/.
#[derive(Clone, Copy, Debug, Default)]
pub struct BottomUpSahBuilder {
    config: BottomUpSahConfig,
}

impl BottomUpSahBuilder {
    pub fn new(config: BottomUpSahConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BottomUpSahConfig {
        &self.config
    }

    pub fn create<P>(&self, primitives: &[P]) -> Option<BvhNode>
    where
        P: Boundable,
    {
        let infos = PrimitiveInfo::gather(primitives);
        let mut ids = PrimitiveId::all(primitives);
        let mut axes = AxisCycle::new();

        self.create_ex(&infos, &mut ids, 0, &mut axes)
    }

    fn create_ex(
        &self,
        infos: &[PrimitiveInfo],
        ids: &mut [PrimitiveId],
        depth: usize,
        axes: &mut AxisCycle,
    ) -> Option<BvhNode> {
        match ids.len() {
            0 => return None,
            1 => return Some(leaf(infos, ids)),
            _ => (),
        }

        let pivot = if depth >= self.config.max_depth
            || ids.len() > self.config.exact_limit
        {
            Some(split_at_midpoint(infos, ids, axes.advance()))
        } else {
            self.split_exact(infos, ids)
        };

        let Some(pivot) = pivot else {
            return Some(leaf(infos, ids));
        };

        let (left, right) = ids.split_at_mut(pivot);
        let left = self.create_ex(infos, left, depth + 1, axes)?;
        let right = self.create_ex(infos, right, depth + 1, axes)?;

        Some(BvhNode::internal(left, right))
    }

    /// Sweeps all `n - 1` splits along each axis and, if the best one beats
    /// keeping the group as a leaf, reorders `ids` so that the split happens
    /// at the returned index.
    fn split_exact(
        &self,
        infos: &[PrimitiveInfo],
        ids: &mut [PrimitiveId],
    ) -> Option<usize> {
        let len = ids.len();

        let total_area = ids
            .iter()
            .map(|id| infos[id.index()].bounds)
            .collect::<BoundingBox>()
            .surface_area();

        let avg_cost = ids
            .iter()
            .map(|id| infos[id.index()].cost)
            .sum::<f32>()
            / (len as f32);

        let mut best: Option<ExactSplit> = None;
        let mut sorted = ids.to_vec();
        let mut right_areas = vec![0.0; len];

        for axis in Axis::all() {
            sort_by_axis(infos, &mut sorted, axis);

            let variance = gap_variance(infos, &sorted, axis);
            let mut right_bb = BoundingBox::default();

            for i in (1..len).rev() {
                right_bb += infos[sorted[i].index()].bounds;
                right_areas[i] = right_bb.surface_area();
            }

            let mut left_bb = BoundingBox::default();

            for i in 1..len {
                left_bb += infos[sorted[i - 1].index()].bounds;

                let cost = sah_split_cost(
                    total_area,
                    left_bb.surface_area(),
                    i,
                    right_areas[i],
                    len - i,
                    avg_cost,
                );

                let split = ExactSplit {
                    axis,
                    pivot: i,
                    cost,
                    variance,
                };

                if split.beats(best) {
                    best = Some(split);
                }
            }
        }

        let best = best?;

        if best.cost >= sah_leaf_cost(len, avg_cost) {
            return None;
        }

        if len > self.config.sampled_limit {
            return Some(split_by_sampling(infos, ids));
        }

        sort_by_axis(infos, ids, best.axis);

        Some(best.pivot)
    }
}

impl BvhBuilder for BottomUpSahBuilder {
    fn build<P>(&self, primitives: &[P]) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable + Sync,
    {
        Ok(self.create(primitives))
    }
}

#[derive(Clone, Copy, Debug)]
struct ExactSplit {
    axis: Axis,
    pivot: usize,
    cost: f64,
    variance: f32,
}

impl ExactSplit {
    fn beats(&self, best: Option<Self>) -> bool {
        let Some(best) = best else {
            return true;
        };

        if (self.cost - best.cost).abs() <= TIE_EPSILON {
            self.variance > best.variance
        } else {
            self.cost < best.cost
        }
    }
}

fn leaf(infos: &[PrimitiveInfo], ids: &[PrimitiveId]) -> BvhNode {
    let bounds = ids.iter().map(|id| infos[id.index()].bounds).collect();

    BvhNode::leaf(bounds, ids.to_vec())
}

fn compare_by_axis(
    infos: &[PrimitiveInfo],
    axis: Axis,
    a: &PrimitiveId,
    b: &PrimitiveId,
) -> Ordering {
    let a_center = infos[a.index()].center[axis];
    let b_center = infos[b.index()].center[axis];

    a_center.total_cmp(&b_center).then(a.cmp(b))
}

fn sort_by_axis(infos: &[PrimitiveInfo], ids: &mut [PrimitiveId], axis: Axis) {
    ids.sort_unstable_by(|a, b| compare_by_axis(infos, axis, a, b));
}

/// Variance of the distances between consecutive centers of `ids`, which
/// must be already sorted along `axis`.
fn gap_variance(
    infos: &[PrimitiveInfo],
    ids: &[PrimitiveId],
    axis: Axis,
) -> f32 {
    let gaps: Vec<f32> = ids
        .windows(2)
        .map(|pair| {
            infos[pair[1].index()].center[axis]
                - infos[pair[0].index()].center[axis]
        })
        .collect();

    if gaps.is_empty() {
        return 0.0;
    }

    let len = gaps.len() as f32;
    let mean = gaps.iter().sum::<f32>() / len;

    gaps.iter()
        .map(|gap| {
            let delta = gap - mean;

            delta * delta
        })
        .sum::<f32>()
        / len
}

/// Moves the median primitive (along given axis) into the middle of `ids`,
/// with smaller ones before it and larger ones after it.
fn split_at_midpoint(
    infos: &[PrimitiveInfo],
    ids: &mut [PrimitiveId],
    axis: Axis,
) -> usize {
    let pivot = ids.len() / 2;

    ids.select_nth_unstable_by(pivot, |a, b| {
        compare_by_axis(infos, axis, a, b)
    });

    pivot
}

/// Splits along the longest axis of a handful of sampled centers, at their
/// mean; avoids sorting the whole group.
fn split_by_sampling(
    infos: &[PrimitiveInfo],
    ids: &mut [PrimitiveId],
) -> usize {
    let stride = (ids.len() / SAMPLES).max(1);

    let samples: Vec<_> = ids
        .iter()
        .step_by(stride)
        .map(|id| infos[id.index()].center)
        .collect();

    let split_by = BoundingBox::from_points(samples.iter().copied())
        .largest_axis();

    let split_at = samples.iter().map(|center| center[split_by]).sum::<f32>()
        / (samples.len() as f32);

    let mut i = 0;
    let mut j = ids.len();

    while i < j {
        if infos[ids[i].index()].center[split_by] < split_at {
            i += 1;
        } else {
            j -= 1;
            ids.swap(i, j);
        }
    }

    if i == 0 || i == ids.len() {
        split_at_midpoint(infos, ids, split_by)
    } else {
        i
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn empty() {
        let primitives: Vec<BoundingBox> = Vec::new();

        assert_eq!(None, BottomUpSahBuilder::default().create(&primitives));
    }

    #[test]
    fn single() {
        let primitives = vec![unit_cube(glam::Vec3::ONE)];
        let root = BottomUpSahBuilder::default().create(&primitives);

        assert_eq!(
            Some(BvhNode::leaf(primitives[0], vec![PrimitiveId::new(0)])),
            root
        );
    }

    #[test]
    fn cubes_in_line_are_split_along_x() {
        let primitives = cubes_in_line();

        let root = BottomUpSahBuilder::default()
            .create(&primitives)
            .unwrap();

        assert_well_formed(&root, &primitives);

        let BvhNode::Internal { left, right, .. } = &root else {
            panic!("expected an internal node, got: {root:?}");
        };

        let (
            BvhNode::Leaf {
                primitives: left_ids,
                ..
            },
            BvhNode::Leaf {
                primitives: right_ids,
                ..
            },
        ) = (&**left, &**right)
        else {
            panic!("expected two leaves, got: {root:?}");
        };

        assert!(!left_ids.is_empty());
        assert!(!right_ids.is_empty());
        assert_eq!(5, left_ids.len() + right_ids.len());
        assert!((2..=3).contains(&left_ids.len()));

        // Split along X means the halves don't overlap on that axis
        assert!(left.bounds().max().x < right.bounds().min().x);
    }

    #[test]
    fn identical_primitives_stay_in_one_leaf() {
        let primitives = vec![unit_cube(glam::Vec3::ZERO); 10];

        let root = BottomUpSahBuilder::default()
            .create(&primitives)
            .unwrap();

        assert_well_formed(&root, &primitives);
        assert_eq!(1, root.stats().leaves);
    }

    #[test]
    fn identical_primitives_in_large_group() {
        let primitives = vec![unit_cube(glam::Vec3::ZERO); 500];

        let root = BottomUpSahBuilder::default()
            .create(&primitives)
            .unwrap();

        assert_well_formed(&root, &primitives);
    }

    #[test]
    fn random_scene() {
        let primitives = random_cubes(1000, 100.0, 0);

        let root = BottomUpSahBuilder::default()
            .create(&primitives)
            .unwrap();

        assert_well_formed(&root, &primitives);
        assert!(root.stats().depth < 64);
    }

    #[test]
    fn sampled_splits() {
        let primitives = random_cubes(300, 100.0, 1);

        let target = BottomUpSahBuilder::new(BottomUpSahConfig {
            exact_limit: 400,
            sampled_limit: 100,
            ..Default::default()
        });

        let root = target.create(&primitives).unwrap();

        assert_well_formed(&root, &primitives);
    }

    #[test]
    fn max_depth_forces_midpoint_splits() {
        let primitives = random_cubes(64, 100.0, 2);

        let target = BottomUpSahBuilder::new(BottomUpSahConfig {
            max_depth: 0,
            ..Default::default()
        });

        let root = target.create(&primitives).unwrap();
        let stats = root.stats();

        assert_well_formed(&root, &primitives);
        assert_eq!(64, stats.leaves);
        assert_eq!(1, stats.max_leaf_size);
        assert_eq!(7, stats.depth);
    }

    #[test]
    fn near_ties_prefer_uneven_gaps() {
        let split = |cost: f64, variance: f32| ExactSplit {
            axis: Axis::X,
            pivot: 1,
            cost,
            variance,
        };

        let best = Some(split(12.0, 1.0));

        // Within the epsilon, the wider gap spread wins...
        assert!(split(12.0 + 1e-10, 2.0).beats(best));
        assert!(!split(12.0 - 1e-10, 0.5).beats(best));

        // ... past it, the cost alone decides
        assert!(split(12.0 - 1e-6, 0.5).beats(best));
        assert!(!split(12.0 + 1e-6, 2.0).beats(best));
        assert!(split(100.0, 0.0).beats(None));
    }

    #[test]
    fn gap_variance_of_sorted_centers() {
        let infos = PrimitiveInfo::gather(&[
            unit_cube(glam::vec3(0.0, 0.0, 0.0)),
            unit_cube(glam::vec3(1.0, 0.0, 0.0)),
            unit_cube(glam::vec3(4.0, 0.0, 0.0)),
        ]);

        let ids = PrimitiveId::all(&infos);

        // Gaps are 1 and 3, i.e. mean 2 and variance 1
        assert_eq!(1.0, gap_variance(&infos, &ids, Axis::X));
        assert_eq!(0.0, gap_variance(&infos, &ids, Axis::Y));
        assert_eq!(0.0, gap_variance(&infos, &ids[..1], Axis::X));
    }

    #[test]
    fn deterministic() {
        let primitives = random_cubes(500, 100.0, 3);
        let target = BottomUpSahBuilder::default();

        assert_eq!(target.create(&primitives), target.create(&primitives));
    }
}
