use std::thread;

use derivative::Derivative;

use crate::bvh::PrimitiveInfo;
use crate::{
    sah_split_cost, Axis, Boundable, BoundingBox, BuildError, BvhBuilder,
    BvhNode, PrimitiveId,
};

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BinnedSahConfig {
    /// Groups of at most this many primitives become leaves.
    #[derivative(Default(value = "4"))]
    pub leaf_size: usize,

    /// Depth past which groups become leaves no matter their size.
    #[derivative(Default(value = "1000"))]
    pub max_depth: usize,

    /// Nodes above this depth build their children on separate threads;
    /// `4` means up to 16 subtrees being built at once.
    #[derivative(Default(value = "4"))]
    pub parallel_depth: usize,

    #[derivative(Default(value = "8"))]
    pub min_bins: usize,

    #[derivative(Default(value = "64"))]
    pub max_bins: usize,
}

/// Builds BVH using binned SAH, forking the top levels of the recursion onto
/// scoped threads.
///
/// Thanks to:
/// https://jacco.ompf2.com/2022/04/21/how-to-build-a-bvh-part-3-quick-builds/.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParallelBinnedSahBuilder {
    config: BinnedSahConfig,
}

impl ParallelBinnedSahBuilder {
    pub fn new(config: BinnedSahConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BinnedSahConfig {
        &self.config
    }

    pub fn create<P>(
        &self,
        primitives: &[P],
    ) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable,
    {
        self.validate_config()?;

        if primitives.is_empty() {
            return Ok(None);
        }

        let infos = PrimitiveInfo::gather(primitives);
        let mut ids = PrimitiveId::all(primitives);

        self.build_bvh(&infos, &mut ids, 0).map(Some)
    }

    fn validate_config(&self) -> Result<(), BuildError> {
        let BinnedSahConfig {
            leaf_size,
            min_bins,
            max_bins,
            ..
        } = self.config;

        if leaf_size == 0 {
            return Err(BuildError::InvalidConfig(
                "leaf_size must be at least 1".into(),
            ));
        }

        if min_bins < 2 || min_bins > max_bins {
            return Err(BuildError::InvalidConfig(format!(
                "bins must satisfy 2 <= min_bins <= max_bins, got {}..={}",
                min_bins, max_bins
            )));
        }

        Ok(())
    }

    fn build_bvh(
        &self,
        infos: &[PrimitiveInfo],
        ids: &mut [PrimitiveId],
        depth: usize,
    ) -> Result<BvhNode, BuildError> {
        let bounds: BoundingBox =
            ids.iter().map(|id| infos[id.index()].bounds).collect();

        if depth > self.config.max_depth || ids.len() <= self.config.leaf_size
        {
            return Ok(BvhNode::leaf(bounds, ids.to_vec()));
        }

        let split_by = bounds.largest_axis();
        let pivot = self.partition(infos, ids, bounds, split_by);
        let (left_ids, right_ids) = ids.split_at_mut(pivot);

        let (left, right) = if depth < self.config.parallel_depth {
            debug_assert!(
                left_ids.as_ptr_range().end <= right_ids.as_ptr_range().start,
                "Forked ranges overlap"
            );

            thread::scope(|scope| {
                let left = scope
                    .spawn(move || self.build_bvh(infos, left_ids, depth + 1));

                let right = self.build_bvh(infos, right_ids, depth + 1);

                let left =
                    left.join().map_err(|_| BuildError::MissingSubtree)?;

                Ok::<_, BuildError>((left?, right?))
            })?
        } else {
            (
                self.build_bvh(infos, left_ids, depth + 1)?,
                self.build_bvh(infos, right_ids, depth + 1)?,
            )
        };

        Ok(BvhNode::internal(left, right))
    }

    /// Reorders `ids` so that primitives going into the left child come
    /// first; returns the index of the first primitive going to the right.
    fn partition(
        &self,
        infos: &[PrimitiveInfo],
        ids: &mut [PrimitiveId],
        bounds: BoundingBox,
        split_by: Axis,
    ) -> usize {
        let len = ids.len();

        let plane = self.find_splitting_plane(infos, ids, bounds, split_by);

        let Some(plane) = plane else {
            return split_at_median(infos, ids, split_by);
        };

        let goes_left = |id: PrimitiveId| {
            plane.bin_of(&infos[id.index()]) <= plane.boundary
        };

        let mut i = 0;
        let mut j = len;

        loop {
            while i < j && goes_left(ids[i]) {
                i += 1;
            }

            while i < j && !goes_left(ids[j - 1]) {
                j -= 1;
            }

            if i >= j {
                break;
            }

            ids.swap(i, j - 1);
            i += 1;
            j -= 1;
        }

        i.clamp(1, len - 1)
    }

    fn find_splitting_plane(
        &self,
        infos: &[PrimitiveInfo],
        ids: &[PrimitiveId],
        bounds: BoundingBox,
        split_by: Axis,
    ) -> Option<SplittingPlane> {
        let extent = bounds.extent()[split_by];

        if extent <= 0.0 {
            return None;
        }

        let len = ids.len();

        let bins_len = ((2.0 * (len as f32).log2()) as usize)
            .clamp(self.config.min_bins, self.config.max_bins);

        let mut plane = SplittingPlane {
            split_by,
            min: bounds.min()[split_by],
            scale: (bins_len as f32) / extent,
            bins_len,
            boundary: 0,
        };

        let mut bins = vec![Bin::default(); bins_len];
        let mut total_cost = 0.0;

        for id in ids {
            let info = &infos[id.index()];
            let bin = &mut bins[plane.bin_of(info)];

            bin.bb += info.bounds;
            bin.count += 1;
            total_cost += info.cost;
        }

        // ---

        let mut left_areas = vec![0.0; bins_len - 1];
        let mut right_areas = vec![0.0; bins_len - 1];
        let mut left_counts = vec![0; bins_len - 1];
        let mut right_counts = vec![0; bins_len - 1];
        let mut left_bb = BoundingBox::default();
        let mut right_bb = BoundingBox::default();
        let mut left_count = 0;
        let mut right_count = 0;

        for i in 0..(bins_len - 1) {
            left_count += bins[i].count;
            left_counts[i] = left_count;

            left_bb += bins[i].bb;
            left_areas[i] = left_bb.surface_area();

            right_count += bins[bins_len - 1 - i].count;
            right_counts[bins_len - 2 - i] = right_count;

            right_bb += bins[bins_len - 1 - i].bb;
            right_areas[bins_len - 2 - i] = right_bb.surface_area();
        }

        // ---

        let total_area = bounds.surface_area();
        let avg_cost = total_cost / (len as f32);
        let mut best: Option<(usize, f64)> = None;

        for i in 0..(bins_len - 1) {
            if left_counts[i] == 0 || right_counts[i] == 0 {
                continue;
            }

            let split_cost = sah_split_cost(
                total_area,
                left_areas[i],
                left_counts[i],
                right_areas[i],
                right_counts[i],
                avg_cost,
            );

            let is_current_bin_better =
                best.map_or(true, |(_, best_cost)| split_cost < best_cost);

            if is_current_bin_better {
                best = Some((i, split_cost));
            }
        }

        plane.boundary = best?.0;

        Some(plane)
    }
}

impl BvhBuilder for ParallelBinnedSahBuilder {
    fn build<P>(&self, primitives: &[P]) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable + Sync,
    {
        self.create(primitives)
    }
}

/// Splitting plane expressed as a boundary between two bins; primitives from
/// bins `..= boundary` go left.
#[derive(Clone, Copy, Debug)]
struct SplittingPlane {
    split_by: Axis,
    min: f32,
    scale: f32,
    bins_len: usize,
    boundary: usize,
}

impl SplittingPlane {
    fn bin_of(&self, info: &PrimitiveInfo) -> usize {
        let bin = (info.center[self.split_by] - self.min) * self.scale;

        (bin as usize).min(self.bins_len - 1)
    }
}

#[derive(Clone, Copy, Default, Debug)]
struct Bin {
    bb: BoundingBox,
    count: usize,
}

fn split_at_median(
    infos: &[PrimitiveInfo],
    ids: &mut [PrimitiveId],
    split_by: Axis,
) -> usize {
    let pivot = ids.len() / 2;

    ids.select_nth_unstable_by(pivot, |a, b| {
        let a_center = infos[a.index()].center[split_by];
        let b_center = infos[b.index()].center[split_by];

        a_center.total_cmp(&b_center).then(a.cmp(b))
    });

    pivot
}
