//! Bounding volume hierarchy construction.
//!
//! Three strategies are provided, all sharing the [`BvhBuilder`] contract of
//! turning a slice of [`Boundable`] primitives into a [`BvhNode`] tree:
//!
//! - [`BottomUpSahBuilder`] - exact SAH sweeps for small groups, cheap
//!   midpoint splits for large ones,
//! - [`ParallelBinnedSahBuilder`] - binned SAH with a bounded fork-join
//!   over scoped threads,
//! - [`AacBuilder`] - approximate agglomerative clustering over Morton-sorted
//!   primitives, followed by cost-based pruning.

mod bvh;
mod mesh;
mod morton_code;
#[cfg(test)]
mod testing;
mod utils;

pub use self::bvh::*;
pub use self::mesh::*;
pub use self::morton_code::*;
pub use self::utils::*;
