use derivative::Derivative;

use crate::{
    measure, AacBuilder, AacConfig, BinnedSahConfig, Boundable,
    BottomUpSahBuilder, BottomUpSahConfig, BuildError, BvhNode, BvhPrinter,
    ParallelBinnedSahBuilder,
};

pub trait BvhBuilder {
    /// Builds a hierarchy over given primitives; returns `None` when there's
    /// nothing to build it over.
    ///
    /// Leaves refer to primitives through their positions within the slice.
    fn build<P>(&self, primitives: &[P]) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable + Sync;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuilderKind {
    BottomUpSah,
    #[default]
    BinnedSah,
    Aac,
}

impl BuilderKind {
    pub fn all() -> [Self; 3] {
        [Self::BottomUpSah, Self::BinnedSah, Self::Aac]
    }

    pub fn name(self) -> &'static str {
        match self {
            BuilderKind::BottomUpSah => "bottom-up-sah",
            BuilderKind::BinnedSah => "binned-sah",
            BuilderKind::Aac => "aac",
        }
    }
}

/// Selects one of the builders, together with its settings.
#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BvhConfig {
    pub kind: BuilderKind,
    pub bottom_up_sah: BottomUpSahConfig,
    pub binned_sah: BinnedSahConfig,
    pub aac: AacConfig,

    /// Checks the bounding invariant of each built tree; enabled by default
    /// in debug builds.
    #[derivative(Default(value = "cfg!(debug_assertions)"))]
    pub validate: bool,
}

impl BvhConfig {
    pub fn new(kind: BuilderKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn build<P>(
        &self,
        primitives: &[P],
    ) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable + Sync,
    {
        log::info!(
            "Building BVH; builder = {}, primitives = {}",
            self.kind.name(),
            primitives.len()
        );

        let root = measure(self.kind.name(), || match self.kind {
            BuilderKind::BottomUpSah => {
                BottomUpSahBuilder::new(self.bottom_up_sah).build(primitives)
            }
            BuilderKind::BinnedSah => {
                ParallelBinnedSahBuilder::new(self.binned_sah).build(primitives)
            }
            BuilderKind::Aac => AacBuilder::new(self.aac).build(primitives),
        })?;

        let Some(root) = root else {
            log::info!("BVH built; tree is empty");
            return Ok(None);
        };

        if self.validate {
            root.validate(primitives)?;
        }

        let stats = root.stats();

        log::info!(
            "BVH built; nodes = {}, leaves = {}, depth = {}, sah-cost = {}",
            stats.nodes,
            stats.leaves,
            stats.depth,
            stats.sah_cost
        );

        log::debug!("BVH stats: {:?}", stats);

        if log::log_enabled!(log::Level::Trace) {
            log::trace!("BVH graph:\n{}", BvhPrinter::print(&root));
        }

        Ok(Some(root))
    }
}
