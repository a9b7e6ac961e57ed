use crate::{Boundable, BoundingBox, BuildError, PrimitiveId, INTERSECT_COST};

/// Node of a built hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub enum BvhNode {
    Internal {
        bounds: BoundingBox,
        left: Box<Self>,
        right: Box<Self>,
    },

    Leaf {
        bounds: BoundingBox,
        primitives: Vec<PrimitiveId>,
    },
}

impl BvhNode {
    pub fn internal(left: Self, right: Self) -> Self {
        Self::Internal {
            bounds: left.bounds() + right.bounds(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn leaf(bounds: BoundingBox, primitives: Vec<PrimitiveId>) -> Self {
        Self::Leaf { bounds, primitives }
    }

    pub fn bounds(&self) -> BoundingBox {
        match self {
            BvhNode::Internal { bounds, .. } => *bounds,
            BvhNode::Leaf { bounds, .. } => *bounds,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BvhNode::Leaf { .. })
    }

    /// Returns ids of all primitives reachable from this node, in depth-first
    /// order.
    pub fn primitives(&self) -> Vec<PrimitiveId> {
        let mut out = Vec::new();
        let mut stack = vec![self];

        while let Some(node) = stack.pop() {
            match node {
                BvhNode::Internal { left, right, .. } => {
                    stack.push(right);
                    stack.push(left);
                }

                BvhNode::Leaf { primitives, .. } => {
                    out.extend_from_slice(primitives);
                }
            }
        }

        out
    }

    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        let root_area = self.bounds().surface_area();

        self.collect_stats(&mut stats, 1, root_area);
        stats
    }

    fn collect_stats(
        &self,
        stats: &mut BvhStats,
        depth: usize,
        root_area: f32,
    ) {
        let area_ratio = if root_area > 0.0 {
            self.bounds().surface_area() / root_area
        } else {
            1.0
        };

        stats.nodes += 1;
        stats.depth = stats.depth.max(depth);

        match self {
            BvhNode::Internal { left, right, .. } => {
                stats.internal_nodes += 1;
                stats.sah_cost += area_ratio * INTERSECT_COST;

                left.collect_stats(stats, depth + 1, root_area);
                right.collect_stats(stats, depth + 1, root_area);
            }

            BvhNode::Leaf { primitives, .. } => {
                stats.leaves += 1;
                stats.primitives += primitives.len();
                stats.max_leaf_size = stats.max_leaf_size.max(primitives.len());
                stats.sah_cost += area_ratio * (primitives.len() as f32);
            }
        }
    }

    /// Checks that every internal node's box is the union of its children's
    /// boxes and that every leaf's box contains all of its primitives.
    pub fn validate<P>(&self, primitives: &[P]) -> Result<(), BuildError>
    where
        P: Boundable,
    {
        match self {
            BvhNode::Internal {
                bounds,
                left,
                right,
            } => {
                let expected = left.bounds() + right.bounds();

                if *bounds != expected {
                    return Err(BuildError::InvalidTree(format!(
                        "internal node has bounds {bounds:?}, but its \
                         children span {expected:?}"
                    )));
                }

                left.validate(primitives)?;
                right.validate(primitives)?;
            }

            BvhNode::Leaf {
                bounds,
                primitives: ids,
            } => {
                if ids.is_empty() {
                    return Err(BuildError::InvalidTree(
                        "found an empty leaf".into(),
                    ));
                }

                for id in ids {
                    let primitive =
                        primitives.get(id.index()).ok_or_else(|| {
                            BuildError::InvalidTree(format!(
                                "leaf refers to unknown primitive {}",
                                id.get()
                            ))
                        })?;

                    if !bounds.contains(&primitive.bounding_box()) {
                        return Err(BuildError::InvalidTree(format!(
                            "leaf {bounds:?} doesn't contain primitive {}",
                            id.get()
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Summary of a hierarchy's shape, mostly for logging.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BvhStats {
    pub nodes: usize,
    pub internal_nodes: usize,
    pub leaves: usize,
    pub primitives: usize,
    pub depth: usize,
    pub max_leaf_size: usize,

    /// Expected cost of tracing a random ray through the hierarchy, relative
    /// to testing a single primitive.
    pub sah_cost: f32,
}
