use std::ops;

use crate::{BoundingBox, MortonCode, PrimitiveId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AacNodeId(u32);

impl AacNodeId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AacNodeKind {
    Primitive {
        id: PrimitiveId,
        code: MortonCode,
    },

    Cluster {
        left_id: AacNodeId,
        right_id: AacNodeId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AacNode {
    pub kind: AacNodeKind,
    pub bounds: BoundingBox,
    pub area: f32,

    /// Number of primitives within this node's subtree.
    pub primitives: u32,

    /// Amortized cost of tracing a ray through this node, filled in while
    /// pruning.
    pub cost: f32,

    /// Whether pruning decided to turn this node into a leaf holding its
    /// whole subtree.
    pub collapsed: bool,

    /// Number of nodes within this node's subtree, counted after pruning.
    pub subtree_len: u32,
}

impl AacNode {
    pub fn is_leaf(&self) -> bool {
        self.collapsed || matches!(self.kind, AacNodeKind::Primitive { .. })
    }

    pub fn children(&self) -> Option<(AacNodeId, AacNodeId)> {
        match self.kind {
            AacNodeKind::Cluster { left_id, right_id } => {
                Some((left_id, right_id))
            }
            AacNodeKind::Primitive { .. } => None,
        }
    }
}

/// Arena of all nodes created while clustering.
///
/// Children are always created before their parents, so iterating the arena
/// in order visits the tree bottom-up.
#[derive(Clone, Debug, Default)]
pub struct AacNodes {
    nodes: Vec<AacNode>,
}

impl AacNodes {
    /// Creates an arena sized for a tree over given number of primitives,
    /// which has at most `2 * len - 1` nodes.
    pub fn with_primitives(len: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(2 * len),
        }
    }

    pub fn add_primitive(
        &mut self,
        id: PrimitiveId,
        code: MortonCode,
        bounds: BoundingBox,
    ) -> AacNodeId {
        self.push(AacNode {
            kind: AacNodeKind::Primitive { id, code },
            bounds,
            area: bounds.surface_area(),
            primitives: 1,
            cost: 0.0,
            collapsed: false,
            subtree_len: 1,
        })
    }

    pub fn add_cluster(
        &mut self,
        left_id: AacNodeId,
        right_id: AacNodeId,
    ) -> AacNodeId {
        let left = self[left_id];
        let right = self[right_id];
        let bounds = left.bounds + right.bounds;

        self.push(AacNode {
            kind: AacNodeKind::Cluster { left_id, right_id },
            bounds,
            area: bounds.surface_area(),
            primitives: left.primitives + right.primitives,
            cost: 0.0,
            collapsed: false,
            subtree_len: 1 + left.subtree_len + right.subtree_len,
        })
    }

    fn push(&mut self, node: AacNode) -> AacNodeId {
        self.nodes.push(node);

        AacNodeId::new((self.nodes.len() - 1) as u32)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = AacNodeId> {
        (0..self.nodes.len() as u32).map(AacNodeId::new)
    }

    /// Returns ids of all primitives within given subtree, left to right.
    pub fn primitives(&self, id: AacNodeId) -> Vec<PrimitiveId> {
        let mut out = Vec::with_capacity(self[id].primitives as usize);
        let mut stack = vec![id];

        while let Some(id) = stack.pop() {
            match self[id].kind {
                AacNodeKind::Primitive {
                    id: primitive_id, ..
                } => {
                    out.push(primitive_id);
                }

                AacNodeKind::Cluster { left_id, right_id } => {
                    stack.push(right_id);
                    stack.push(left_id);
                }
            }
        }

        out
    }
}

impl ops::Index<AacNodeId> for AacNodes {
    type Output = AacNode;

    fn index(&self, index: AacNodeId) -> &Self::Output {
        &self.nodes[index.get() as usize]
    }
}

impl ops::IndexMut<AacNodeId> for AacNodes {
    fn index_mut(&mut self, index: AacNodeId) -> &mut Self::Output {
        &mut self.nodes[index.get() as usize]
    }
}
