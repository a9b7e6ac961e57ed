use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Morton coordinates out of the 21-bit range: ({x}, {y}, {z})"
    )]
    MortonOutOfRange { x: u32, y: u32, z: u32 },

    #[error(
        "Cluster workspace overflow: partition of {len} clusters exceeds \
         capacity of {capacity}"
    )]
    WorkspaceOverflow { len: usize, capacity: usize },

    #[error(
        "Node {node} has surface area {area}, but its children span \
         {children_area}"
    )]
    PruneInvariant {
        node: u32,
        area: f32,
        children_area: f32,
    },

    #[error("Subtree build didn't produce a node")]
    MissingSubtree,

    #[error("Invalid tree: {0}")]
    InvalidTree(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}
