use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::{BuildError, BvhNode};

/// Renders a hierarchy as a Graphviz graph; useful for eyeballing small trees
/// with `dot -Tsvg`.
///
/// Each node is labelled with its depth and with the ratio of its surface
/// area to its parent's, i.e. the probability of a ray that hits the parent
/// hitting this node as well; leaves additionally list their primitives.
pub struct BvhPrinter;

impl BvhPrinter {
    /// Leaves list at most this many primitives, followed by the number of
    /// the remaining ones.
    const MAX_LISTED_PRIMITIVES: usize = 8;

    pub fn print(root: &BvhNode) -> String {
        let mut out = String::from("digraph {\n");
        let mut stack = vec![(root, None, 0)];
        let mut next_id = 0;

        while let Some((node, parent, depth)) = stack.pop() {
            let id = next_id;
            let area = node.bounds().surface_area();

            next_id += 1;

            let ratio = match parent {
                Some((_, parent_area)) if parent_area > 0.0 => {
                    area / parent_area
                }
                _ => 1.0,
            };

            match node {
                BvhNode::Internal { left, right, .. } => {
                    _ = writeln!(
                        out,
                        "  n{id} [label=\"depth {depth}\\nratio {ratio:.2}\"]"
                    );

                    stack.push((&**right, Some((id, area)), depth + 1));
                    stack.push((&**left, Some((id, area)), depth + 1));
                }

                BvhNode::Leaf { primitives, .. } => {
                    _ = writeln!(
                        out,
                        "  n{id} [label=\"{}\\nratio {ratio:.2}\", shape=box]",
                        Self::leaf_label(primitives.iter().map(|id| id.get()))
                    );
                }
            }

            if let Some((parent_id, _)) = parent {
                _ = writeln!(out, "  n{parent_id} -> n{id}");
            }
        }

        out.push_str("}\n");
        out
    }

    /// Writes [`Self::print()`] into given file.
    pub fn save(
        root: &BvhNode,
        path: impl AsRef<Path>,
    ) -> Result<(), BuildError> {
        let path = path.as_ref();

        log::debug!("Saving BVH graph; path = {}", path.display());

        fs::write(path, Self::print(root))?;

        Ok(())
    }

    fn leaf_label(primitives: impl ExactSizeIterator<Item = u32>) -> String {
        let len = primitives.len();

        let mut label: Vec<_> = primitives
            .take(Self::MAX_LISTED_PRIMITIVES)
            .map(|id| id.to_string())
            .collect();

        if len > Self::MAX_LISTED_PRIMITIVES {
            label.push(format!("+{}", len - Self::MAX_LISTED_PRIMITIVES));
        }

        format!("{len} prim(s): {}", label.join(", "))
    }
}
