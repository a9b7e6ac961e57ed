use std::io::{self, Write};

use super::{AacNodeId, AacNodes};

/// A node gets flagged as skippable when its surface area is at least this
/// fraction of the last box emitted above it (its closest non-skipped
/// ancestor); a traversal can then reuse that box's hit instead of testing
/// the (almost identical) box again.
const SKIP_RATIO: f32 = 0.75;

#[derive(Clone, Copy, Debug, PartialEq)]
struct Entry {
    id: AacNodeId,
    depth: usize,
    skip: bool,
}

/// Lists nodes of the pruned tree in pre-order, left child first.
///
/// Both writers go through this walk, so that they agree on the skip flags.
fn walk(nodes: &AacNodes, root: AacNodeId) -> Vec<Entry> {
    let mut out = Vec::with_capacity(nodes[root].subtree_len as usize);
    let mut stack = vec![(root, 0, None)];

    while let Some((id, depth, emitted_area)) = stack.pop() {
        let node = nodes[id];

        let skip = emitted_area.map_or(false, |emitted_area| {
            node.area >= SKIP_RATIO * emitted_area
        });

        out.push(Entry { id, depth, skip });

        if node.is_leaf() {
            continue;
        }

        // Skipped boxes aren't tested, so the children have to be compared
        // with whatever was tested before them
        let emitted_area = if skip { emitted_area } else { Some(node.area) };

        if let Some((left_id, right_id)) = node.children() {
            stack.push((right_id, depth + 1, emitted_area));
            stack.push((left_id, depth + 1, emitted_area));
        }
    }

    out
}

/// Writes the tree in a compact little-endian format:
///
/// ```text
/// i32 node count
/// for each node, in pre-order:
///     u8  is-leaf
///     i32 left subtree's node count (internal) or primitive count (leaf)
///     i32 reserved (zero)
///     u8  skip
///     f64 min.x, min.y, min.z, max.x, max.y, max.z
///     (leaves only) i32 primitive index, repeated primitive count times
/// ```
pub fn write_binary(
    nodes: &AacNodes,
    root: Option<AacNodeId>,
    out: &mut impl Write,
) -> io::Result<()> {
    let Some(root) = root else {
        return write_i32(out, 0);
    };

    write_i32(out, nodes[root].subtree_len as i32)?;

    for entry in walk(nodes, root) {
        let node = nodes[entry.id];

        let left_id = node
            .children()
            .filter(|_| !node.is_leaf())
            .map(|(left_id, _)| left_id);

        match left_id {
            Some(left_id) => {
                out.write_all(&[0])?;
                write_i32(out, nodes[left_id].subtree_len as i32)?;
            }
            None => {
                out.write_all(&[1])?;
                write_i32(out, node.primitives as i32)?;
            }
        }

        write_i32(out, 0)?;
        out.write_all(&[entry.skip as u8])?;

        let (min, max) = (node.bounds.min(), node.bounds.max());

        for value in [min.x, min.y, min.z, max.x, max.y, max.z] {
            out.write_all(&(value as f64).to_le_bytes())?;
        }

        if left_id.is_none() {
            for primitive_id in nodes.primitives(entry.id) {
                write_i32(out, primitive_id.get() as i32)?;
            }
        }
    }

    Ok(())
}

/// Writes the same walk as [`write_binary()`], as indented text.
pub fn write_text(
    nodes: &AacNodes,
    root: Option<AacNodeId>,
    out: &mut impl Write,
) -> io::Result<()> {
    let Some(root) = root else {
        return writeln!(out, "Empty");
    };

    for entry in walk(nodes, root) {
        let node = nodes[entry.id];
        let indent = "  ".repeat(entry.depth);
        let (min, max) = (node.bounds.min(), node.bounds.max());

        let bounds = format!(
            "ax[{}, {}, {}, {}, {}, {}]",
            min.x, min.y, min.z, max.x, max.y, max.z
        );

        if node.is_leaf() {
            let primitives: Vec<_> = nodes
                .primitives(entry.id)
                .iter()
                .map(|id| id.get().to_string())
                .collect();

            writeln!(
                out,
                "{indent}Leaf: Tri[{}] {bounds} skip={}",
                primitives.join(", "),
                entry.skip
            )?;
        } else {
            writeln!(
                out,
                "{indent}Node: {bounds} size={} skip={}",
                node.subtree_len, entry.skip
            )?;
        }
    }

    Ok(())
}

fn write_i32(out: &mut impl Write, value: i32) -> io::Result<()> {
    out.write_all(&value.to_le_bytes())
}
