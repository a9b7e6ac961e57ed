use super::{AacNodeKind, AacNodes};
use crate::BuildError;

/// Largest tolerated relative difference between a node's stored area and
/// the area spanned by its children.
const AREA_EPSILON: f32 = 1e-4;

/// Walks the tree bottom-up, computing each node's amortized traversal cost
/// and collapsing nodes that would be cheaper to trace as a single leaf.
///
/// With `legacy_cost` enabled, the right child's term is weighted by the left
/// child's area ratio (and cost), reproducing trees built by older versions of
/// this algorithm.
pub fn run(
    nodes: &mut AacNodes,
    legacy_cost: bool,
) -> Result<(), BuildError> {
    for id in nodes.ids().collect::<Vec<_>>() {
        let node = nodes[id];

        let (left_id, right_id) = match node.kind {
            AacNodeKind::Primitive { .. } => {
                let node = &mut nodes[id];

                node.cost = leaf_cost(node.primitives);
                node.collapsed = false;
                node.subtree_len = 1;

                continue;
            }

            AacNodeKind::Cluster { left_id, right_id } => (left_id, right_id),
        };

        let left = nodes[left_id];
        let right = nodes[right_id];
        let children_area = (left.bounds + right.bounds).surface_area();

        if node.area < children_area - AREA_EPSILON * children_area.max(1.0) {
            return Err(BuildError::PruneInvariant {
                node: id.get(),
                area: node.area,
                children_area,
            });
        }

        let ratio = |area: f32| {
            if node.area > 0.0 {
                area / node.area
            } else {
                1.0
            }
        };

        let left_term = ratio(left.area) * left.cost;

        let right_term = if legacy_cost {
            left_term
        } else {
            ratio(right.area) * right.cost
        };

        let cost = 1.0 + left_term + right_term;
        let collapsed_cost = leaf_cost(node.primitives);
        let node = &mut nodes[id];

        if cost > collapsed_cost {
            node.cost = collapsed_cost;
            node.collapsed = true;
            node.subtree_len = 1;
        } else {
            node.cost = cost;
            node.collapsed = false;
            node.subtree_len = 1 + left.subtree_len + right.subtree_len;
        }
    }

    Ok(())
}

fn leaf_cost(primitives: u32) -> f32 {
    2.0 * (primitives as f32)
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};

    use super::*;
    use crate::testing::unit_cube;
    use crate::{AacNodeId, BoundingBox, MortonCode, PrimitiveId};

    fn add(nodes: &mut AacNodes, id: u32, bounds: BoundingBox) -> AacNodeId {
        let code = MortonCode::default();

        nodes.add_primitive(PrimitiveId::new(id), code, bounds)
    }

    #[test]
    fn keeps_separated_clusters() {
        let mut nodes = AacNodes::default();

        let a = add(&mut nodes, 0, unit_cube(vec3(0.0, 0.0, 0.0)));
        let b = add(&mut nodes, 1, unit_cube(vec3(100.0, 0.0, 0.0)));
        let c = add(&mut nodes, 2, unit_cube(vec3(0.0, 100.0, 0.0)));
        let d = add(&mut nodes, 3, unit_cube(vec3(100.0, 100.0, 0.0)));
        let ab = nodes.add_cluster(a, b);
        let cd = nodes.add_cluster(c, d);
        let root = nodes.add_cluster(ab, cd);

        run(&mut nodes, false).unwrap();

        assert!(!nodes[root].collapsed);
        assert_eq!(7, nodes[root].subtree_len);
        assert!(nodes[root].cost < 8.0);
    }

    #[test]
    fn collapses_overlapping_clusters() {
        let mut nodes = AacNodes::default();

        let a = add(&mut nodes, 0, unit_cube(Vec3::ZERO));
        let b = add(&mut nodes, 1, unit_cube(Vec3::ZERO));
        let c = add(&mut nodes, 2, unit_cube(Vec3::splat(0.01)));
        let ab = nodes.add_cluster(a, b);
        let root = nodes.add_cluster(ab, c);

        run(&mut nodes, false).unwrap();

        assert!(nodes[ab].collapsed);
        assert!(nodes[root].collapsed);
        assert_eq!(1, nodes[root].subtree_len);
        assert_eq!(6.0, nodes[root].cost);
    }

    #[test]
    fn legacy_cost_uses_left_ratio_twice() {
        let mut nodes = AacNodes::default();

        let a = add(&mut nodes, 0, unit_cube(vec3(0.0, 0.0, 0.0)));
        let b = add(&mut nodes, 1, unit_cube(vec3(1.0, 0.0, 0.0)));
        let c = add(&mut nodes, 2, unit_cube(vec3(9.0, 0.0, 0.0)));
        let ab = nodes.add_cluster(a, b);
        let root = nodes.add_cluster(ab, c);

        let mut legacy = nodes.clone();

        run(&mut nodes, false).unwrap();
        run(&mut legacy, true).unwrap();

        let area = nodes[root].area;
        let left_term = nodes[ab].area / area * nodes[ab].cost;
        let right_term = nodes[c].area / area * nodes[c].cost;

        assert_eq!(1.0 + left_term + right_term, nodes[root].cost);
        assert_eq!(1.0 + left_term + left_term, legacy[root].cost);
    }

    #[test]
    fn broken_bounds() {
        let mut nodes = AacNodes::default();

        let a = add(&mut nodes, 0, unit_cube(vec3(0.0, 0.0, 0.0)));
        let b = add(&mut nodes, 1, unit_cube(vec3(5.0, 0.0, 0.0)));
        let root = nodes.add_cluster(a, b);

        nodes[root].area = 1.0;

        assert!(matches!(
            run(&mut nodes, false),
            Err(BuildError::PruneInvariant { node: 2, .. })
        ));
    }
}
