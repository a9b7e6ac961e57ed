mod clustering;
mod nodes;
mod prune;
mod radix_sort;
mod serializer;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use derivative::Derivative;

use self::clustering::ClusterWorkspace;
pub use self::nodes::*;
use crate::bvh::PrimitiveInfo;
use crate::{
    measure, Boundable, BoundingBox, BuildError, BvhBuilder, BvhNode,
    MortonCode, PrimitiveId, TriangleMesh,
};

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct AacConfig {
    /// Ranges smaller than this are clustered directly instead of being
    /// bisected further.
    #[derivative(Default(value = "20"))]
    pub delta: usize,

    /// Within `0.0 ..= 1.0`; the higher, the more aggressively large ranges
    /// get reduced before being merged with their neighbours, trading tree
    /// quality for build speed.
    #[derivative(Default(value = "0.1"))]
    pub alpha: f32,

    /// Weighs the right child's cost by the left child's area ratio while
    /// pruning, matching trees built by older versions of this algorithm.
    pub legacy_prune_cost: bool,
}

/// Builds BVH using Approximate Agglomerative Clustering as described by Gu,
/// He, Fatahalian and Blelloch in [1].
///
/// Primitives are sorted along a Morton curve, recursively bisected by their
/// codes and then clustered bottom-up, each range keeping only a handful of
/// clusters to pass up to its parent. The finished tree is pruned by
/// collapsing subtrees that are cheaper to trace as leaves.
///
/// [1] http://graphics.cs.cmu.edu/projects/aac/aac_build.pdf
#[derive(Clone, Copy, Debug, Default)]
pub struct AacBuilder {
    config: AacConfig,
}

impl AacBuilder {
    pub fn new(config: AacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AacConfig {
        &self.config
    }

    pub fn prepare<P>(
        &self,
        primitives: &[P],
    ) -> Result<PreparedAac, BuildError>
    where
        P: Boundable,
    {
        self.validate_config()?;

        let infos = PrimitiveInfo::gather(primitives);
        let bounds = infos.iter().map(|info| info.bounds).collect();
        let reduction = ClusterReduction::new(&self.config);

        log::debug!(
            "Prepared AAC; primitives = {}, delta = {}, alpha = {}",
            infos.len(),
            self.config.delta,
            self.config.alpha
        );

        Ok(PreparedAac {
            config: self.config,
            infos,
            bounds,
            reduction,
        })
    }

    pub fn prepare_mesh(
        &self,
        mesh: &TriangleMesh,
    ) -> Result<PreparedAac, BuildError> {
        self.prepare(&mesh.triangles())
    }

    fn validate_config(&self) -> Result<(), BuildError> {
        if self.config.delta < 2 {
            return Err(BuildError::InvalidConfig(format!(
                "delta must be at least 2, got {}",
                self.config.delta
            )));
        }

        if !(0.0..=1.0).contains(&self.config.alpha) {
            return Err(BuildError::InvalidConfig(format!(
                "alpha must be within 0.0 ..= 1.0, got {}",
                self.config.alpha
            )));
        }

        Ok(())
    }
}

impl BvhBuilder for AacBuilder {
    fn build<P>(&self, primitives: &[P]) -> Result<Option<BvhNode>, BuildError>
    where
        P: Boundable + Sync,
    {
        Ok(self.prepare(primitives)?.build()?.to_bvh())
    }
}

/// Number of clusters a range of given length gets reduced to before being
/// passed to its parent.
#[derive(Clone, Debug)]
struct ClusterReduction {
    delta: usize,
    alpha: f32,

    /// Precomputed values for ranges shorter than `delta`.
    table: Vec<usize>,
}

impl ClusterReduction {
    fn new(config: &AacConfig) -> Self {
        let mut this = Self {
            delta: config.delta,
            alpha: config.alpha,
            table: Vec::new(),
        };

        this.table = (0..config.delta).map(|len| this.compute(len)).collect();
        this
    }

    fn get(&self, len: usize) -> usize {
        self.table
            .get(len)
            .copied()
            .unwrap_or_else(|| self.compute(len))
    }

    fn compute(&self, len: usize) -> usize {
        if len <= 1 {
            return len;
        }

        let half_delta = (self.delta as f32) / 2.0;
        let exponent = 0.5 - self.alpha / 2.0;
        let target = half_delta * ((len as f32) / half_delta).powf(exponent);

        (target.round() as usize).clamp(1, len)
    }

    /// Workspace capacity needed to build a tree over given number of
    /// primitives; one above the largest number of clusters ever combined at
    /// once.
    fn capacity(&self, len: usize) -> usize {
        self.delta.max(2 * self.get(len)).max(2) + 1
    }
}

/// Primitives gathered and ready to be clustered.
#[derive(Clone, Debug)]
pub struct PreparedAac {
    config: AacConfig,
    infos: Vec<PrimitiveInfo>,
    bounds: BoundingBox,
    reduction: ClusterReduction,
}

impl PreparedAac {
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Number of clusters a range of given length is reduced to.
    pub fn reduction(&self, len: usize) -> usize {
        self.reduction.get(len)
    }

    /// Number of bits per axis used when encoding primitives' centers.
    pub fn morton_bits(&self) -> u32 {
        morton_bits(self.infos.len())
    }

    pub fn build(&self) -> Result<AacTree, BuildError> {
        let len = self.infos.len();

        log::info!("Building AAC; primitives = {}", len);

        if len == 0 {
            return Ok(AacTree {
                nodes: AacNodes::default(),
                root: None,
            });
        }

        let codes = measure("aac/radix-sort", || self.sort());
        let mut nodes = AacNodes::with_primitives(len);

        for &(code, id) in &codes {
            nodes.add_primitive(id, code, self.infos[id.index()].bounds);
        }

        let mut ctx = BuildCtx {
            nodes,
            codes: codes.into_iter().map(|(code, _)| code).collect(),
            workspace: ClusterWorkspace::new(self.reduction.capacity(len)),
            reduction: &self.reduction,
            delta: self.config.delta,
        };

        log::debug!(
            "Clustering; morton bits = {}, workspace capacity = {}",
            self.morton_bits(),
            ctx.workspace.capacity()
        );

        let root = measure("aac/cluster", || -> Result<_, BuildError> {
            let top_bit = 3 * self.morton_bits() - 1;
            let clusters = ctx.build_range(0, len, Some(top_bit))?;
            let clusters = ctx.combine(clusters, 1)?;

            clusters.first().copied().ok_or(BuildError::MissingSubtree)
        })?;

        let mut nodes = ctx.nodes;

        measure("aac/prune", || {
            prune::run(&mut nodes, self.config.legacy_prune_cost)
        })?;

        let tree = AacTree {
            nodes,
            root: Some(root),
        };

        log::info!(
            "AAC built; nodes = {}, pruned nodes = {}",
            tree.nodes.len(),
            tree.len()
        );

        Ok(tree)
    }

    /// Builds the tree and saves it through [`AacTree::save()`].
    pub fn build_and_save(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<AacTree, BuildError> {
        let tree = self.build()?;

        tree.save(path)?;

        Ok(tree)
    }

    fn sort(&self) -> Vec<(MortonCode, PrimitiveId)> {
        let bits = self.morton_bits();

        let mut codes: Vec<_> = self
            .infos
            .iter()
            .enumerate()
            .map(|(id, info)| {
                let center = self.bounds.map(info.center);

                (
                    MortonCode::from_normalized(center, bits),
                    PrimitiveId::new(id as u32),
                )
            })
            .collect();

        radix_sort::sort_by_code(&mut codes, 3 * bits);
        codes
    }
}

/// Number of bits per axis needed to tell apart given number of primitives;
/// the more primitives, the finer the grid.
fn morton_bits(len: usize) -> u32 {
    match len {
        len if len > (1 << 20) => 14,
        len if len > (1 << 18) => 12,
        _ => 10,
    }
}

struct BuildCtx<'a> {
    nodes: AacNodes,
    codes: Vec<MortonCode>,
    workspace: ClusterWorkspace,
    reduction: &'a ClusterReduction,
    delta: usize,
}

impl BuildCtx<'_> {
    /// Clusters primitives within `start..end` (positions within the sorted
    /// order, which is also their node ids), returning the clusters left
    /// after reducing the range.
    ///
    /// Ranges are bisected at the first primitive whose code has `bit` set;
    /// once the bits run out, ranges are bisected at their midpoint.
    fn build_range(
        &mut self,
        start: usize,
        end: usize,
        bit: Option<u32>,
    ) -> Result<Vec<AacNodeId>, BuildError> {
        let len = end - start;

        if len < self.delta {
            let clusters = (start..end)
                .map(|id| AacNodeId::new(id as u32))
                .collect();

            return self.combine(clusters, self.reduction.get(len));
        }

        let split = match bit {
            Some(bit) => self.find_split(start, end, bit),
            None => start + len / 2,
        };

        let next_bit = bit.and_then(|bit| bit.checked_sub(1));

        if split == start || split == end {
            return self.build_range(start, end, next_bit);
        }

        let mut clusters = self.build_range(start, split, next_bit)?;

        clusters.extend(self.build_range(split, end, next_bit)?);

        self.combine(clusters, self.reduction.get(len))
    }

    /// Returns position of the first primitive within `start..end` whose code
    /// has given bit set.
    ///
    /// All codes within the range share the bits above `bit`, so the ones
    /// with `bit` cleared come first.
    fn find_split(&self, start: usize, end: usize, bit: u32) -> usize {
        let (mut lo, mut hi) = (start, end);

        while lo < hi {
            let mid = lo + (hi - lo) / 2;

            if self.codes[mid].bit(bit) {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }

        lo
    }

    fn combine(
        &mut self,
        clusters: Vec<AacNodeId>,
        target: usize,
    ) -> Result<Vec<AacNodeId>, BuildError> {
        self.workspace.combine(&mut self.nodes, clusters, target)
    }
}

/// Clustered and pruned hierarchy.
#[derive(Clone, Debug)]
pub struct AacTree {
    nodes: AacNodes,
    root: Option<AacNodeId>,
}

impl AacTree {
    pub fn nodes(&self) -> &AacNodes {
        &self.nodes
    }

    pub fn root(&self) -> Option<AacNodeId> {
        self.root
    }

    /// Returns the number of nodes left after pruning.
    pub fn len(&self) -> usize {
        self.root
            .map_or(0, |root| self.nodes[root].subtree_len as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn write_binary(&self, out: &mut impl Write) -> Result<(), BuildError> {
        serializer::write_binary(&self.nodes, self.root, out)?;

        Ok(())
    }

    pub fn write_text(&self, out: &mut impl Write) -> Result<(), BuildError> {
        serializer::write_text(&self.nodes, self.root, out)?;

        Ok(())
    }

    /// Writes the binary dump into `path` and the text one next to it, with
    /// the `.txt` extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BuildError> {
        let path = path.as_ref();
        let text_path = path.with_extension("txt");

        log::debug!(
            "Saving AAC tree; binary = {}, text = {}",
            path.display(),
            text_path.display()
        );

        let mut out = BufWriter::new(File::create(path)?);

        self.write_binary(&mut out)?;
        out.flush()?;

        let mut out = BufWriter::new(File::create(text_path)?);

        self.write_text(&mut out)?;
        out.flush()?;

        Ok(())
    }

    /// Converts the pruned tree into a regular hierarchy; collapsed nodes
    /// become leaves holding all primitives of their subtrees.
    pub fn to_bvh(&self) -> Option<BvhNode> {
        self.root.map(|root| self.to_bvh_ex(root))
    }

    fn to_bvh_ex(&self, id: AacNodeId) -> BvhNode {
        let node = self.nodes[id];

        match node.children() {
            Some((left_id, right_id)) if !node.is_leaf() => BvhNode::internal(
                self.to_bvh_ex(left_id),
                self.to_bvh_ex(right_id),
            ),

            _ => BvhNode::leaf(node.bounds, self.nodes.primitives(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{vec3, Vec3};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::testing::*;

    #[test]
    fn empty() {
        let primitives: Vec<BoundingBox> = Vec::new();
        let tree = AacBuilder::default().prepare(&primitives).unwrap();
        let tree = tree.build().unwrap();

        assert!(tree.is_empty());
        assert_eq!(0, tree.len());
        assert_eq!(None, tree.to_bvh());
    }

    #[test]
    fn single() {
        let primitives = vec![unit_cube(Vec3::ONE)];
        let root = AacBuilder::default().build(&primitives).unwrap();

        assert_eq!(
            Some(BvhNode::leaf(primitives[0], vec![PrimitiveId::new(0)])),
            root
        );
    }

    #[test]
    fn random_scene() {
        let primitives = random_cubes(3000, 100.0, 0);
        let tree = AacBuilder::default().prepare(&primitives).unwrap();
        let tree = tree.build().unwrap();
        let root = tree.to_bvh().unwrap();

        assert_well_formed(&root, &primitives);
        assert_eq!(root.stats().nodes, tree.len());
    }

    #[test]
    fn clustering_groups_nearby_primitives() {
        let mut primitives = Vec::new();

        for cluster in [Vec3::ZERO, Vec3::splat(1000.0)] {
            for i in 0..50 {
                primitives.push(unit_cube(cluster + Vec3::X * (i as f32)));
            }
        }

        let root = AacBuilder::default().build(&primitives).unwrap().unwrap();

        assert_well_formed(&root, &primitives);

        let BvhNode::Internal { left, right, .. } = root else {
            panic!("expected an internal node");
        };

        let mut halves = [left.primitives(), right.primitives()];

        for half in &mut halves {
            half.sort();
        }

        halves.sort();

        assert_eq!(
            (0..50).map(PrimitiveId::new).collect::<Vec<_>>(),
            halves[0]
        );
    }

    #[test]
    fn identical_primitives() {
        let primitives = vec![unit_cube(Vec3::splat(5.0)); 200];
        let root = AacBuilder::default().build(&primitives).unwrap().unwrap();

        assert_well_formed(&root, &primitives);

        // Splitting identical primitives never pays off
        assert!(root.is_leaf());
    }

    #[test]
    fn flat_scene() {
        let mut rng = StdRng::seed_from_u64(1);

        let primitives: Vec<_> = (0..500)
            .map(|_| {
                let x = rng.gen_range(0.0..50.0);
                let y = rng.gen_range(0.0..50.0);
                let center = vec3(x, y, 0.0);

                BoundingBox::new(center - 0.5, center + 0.5)
            })
            .collect();

        let root = AacBuilder::default().build(&primitives).unwrap().unwrap();

        assert_well_formed(&root, &primitives);
    }

    #[test]
    fn alpha_trades_quality_for_fewer_clusters() {
        let low = AacBuilder::new(AacConfig {
            alpha: 0.0,
            ..Default::default()
        })
        .prepare(&[unit_cube(Vec3::ZERO)])
        .unwrap();

        let high = AacBuilder::new(AacConfig {
            alpha: 1.0,
            ..Default::default()
        })
        .prepare(&[unit_cube(Vec3::ZERO)])
        .unwrap();

        assert_eq!(1, low.reduction(1));
        assert_eq!(3, low.reduction(3));
        assert_eq!(10, high.reduction(1000));
        assert!(low.reduction(1000) > high.reduction(1000));
        assert!(low.reduction(1000) < 1000);
    }

    #[test]
    fn morton_bits_grow_with_primitive_count() {
        assert_eq!(10, morton_bits(0));
        assert_eq!(10, morton_bits(1 << 18));
        assert_eq!(12, morton_bits((1 << 18) + 1));
        assert_eq!(12, morton_bits(1 << 20));
        assert_eq!(14, morton_bits((1 << 20) + 1));
    }

    #[test]
    fn workspace_fits_every_combine() {
        for (delta, alpha) in [(2, 0.0), (4, 1.0), (20, 0.1), (20, 0.0)] {
            let primitives = random_cubes(700, 100.0, delta as u64);

            let root = AacBuilder::new(AacConfig {
                delta,
                alpha,
                ..Default::default()
            })
            .build(&primitives)
            .unwrap()
            .unwrap();

            assert_covers(&root, primitives.len());
        }
    }

    #[test]
    fn mesh() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut vertices = Vec::new();
        let mut faces = Vec::new();

        for i in 0..400 {
            let origin = vec3(
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
            );

            vertices.push(origin);
            vertices.push(origin + vec3(1.0, 0.0, 0.0));
            vertices.push(origin + vec3(0.0, 1.0, 0.5));
            faces.push([3 * i, 3 * i + 1, 3 * i + 2]);
        }

        let mesh = TriangleMesh::new(vertices, faces).unwrap();

        let tree = AacBuilder::default()
            .prepare_mesh(&mesh)
            .unwrap()
            .build()
            .unwrap();

        let root = tree.to_bvh().unwrap();

        assert_covers(&root, mesh.len());
        assert_monotonic(&root);
        assert!(root.validate(&mesh.triangles()).is_ok());
    }

    #[test]
    fn legacy_prune_cost() {
        let primitives = random_cubes(500, 100.0, 3);

        let root = AacBuilder::new(AacConfig {
            legacy_prune_cost: true,
            ..Default::default()
        })
        .build(&primitives)
        .unwrap()
        .unwrap();

        assert_well_formed(&root, &primitives);
    }

    #[test]
    fn deterministic() {
        let primitives = random_cubes(1000, 100.0, 4);
        let target = AacBuilder::default();

        assert_eq!(
            target.build(&primitives).unwrap(),
            target.build(&primitives).unwrap()
        );
    }

    #[test]
    fn invalid_config() {
        let primitives = random_cubes(10, 100.0, 5);

        for config in [
            AacConfig {
                delta: 1,
                ..Default::default()
            },
            AacConfig {
                alpha: 1.5,
                ..Default::default()
            },
        ] {
            assert!(matches!(
                AacBuilder::new(config).prepare(&primitives),
                Err(BuildError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn save() {
        let primitives = random_cubes(100, 100.0, 6);

        let dir = std::env::temp_dir()
            .join(format!("bvhkit-aac-{}", std::process::id()));

        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("tree.bin");

        let tree = AacBuilder::default()
            .prepare(&primitives)
            .unwrap()
            .build_and_save(&path)
            .unwrap();

        let binary = std::fs::read(&path).unwrap();
        let text = std::fs::read_to_string(path.with_extension("txt")).unwrap();

        let node_count = i32::from_le_bytes(binary[..4].try_into().unwrap());

        assert_eq!(tree.len(), node_count as usize);
        assert_eq!(tree.len(), text.lines().count());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
