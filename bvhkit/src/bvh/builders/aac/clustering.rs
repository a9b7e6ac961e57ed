use derivative::Derivative;

use super::{AacNodeId, AacNodes};
use crate::BuildError;

/// Scratch buffers for agglomerative clustering, allocated once per build and
/// reused by every range.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ClusterWorkspace {
    capacity: usize,

    /// Row-major `len x len` matrix of merge costs.
    #[derivative(Debug = "ignore")]
    distances: Vec<f32>,

    /// Index of each cluster's nearest neighbour.
    #[derivative(Debug = "ignore")]
    closest: Vec<usize>,

    /// Clusters whose nearest neighbour got merged away and must be looked
    /// up again.
    #[derivative(Debug = "ignore")]
    stale: Vec<bool>,
}

impl ClusterWorkspace {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            distances: Vec::new(),
            closest: Vec::with_capacity(capacity),
            stale: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Greedily merges the closest pair of clusters until at most `target`
    /// clusters remain.
    ///
    /// Fails if `clusters` doesn't fit strictly below the capacity.
    ///
    /// Distance between two clusters is the surface area of a box enclosing
    /// both of them, so merges that create the smallest boxes come first.
    pub fn combine(
        &mut self,
        nodes: &mut AacNodes,
        mut clusters: Vec<AacNodeId>,
        target: usize,
    ) -> Result<Vec<AacNodeId>, BuildError> {
        let stride = clusters.len();
        let target = target.max(1);

        if stride >= self.capacity {
            return Err(BuildError::WorkspaceOverflow {
                len: stride,
                capacity: self.capacity,
            });
        }

        if stride <= target {
            return Ok(clusters);
        }

        self.reset(nodes, &clusters);

        let mut len = stride;

        while len > target {
            let (mut a, mut b) = self.find_best_pair(len);

            if a > b {
                (a, b) = (b, a);
            }

            let merged = nodes.add_cluster(clusters[a], clusters[b]);

            for i in 0..len {
                self.stale[i] = self.closest[i] == a || self.closest[i] == b;
            }

            clusters[a] = merged;

            for i in 0..len {
                if i != a && i != b {
                    let dist = distance(nodes, merged, clusters[i]);

                    self.distances[a * stride + i] = dist;
                    self.distances[i * stride + a] = dist;
                }
            }

            // Remove `b` by moving the last cluster into its place
            let last = len - 1;

            if b != last {
                clusters[b] = clusters[last];

                for i in 0..len {
                    self.distances[b * stride + i] =
                        self.distances[last * stride + i];
                }

                for i in 0..len {
                    self.distances[i * stride + b] =
                        self.distances[i * stride + last];
                }

                self.distances[b * stride + b] = f32::INFINITY;
                self.closest[b] = self.closest[last];
                self.stale[b] = self.stale[last];

                for i in 0..last {
                    if self.closest[i] == last {
                        self.closest[i] = b;
                    }
                }
            }

            clusters.pop();
            len -= 1;

            // ---

            for i in 0..len {
                if i == a {
                    continue;
                }

                if self.stale[i] {
                    self.closest[i] = self.find_closest(i, len);
                } else {
                    let dist_to_merged = self.distances[i * stride + a];
                    let dist_to_closest =
                        self.distances[i * stride + self.closest[i]];

                    if dist_to_merged < dist_to_closest {
                        self.closest[i] = a;
                    }
                }
            }

            if len > 1 {
                self.closest[a] = self.find_closest(a, len);
            }
        }

        Ok(clusters)
    }

    fn reset(&mut self, nodes: &AacNodes, clusters: &[AacNodeId]) {
        let len = clusters.len();

        self.distances.clear();
        self.distances.resize(len * len, f32::INFINITY);
        self.closest.clear();
        self.closest.resize(len, 0);
        self.stale.clear();
        self.stale.resize(len, false);

        for i in 0..len {
            for j in (i + 1)..len {
                let dist = distance(nodes, clusters[i], clusters[j]);

                self.distances[i * len + j] = dist;
                self.distances[j * len + i] = dist;
            }
        }

        for i in 0..len {
            self.closest[i] = self.find_closest(i, len);
        }
    }

    fn find_closest(&self, i: usize, len: usize) -> usize {
        let stride = self.closest.len();
        let row = &self.distances[i * stride..][..len];
        let mut best = (if i == 0 { 1 } else { 0 }, f32::INFINITY);

        for (j, &dist) in row.iter().enumerate() {
            if j != i && dist < best.1 {
                best = (j, dist);
            }
        }

        best.0
    }

    fn find_best_pair(&self, len: usize) -> (usize, usize) {
        let stride = self.closest.len();
        let mut best = (0, f32::INFINITY);

        for i in 0..len {
            let dist = self.distances[i * stride + self.closest[i]];

            if dist < best.1 {
                best = (i, dist);
            }
        }

        (best.0, self.closest[best.0])
    }
}

fn distance(nodes: &AacNodes, a: AacNodeId, b: AacNodeId) -> f32 {
    (nodes[a].bounds + nodes[b].bounds).surface_area()
}
