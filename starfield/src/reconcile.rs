//! Merging of duplicate detections across tile boundaries.
//!
//! An object near a tile edge can be reported by both adjacent tiles. Two
//! detections are linked when their distance is at most the tolerance, and
//! every connected group is replaced by one representative. Merging repeats
//! until no two representatives are within tolerance, so the output is a
//! fixed point: reconciling it again with the same tolerance changes nothing.
//!
//! Input is sorted into canonical order first, which makes the output
//! independent of the order detections arrive in from the workers.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, sort_canonical};
use crate::error::{Error, Result};

/// Smallest grid cell. Keeps tiny tolerances from producing huge cell indices.
const MIN_CELL_SIZE: f64 = 1.0;

/// How a cluster of linked detections collapses into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Mean position of the cluster; flux and peak from its first member in
    /// canonical order.
    #[default]
    Centroid,
    /// The member with the greatest flux, unchanged.
    Brightest,
}

/// Collapses detections closer than `tolerance` into single objects.
///
/// The result is sorted in canonical order.
pub fn reconcile(
    detections: &[Detection],
    tolerance: f64,
    policy: MergePolicy,
) -> Result<Vec<Detection>> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(Error::invalid_input(format!(
            "boundary tolerance must be finite and non-negative, got {tolerance}"
        )));
    }

    let mut current = detections.to_vec();
    sort_canonical(&mut current);

    let mut passes = 0;
    loop {
        passes += 1;
        let clusters = cluster(&current, tolerance);
        if clusters.len() == current.len() {
            break;
        }
        let mut merged: Vec<Detection> = clusters
            .iter()
            .map(|members| merge(&current, members, policy))
            .collect();
        sort_canonical(&mut merged);
        current = merged;
    }

    tracing::debug!(
        input = detections.len(),
        output = current.len(),
        merged = detections.len() - current.len(),
        passes,
        tolerance,
        "Reconciled detections"
    );
    Ok(current)
}

/// Groups indices of `points` into distance-linked clusters.
///
/// Each cluster lists its members in ascending index order.
fn cluster(points: &[Detection], tolerance: f64) -> Vec<Vec<usize>> {
    let tolerance_sq = tolerance * tolerance;
    let cell_size = tolerance.max(MIN_CELL_SIZE);
    let cell_of = |d: &Detection| {
        (
            (d.pos.x / cell_size).floor() as i64,
            (d.pos.y / cell_size).floor() as i64,
        )
    };

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        grid.entry(cell_of(point)).or_default().push(i);
    }

    let mut sets = DisjointSet::new(points.len());
    for (i, point) in points.iter().enumerate() {
        let (cx, cy) = cell_of(point);
        for ny in cy.saturating_sub(1)..=cy.saturating_add(1) {
            for nx in cx.saturating_sub(1)..=cx.saturating_add(1) {
                let Some(bucket) = grid.get(&(nx, ny)) else {
                    continue;
                };
                for &j in bucket {
                    if j > i && point.pos.distance_squared(points[j].pos) <= tolerance_sq {
                        sets.union(i, j);
                    }
                }
            }
        }
    }

    let mut by_root: HashMap<usize, usize> = HashMap::new();
    let mut clusters: Vec<Vec<usize>> = Vec::new();
    for i in 0..points.len() {
        let root = sets.find(i);
        let slot = *by_root.entry(root).or_insert_with(|| {
            clusters.push(Vec::new());
            clusters.len() - 1
        });
        clusters[slot].push(i);
    }
    clusters
}

fn merge(points: &[Detection], members: &[usize], policy: MergePolicy) -> Detection {
    debug_assert!(!members.is_empty());
    let first = points[members[0]];
    if members.len() == 1 {
        return first;
    }

    match policy {
        MergePolicy::Centroid => {
            let sum = members
                .iter()
                .fold(glam::DVec2::ZERO, |acc, &i| acc + points[i].pos);
            Detection {
                pos: sum / members.len() as f64,
                ..first
            }
        }
        MergePolicy::Brightest => members[1..].iter().fold(first, |best, &i| {
            if points[i].flux > best.flux {
                points[i]
            } else {
                best
            }
        }),
    }
}

/// Union-find with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}
