use crate::model::structure::Atom;
use crate::utils::geometry::periodic_distance;
use std::collections::HashMap;

/// Which duplicate-removal strategy the unpacker runs.
///
/// Both strategies accept exactly the same atoms; they differ only in how
/// the search for nearby accepted atoms is organized.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DedupMethod {
    /// All-pairs scan against the accepted list. The correctness reference.
    Naive,
    /// Spatial hash with wrapped neighbor-bucket lookup. Same decisions,
    /// better search cost on large candidate lists.
    Grid,
}

impl Default for DedupMethod {
    fn default() -> Self {
        DedupMethod::Naive
    }
}

/// Duplicate removal over a candidate list.
///
/// Candidates must be processed in generation order; a candidate is kept
/// only if its cell-aware distance to every already-kept atom exceeds
/// `tolerance` (first seen wins). Implementations must not reorder output.
pub trait DedupStrategy {
    fn dedup(&self, candidates: Vec<Atom>, tolerance: f64) -> Vec<Atom>;
}

pub struct NaiveDedup;

impl DedupStrategy for NaiveDedup {
    fn dedup(&self, candidates: Vec<Atom>, tolerance: f64) -> Vec<Atom> {
        let mut kept: Vec<Atom> = Vec::new();
        for candidate in candidates {
            let duplicate = kept
                .iter()
                .any(|a| periodic_distance(a.position, candidate.position) <= tolerance);
            if !duplicate {
                kept.push(candidate);
            }
        }
        kept
    }
}

/// Buckets positions on a cubic grid with cell width >= tolerance, so any
/// pair within tolerance lands in the same or an adjacent bucket (mod the
/// periodic wrap). Only those 27 buckets are searched per candidate.
pub struct GridDedup;

impl DedupStrategy for GridDedup {
    fn dedup(&self, candidates: Vec<Atom>, tolerance: f64) -> Vec<Atom> {
        // Bucket count per axis; width 1/n >= tolerance. A tolerance >= 0.5
        // degenerates to one bucket per axis, i.e. the naive scan.
        let n = ((1.0 / tolerance).floor() as usize).max(1);

        let mut kept: Vec<Atom> = Vec::new();
        let mut buckets: HashMap<(usize, usize, usize), Vec<usize>> = HashMap::new();

        for candidate in candidates {
            let key = bucket_of(candidate.position, n);
            let mut duplicate = false;

            'search: for di in -1i64..=1 {
                for dj in -1i64..=1 {
                    for dk in -1i64..=1 {
                        let neighbor = (
                            wrap_index(key.0, di, n),
                            wrap_index(key.1, dj, n),
                            wrap_index(key.2, dk, n),
                        );
                        if let Some(members) = buckets.get(&neighbor) {
                            for &idx in members {
                                if periodic_distance(kept[idx].position, candidate.position)
                                    <= tolerance
                                {
                                    duplicate = true;
                                    break 'search;
                                }
                            }
                        }
                    }
                }
            }

            if !duplicate {
                buckets.entry(key).or_default().push(kept.len());
                kept.push(candidate);
            }
        }
        kept
    }
}

fn bucket_of(p: [f64; 3], n: usize) -> (usize, usize, usize) {
    (axis_bucket(p[0], n), axis_bucket(p[1], n), axis_bucket(p[2], n))
}

fn axis_bucket(v: f64, n: usize) -> usize {
    // v is already in [0, 1); the min() guards float rounding at the edge
    ((v * n as f64).floor() as usize).min(n - 1)
}

fn wrap_index(i: usize, d: i64, n: usize) -> usize {
    ((i as i64 + d).rem_euclid(n as i64)) as usize
}
