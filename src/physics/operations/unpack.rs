use crate::model::structure::{Atom, Site};
use crate::model::symmetry::{SymOp, SymmetryError};
use crate::physics::operations::dedup::{DedupMethod, DedupStrategy, GridDedup, NaiveDedup};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- 1. ERROR HANDLING ---

#[derive(Debug, Clone, PartialEq)]
pub enum UnpackError {
    /// Tolerance must be a positive real number
    InvalidTolerance(f64),
    /// One of the operator strings failed to parse
    Operator { index: usize, source: SymmetryError },
}

impl fmt::Display for UnpackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnpackError::InvalidTolerance(t) => {
                write!(f, "Tolerance must be positive, got {}", t)
            }
            UnpackError::Operator { index, source } => {
                write!(f, "Symmetry operator {} is malformed: {}", index + 1, source)
            }
        }
    }
}

impl std::error::Error for UnpackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UnpackError::Operator { source, .. } => Some(source),
            _ => None,
        }
    }
}

// --- 2. CONFIGURATION ---

#[derive(Clone, Copy, Debug)]
pub struct UnpackConfig {
    /// Two atoms closer than this (cell-aware, fractional units) are one atom
    pub tolerance: f64,

    /// Duplicate-removal strategy
    pub dedup: DedupMethod,

    /// Generate candidates on rayon worker threads. Candidate order (and
    /// therefore the result) is identical either way.
    pub parallel: bool,
}

impl Default for UnpackConfig {
    fn default() -> Self {
        Self {
            // Collision threshold in fractional units
            tolerance: 1e-3,
            dedup: DedupMethod::Naive,
            parallel: false,
        }
    }
}

impl UnpackConfig {
    pub fn with_tolerance(tolerance: f64) -> Self {
        Self {
            tolerance,
            ..Default::default()
        }
    }

    /// Spatial-hash deduplication, for large candidate lists.
    pub fn spatial(tolerance: f64) -> Self {
        Self {
            tolerance,
            dedup: DedupMethod::Grid,
            ..Default::default()
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), UnpackError> {
        // The negated comparison also rejects NaN
        if !(self.tolerance > 0.0) {
            return Err(UnpackError::InvalidTolerance(self.tolerance));
        }
        Ok(())
    }
}

// --- 3. RESULTS ---

/// The deduplicated unit-cell contents.
///
/// No two atoms are within tolerance of each other under cell-aware
/// distance, and each atom traces back to the earliest (site, operator)
/// pair that produced its position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnpackedStructure {
    pub atoms: Vec<Atom>,

    /// Statistics for the run that produced this structure
    #[serde(skip)]
    pub info: UnpackInfo,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UnpackInfo {
    pub sites: usize,
    pub operators: usize,
    pub candidates: usize,
    pub duplicates_removed: usize,
}

impl UnpackedStructure {
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

// --- 4. MAIN CALCULATION ---

/// Unpack a unit cell from its asymmetric sites and symmetry operators.
///
/// # Algorithm
/// 1. Apply every operator to every site (site-major, then operator order)
/// 2. Wrap each resulting position into [0, 1)³
/// 3. Keep a candidate only if no kept atom lies within `tolerance`
///    (cell-aware distance, first seen wins)
///
/// Empty `sites` or `operators` yield an empty structure, not an error.
///
/// # Returns
/// - `Ok(UnpackedStructure)` with the unique atoms in generation order
/// - `Err(UnpackError)` for a non-positive tolerance or a malformed operator
pub fn unpack(
    sites: &[Site],
    operators: &[String],
    tolerance: f64,
) -> Result<UnpackedStructure, UnpackError> {
    let parsed = parse_operators(operators)?;
    unpack_with(sites, &parsed, UnpackConfig::with_tolerance(tolerance))
}

/// Parse operator strings in order, reporting the index of the first bad one.
pub fn parse_operators(operators: &[String]) -> Result<Vec<SymOp>, UnpackError> {
    operators
        .iter()
        .enumerate()
        .map(|(index, op)| {
            SymOp::parse(op).map_err(|source| UnpackError::Operator { index, source })
        })
        .collect()
}

/// Unpack with pre-parsed operators and explicit configuration.
pub fn unpack_with(
    sites: &[Site],
    operators: &[SymOp],
    config: UnpackConfig,
) -> Result<UnpackedStructure, UnpackError> {
    config.validate()?;

    let mut info = UnpackInfo {
        sites: sites.len(),
        operators: operators.len(),
        ..Default::default()
    };

    if sites.is_empty() || operators.is_empty() {
        return Ok(UnpackedStructure {
            atoms: Vec::new(),
            info,
        });
    }

    // --- Candidate Generation ---
    // Site-major, then operator. Each (site, operator) evaluation is pure,
    // so the parallel path fans out per site; collect preserves site order
    // and the per-site loop preserves operator order.
    let candidates: Vec<Atom> = if config.parallel {
        sites
            .par_iter()
            .enumerate()
            .map(|(index, site)| expand_site(site, index, operators))
            .collect::<Vec<Vec<Atom>>>()
            .into_iter()
            .flatten()
            .collect()
    } else {
        sites
            .iter()
            .enumerate()
            .flat_map(|(index, site)| expand_site(site, index, operators))
            .collect()
    };

    info.candidates = candidates.len();
    debug!(
        "Unpacking: {} sites x {} operators -> {} candidates",
        info.sites, info.operators, info.candidates
    );

    // --- Deduplication ---
    // First-seen-wins is a true ordering dependency; runs sequentially over
    // the fixed candidate order regardless of the generation path.
    let strategy: &dyn DedupStrategy = match config.dedup {
        DedupMethod::Naive => &NaiveDedup,
        DedupMethod::Grid => &GridDedup,
    };
    let atoms = strategy.dedup(candidates, config.tolerance);

    info.duplicates_removed = info.candidates - atoms.len();
    debug!(
        "Unpacking: kept {} unique atoms ({} duplicates removed)",
        atoms.len(),
        info.duplicates_removed
    );

    Ok(UnpackedStructure { atoms, info })
}

fn expand_site(site: &Site, site_index: usize, operators: &[SymOp]) -> Vec<Atom> {
    operators
        .iter()
        .map(|op| Atom::from_site(site, site_index, op.apply(site.position)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(label: &str, element: &str, position: [f64; 3]) -> Site {
        Site {
            label: label.to_string(),
            element: element.to_string(),
            position,
        }
    }

    fn ops(strs: &[&str]) -> Vec<String> {
        strs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_identity_unpack() {
        let sites = vec![site("O1", "O", [0.1, 0.2, 0.3])];
        let result = unpack(&sites, &ops(&["x,y,z"]), 1e-3).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.atoms[0].label, "O1");
        assert_eq!(result.atoms[0].site_index, 0);
        assert!((result.atoms[0].position[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_operator_idempotent() {
        let sites = vec![
            site("Na1", "Na", [0.0, 0.0, 0.0]),
            site("Cl1", "Cl", [0.5, 0.5, 0.5]),
        ];
        let once = unpack(&sites, &ops(&["x,y,z"]), 1e-3).unwrap();
        let twice = unpack(&sites, &ops(&["x,y,z", "x,y,z"]), 1e-3).unwrap();

        assert_eq!(once.atoms, twice.atoms);
        assert_eq!(twice.info.candidates, 4);
        assert_eq!(twice.info.duplicates_removed, 2);
    }

    #[test]
    fn test_inversion_doubles_general_position() {
        // P-1: the origin site is fixed by inversion, a general site is not
        let operators = ops(&["x,y,z", "-x,-y,-z"]);
        let origin = unpack(&vec![site("A", "C", [0.0, 0.0, 0.0])], &operators, 1e-3).unwrap();
        assert_eq!(origin.len(), 1);

        let general =
            unpack(&vec![site("B", "C", [0.25, 0.1, 0.4])], &operators, 1e-3).unwrap();
        assert_eq!(general.len(), 2);
        assert!((general.atoms[1].position[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_first_operator_is_representative() {
        // Both operators map the site onto the same position; the kept atom
        // must come from the first one (identity), not the shifted inverse.
        let sites = vec![site("S", "S", [0.5, 0.0, 0.0])];
        let result = unpack(&sites, &ops(&["x,y,z", "1-x,y,z"]), 1e-3).unwrap();
        assert_eq!(result.len(), 1);
        assert!((result.atoms[0].position[0] - 0.5).abs() < 1e-12);
        assert_eq!(result.info.duplicates_removed, 1);
    }

    #[test]
    fn test_periodic_boundary_dedup() {
        let sites = vec![
            site("A", "C", [0.999, 0.0, 0.0]),
            site("B", "C", [0.001, 0.0, 0.0]),
        ];
        let merged = unpack(&sites, &ops(&["x,y,z"]), 0.01).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.atoms[0].label, "A");

        let distinct = unpack(&sites, &ops(&["x,y,z"]), 0.0005).unwrap();
        assert_eq!(distinct.len(), 2);
    }

    #[test]
    fn test_tolerance_validation() {
        let sites = vec![site("A", "C", [0.0, 0.0, 0.0])];
        let operators = ops(&["x,y,z"]);
        assert_eq!(
            unpack(&sites, &operators, 0.0).unwrap_err(),
            UnpackError::InvalidTolerance(0.0)
        );
        assert_eq!(
            unpack(&sites, &operators, -1.0).unwrap_err(),
            UnpackError::InvalidTolerance(-1.0)
        );
    }

    #[test]
    fn test_empty_inputs() {
        let sites = vec![site("A", "C", [0.0, 0.0, 0.0])];
        let operators = ops(&["x,y,z"]);

        let no_sites = unpack(&[], &operators, 0.01).unwrap();
        assert!(no_sites.is_empty());
        assert_eq!(no_sites.info.operators, 1);

        let no_ops = unpack(&sites, &[], 0.01).unwrap();
        assert!(no_ops.is_empty());
        assert_eq!(no_ops.info.sites, 1);
    }

    #[test]
    fn test_malformed_operator_reports_index() {
        let sites = vec![site("A", "C", [0.0, 0.0, 0.0])];
        let err = unpack(&sites, &ops(&["x,y,z", "x,y"]), 1e-3).unwrap_err();
        assert!(matches!(err, UnpackError::Operator { index: 1, .. }));
    }

    #[test]
    fn test_determinism() {
        let sites = vec![
            site("Ti", "Ti", [0.0, 0.0, 0.0]),
            site("O1", "O", [0.3053, 0.3053, 0.0]),
        ];
        // Rutile-style operator set
        let operators = ops(&[
            "x,y,z",
            "-x,-y,z",
            "1/2-y,1/2+x,1/2+z",
            "1/2+y,1/2-x,1/2+z",
            "-y,-x,-z",
            "y,x,-z",
        ]);
        let a = unpack(&sites, &operators, 1e-3).unwrap();
        let b = unpack(&sites, &operators, 1e-3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let sites: Vec<Site> = (0..20)
            .map(|i| {
                let f = i as f64;
                site(
                    &format!("A{}", i),
                    "C",
                    [(f * 0.37) % 1.0, (f * 0.61) % 1.0, (f * 0.89) % 1.0],
                )
            })
            .collect();
        let operators =
            parse_operators(&ops(&["x,y,z", "-x,-y,-z", "1/2+x,1/2+y,z"])).unwrap();

        let sequential = unpack_with(
            &sites,
            &operators,
            UnpackConfig::with_tolerance(1e-3),
        )
        .unwrap();
        let parallel = unpack_with(
            &sites,
            &operators,
            UnpackConfig {
                parallel: true,
                ..UnpackConfig::with_tolerance(1e-3)
            },
        )
        .unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_grid_strategy_matches_naive() {
        let sites = vec![
            site("Na1", "Na", [0.0, 0.0, 0.0]),
            site("Cl1", "Cl", [0.5, 0.5, 0.5]),
        ];
        // Fm-3m face centering generators
        let operators = ops(&[
            "x,y,z",
            "x,1/2+y,1/2+z",
            "1/2+x,y,1/2+z",
            "1/2+x,1/2+y,z",
            "-x,-y,-z",
        ]);
        let parsed = parse_operators(&operators).unwrap();

        let naive = unpack_with(&sites, &parsed, UnpackConfig::with_tolerance(1e-3)).unwrap();
        let grid = unpack_with(&sites, &parsed, UnpackConfig::spatial(1e-3)).unwrap();
        assert_eq!(naive.atoms, grid.atoms);
        // 2 sites x 5 operators, face centering yields 4 Na + 4 Cl
        assert_eq!(naive.len(), 8);
    }

    #[test]
    fn test_json_document_round_trip() {
        // Packed-crystal document shape used by the file-format collaborators
        let doc = serde_json::json!({
            "atoms": [
                { "label": "Na1", "element": "Na", "position": [0.0, 0.0, 0.0] },
                { "label": "Cl1", "element": "Cl", "position": [0.5, 0.5, 0.5] }
            ],
            "symmetry": ["x,y,z", "-x,-y,-z"]
        });

        let sites: Vec<Site> = serde_json::from_value(doc["atoms"].clone()).unwrap();
        let operators: Vec<String> = serde_json::from_value(doc["symmetry"].clone()).unwrap();

        let result = unpack(&sites, &operators, 1e-3).unwrap();
        assert_eq!(result.len(), 2);

        let out = serde_json::to_value(&result).unwrap();
        assert_eq!(out["atoms"].as_array().unwrap().len(), 2);
        assert_eq!(out["atoms"][0]["element"], "Na");
    }
}
