use serde::{Deserialize, Serialize};

/// A unique atomic site of the asymmetric unit.
///
/// `position` is fractional (lattice-relative), each component conceptually
/// in [0, 1). `label` and `element` are identity metadata the unpacker
/// passes through unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub label: String,
    pub element: String,
    pub position: [f64; 3],
}

/// One atom of the unpacked unit cell.
///
/// Produced by applying a symmetry operator to a [`Site`]; `position` is
/// normalized into [0, 1)³. `site_index` points back at the site that
/// produced it (the earliest one, when several coincide).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub label: String,
    pub element: String,
    pub position: [f64; 3],
    #[serde(skip)]
    pub site_index: usize,
}

impl Atom {
    /// Build the candidate atom a site produces at `position`.
    pub fn from_site(site: &Site, site_index: usize, position: [f64; 3]) -> Atom {
        Atom {
            label: site.label.clone(),
            element: site.element.clone(),
            position,
            site_index,
        }
    }
}
