//! Crystallographic unit-cell unpacking.
//!
//! Applies textual symmetry operators (`"x,y,z"`, `"-x,1/2+y,-z"`) to the
//! unique sites of an asymmetric unit, wraps the results into the canonical
//! cell range, and removes the duplicate atoms that coinciding
//! (site, operator) combinations produce.
//!
//! ```
//! use cunpack::{unpack, Site};
//!
//! let sites = vec![Site {
//!     label: "Cu1".into(),
//!     element: "Cu".into(),
//!     position: [0.25, 0.1, 0.4],
//! }];
//! let operators = vec!["x,y,z".to_string(), "-x,-y,-z".to_string()];
//!
//! let cell = unpack(&sites, &operators, 1e-3).unwrap();
//! assert_eq!(cell.len(), 2);
//! ```

pub mod model;
pub mod physics;
pub mod utils;

// Re-exports for cleaner imports
pub use model::structure::{Atom, Site};
pub use model::symmetry::{apply_symmetry, SymOp, SymmetryError};
pub use physics::operations::dedup::{DedupMethod, DedupStrategy, GridDedup, NaiveDedup};
pub use physics::operations::unpack::{
    parse_operators, unpack, unpack_with, UnpackConfig, UnpackError, UnpackInfo,
    UnpackedStructure,
};
