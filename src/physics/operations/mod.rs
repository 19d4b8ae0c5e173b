//src/physics/operations/mod.rs
pub mod dedup;
pub mod unpack;

// Re-exports for cleaner imports
pub use dedup::{DedupMethod, DedupStrategy, GridDedup, NaiveDedup};
pub use unpack::{
    parse_operators, unpack, unpack_with, UnpackConfig, UnpackError, UnpackInfo,
    UnpackedStructure,
};
