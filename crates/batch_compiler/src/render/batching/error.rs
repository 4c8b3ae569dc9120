//! Errors raised while building a render group
//!
//! None of these leave the compiler: a failed group is logged, counted in
//! [`CompileStats`](super::CompileStats) and skipped for this compile.

use crate::backend::ProgramError;
use crate::render::mesh::{IndexType, Topology};

/// Result type for render group construction
pub type BuildResult<T> = Result<T, BuildError>;

/// Which structural property differed inside one group
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Mismatch {
    /// Meshes use different primitive topologies
    #[error("topology {found:?} differs from {expected:?}")]
    Topology {
        /// Topology of the first member
        expected: Topology,
        /// Offending topology
        found: Topology,
    },

    /// Meshes use different index element widths
    #[error("index width {found:?} differs from {expected:?}")]
    IndexWidth {
        /// Index width of the first member
        expected: IndexType,
        /// Offending index width
        found: IndexType,
    },

    /// Meshes expose different vertex attribute layouts
    #[error("attribute layout differs at position {position}")]
    AttributeLayout {
        /// First attribute position that differs
        position: usize,
    },
}

/// Errors that abort building one render group
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// Members of one group cannot share merged buffers
    #[error("Structural mismatch: {0}")]
    StructuralMismatch(#[from] Mismatch),

    /// No binding point left for a uniform block purpose
    #[error("Binding pool exhausted for '{purpose}' ({capacity} binding points)")]
    BindingPoolExhausted {
        /// Purpose that could not be bound
        purpose: String,
        /// Size of the pool
        capacity: usize,
    },

    /// A scene resource referenced by a member disappeared
    #[error("Missing {0} for render group member")]
    MissingResource(&'static str),

    /// Group has no members
    #[error("Cannot build an empty render group")]
    EmptyGroup,

    /// Program generation failed for the group's signature
    #[error(transparent)]
    Program(#[from] ProgramError),
}
