//! Error types for Remezclar
//!
//! This module defines the error types used throughout the library.

use thiserror::Error;

/// Result type alias for Remezclar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during Remezclar operations
#[derive(Error, Debug)]
pub enum Error {
    /// A source file failed to parse
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// 1-based source line of the offending token
        line: usize,
        /// What the parser expected or found
        message: String,
    },

    /// Printing exceeded the recursion ceiling, which means the tree is
    /// suspected to contain a cycle that escaped validation
    #[error("unparse recursion limit {limit} exceeded, tree suspected cyclic")]
    UnparseDepth {
        /// The configured recursion ceiling
        limit: usize,
    },

    /// Every retry of a generation produced an unprintable tree
    #[error("generation failed after {attempts} attempts")]
    GenerationExhausted {
        /// Number of full generation attempts made
        attempts: usize,
    },

    /// No corpus file parsed successfully, nothing can be harvested
    #[error("corpus contains no parseable programs")]
    EmptyCorpus,

    /// A comprehension binds through a target form the scope rules do not
    /// model (nesting beyond one destructuring level)
    #[error("unsupported comprehension binding target: {0}")]
    ComprehensionTarget(String),

    /// An inventory row did not reassemble into a node of its own kind
    #[error("inventory row mismatch while rebuilding {kind:?}")]
    Reconstruction {
        /// Kind whose field row failed to reassemble
        kind: crate::ast::NodeKind,
    },

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
