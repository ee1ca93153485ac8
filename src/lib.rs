//! Remezclar - Corpus-Driven Program Remixing
//!
//! Remezclar harvests syntax fragments from a corpus of real Python programs
//! and recombines them into new programs derived from a seed program. Every
//! substitution swaps a node for a harvested node of the same kind and is
//! validated against the scope live at that point of the rewrite, so the
//! output stays parseable and scope-correct by construction.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       REMEZCLAR CORE                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Parser    →   Harvest    →   Sampler   →   Transformer     │
//! │  .py files     Inventory      ConceptBag    Scoped rewrite  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use remezclar::corpus;
//! use remezclar::generate::Generator;
//!
//! // Load and harvest a corpus of Python sources
//! let report = corpus::load(std::path::Path::new("corpus/")).unwrap();
//! let inventory = report.harvest();
//!
//! // Remix a harvested program, deterministically for the seed
//! let mut generator = Generator::new(&inventory, 42);
//! let seed_tree = generator.draw_module().unwrap();
//! let source = generator.generate_source(&seed_tree).unwrap();
//! println!("{source}");
//! ```
//!
//! # Modules
//!
//! - [`ast`] - The closed node enumeration and its field reflection
//! - [`parser`] - Indentation-aware parsing of the supported subset
//! - [`corpus`] - Corpus discovery and skip-and-record loading
//! - [`harvest`] - Per-kind, per-field inventories
//! - [`sampler`] - Shuffled, exhaustive, seeded candidate drawing
//! - [`scope`] - Scope frames and coarse type tags
//! - [`transform`] - The scope-aware randomizing rewrite
//! - [`guard`] - Structural acyclicity checking
//! - [`emit`] - Printing trees back to source text
//! - [`generate`] - Retrying end-to-end generation

#![forbid(unsafe_code)]

pub mod ast;
pub mod corpus;
pub mod emit;
pub mod error;
pub mod extract;
pub mod generate;
pub mod guard;
pub mod harvest;
pub mod parser;
pub mod sampler;
pub mod scope;
pub mod transform;

pub use ast::{Node, NodeKind};
pub use error::{Error, Result};
pub use generate::{remix, Generator};
pub use harvest::Inventory;
pub use sampler::ConceptBag;
pub use scope::{ScopeStack, TypeTag};
pub use transform::{Diagnostics, Transformer};
