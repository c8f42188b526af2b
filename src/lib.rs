//! Assembly of small matrix-multiplication kernels for ADER-DG solvers.
//!
//! Matrices are described by a [`MatrixDescriptor`](matrix::MatrixDescriptor) and collected
//! in a [`MatrixRegistry`](registry::MatrixRegistry). Kernels are built from registry
//! names with an [`ExpressionBuilder`](expression::ExpressionBuilder), decomposed into
//! structurally nonzero blocks and appended to a [`KernelCatalog`](kernel::KernelCatalog).
//! The finished registry and catalog are handed to a code generator as a
//! [`KernelLibrary`](backend::KernelLibrary).
pub mod arch;
pub mod backend;
pub mod blocks;
pub mod config;
pub mod derivative;
pub mod error;
pub mod expression;
pub mod global_ids;
pub mod io;
pub mod kernel;
pub mod matrix;
pub mod registry;
pub mod seissol;

#[cfg(feature = "proptest-support")]
pub mod proptest;

pub extern crate adergen_sparse;
pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::{KernelError, Result};
