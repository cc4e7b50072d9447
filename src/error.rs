//! Error types for the descent-solver library
//!
//! This module provides the main error and result types used throughout the
//! library. All errors use the `thiserror` crate for automatic trait
//! implementations.
//!
//! # Error Hierarchy
//!
//! The library uses a hierarchical error system where:
//! - **`DescentError`** is the top-level error exposed to users via public APIs
//! - **Module errors** (`SolverError`, `LinAlgError`, `LineSearchError`) are
//!   wrapped inside DescentError
//! - **Error sources** are preserved, allowing full error chain inspection

use crate::{linalg::LinAlgError, linesearch::LineSearchError, solver::SolverError};
use thiserror::Error;

/// Main result type used throughout the descent-solver library
pub type DescentResult<T> = Result<T, DescentError>;

/// Main error type for the descent-solver library
///
/// This is the top-level error type exposed by public APIs. It wraps
/// module-specific errors while preserving the full error chain for
/// debugging.
#[derive(Debug, Clone, Error)]
pub enum DescentError {
    /// Iteration driver errors (setup, missing derivatives, backend failure)
    #[error(transparent)]
    Solver(#[from] SolverError),

    /// Linear algebra errors (factorization, singular systems)
    #[error(transparent)]
    LinearAlgebra(#[from] LinAlgError),

    /// Line search errors (invalid parameters, failed bracketing)
    #[error(transparent)]
    LineSearch(#[from] LineSearchError),
}

// Module-specific errors are converted via the #[from] attributes above.
