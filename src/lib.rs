//! # Descent Solver
//!
//! A Rust library for iterative solution of nonlinear systems and smooth
//! unconstrained minimization problems.
//!
//! ## Features
//!
//! - **Newton and Quasi-Newton Iteration**: root finding for `F(x) = 0` with
//!   exact Jacobians or a configurable refactorization interval
//! - **Line Search Family**: static, backtracking (Armijo/Wolfe), bisection,
//!   quadratic interpolation, and Bierlaire three-point quadratic step-length
//!   controllers behind a single dispatch type
//! - **Quasi-Newton Hessian Approximations**: BFGS and DFP rank-2 inverse
//!   Hessian updates for minimization without second derivatives
//! - **Dog Leg Trust Region**: Powell-style blend of the Cauchy and
//!   Gauss-Newton steps for untrustworthy Newton directions
//! - **Dense Linear Algebra Backend**: partial-pivoting LU factorization
//!   built on the faer linear algebra library
//!
//! ## Solver Types
//!
//! - **NewtonSolver**: drives a vector residual to zero via linearization
//! - **Optimizer**: minimizes a scalar objective with exact or approximate
//!   Hessians plus a line search
//! - **DogLegSolver**: trust region method combining Gauss-Newton and
//!   steepest descent
//!
//! ## Example
//!
//! ```no_run
//! use descent_solver::problem::Residual;
//! use descent_solver::solver::newton::NewtonSolver;
//! use descent_solver::options::SolverOptions;
//! use nalgebra::{dvector, DMatrix, DVector};
//!
//! struct Parabola;
//!
//! impl Residual for Parabola {
//!     fn dim(&self) -> usize {
//!         1
//!     }
//!     fn evaluate(&self, x: &DVector<f64>) -> DVector<f64> {
//!         dvector![x[0] * x[0] - 1.0]
//!     }
//!     fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
//!         DMatrix::from_element(1, 1, 2.0 * x[0])
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = SolverOptions::new().with_max_iterations(50);
//! let mut solver = NewtonSolver::with_options(options);
//! let result = solver.solve(&Parabola, &dvector![-3.0])?;
//! assert!(result.status.is_converged());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod linalg;
pub mod linesearch;
pub mod logger;
pub mod options;
pub mod problem;
pub mod quasi_newton;
pub mod solver;

pub use error::{DescentError, DescentResult};

pub use linalg::{DenseLinearSolver, DenseLuSolver, LinearSolverType};

pub use linesearch::{
    CurvatureKind, LineFunction, LineSearch, LineSearchConfig, LineSearchKind, LineSearchOutcome,
};

pub use logger::{init_logger, init_logger_with_level};

pub use options::SolverOptions;

pub use problem::{Objective, Residual};

pub use quasi_newton::{HessianKind, InverseHessian};

pub use solver::{
    dogleg::DogLegSolver, newton::NewtonSolver, optimizer::Optimizer, SolveStatus, SolverResult,
};
