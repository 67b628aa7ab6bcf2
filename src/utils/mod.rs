//! Common utilities for building test problems.
//!
//! - **`generators`**: Synthetic sparse SPD matrices with closed-form spectra (diagonal
//!   matrices and the shifted 2-D Laplacian), used by the tests and the experiment binary.
//!
//! - **`matrix_market`**: Reads `.mtx` coordinate files, so the estimator can be run on
//!   matrices from external collections.

pub mod generators;
pub mod matrix_market;
