//! Data structures of the training run.
//!
//! Contains the point-set view, the cell partition that maps every point to
//! its codeword, and the per-codeword utility table that drives the shift
//! refinement.

pub mod cells;
pub mod points;
pub mod utility;
