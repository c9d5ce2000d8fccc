#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! Training alternates two passes over a codebook of `num_cb` codewords:
//!
//! - **Partition**: every point goes to its nearest codeword, building one
//!   cell per codeword and the utility (summed error) of each cell.
//! - **Shift**: codewords whose utility is below the average are moved next
//!   to a high-utility donor picked at random by utility. The donor cell is
//!   split in two, the moved codeword's old points join their next closest
//!   codeword, and the move is undone unless the summed error of the three
//!   cells drops.
//!
//! Codewords then move to the rounded mean of their cell. The loop stops
//! once the error improves by less than [`process::DELTA_ERR_MAX`] of
//! itself, or after the step budget.
//!
//! Large point sets are bootstrapped: an eighth of the points is trained
//! first, recursively, and its codebook seeds the full run.
//!
//! ## Quick Start
//!
//! 1. Create a [`process::train::Trainer`] once, or keep an
//!    `Option<Trainer>` and call [`process::train::train`].
//! 2. Call [`Trainer::train`](process::train::Trainer::train) with the
//!    points, the codebook to fill and a random source.
//! 3. Reuse the context for the next training set; buffers are kept.
//!
//! All arithmetic is integer and deterministic for a given random source.

/// Training stages and the public entry points.
///
/// 1. **Partition** ([`process::partition`]): nearest-codeword assignment.
/// 2. **Shift** ([`process::shift`]): utility-driven codeword moves.
/// 3. **Lloyd loop** ([`process::lloyd`]): iteration until the error settles.
/// 4. **Bootstrap** ([`process::bootstrap`]): starting codebook selection.
/// 5. **Training context** ([`process::train`]): validation and buffer reuse.
pub mod process;

/// Data structures shared by the training stages.
///
/// - **Vectors** ([`structs::points`]): row-major point views
/// - **Cells** ([`structs::cells`]): per-codeword point lists
/// - **Utility** ([`structs::utility`]): per-codeword error and donor table
pub mod structs;

/// Supporting infrastructure.
///
/// - **Distances** ([`utils::distance`]): squared distances and rounded means
/// - **Error Handling** ([`utils::errors`]): error types
/// - **Buffer Management** ([`utils::scratch`]): grow-only scratch buffers
pub mod utils;
