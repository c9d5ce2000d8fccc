//! Utility functions and supporting infrastructure.
//!
//! Provides the bounded distance and rounding primitives, grow-only scratch
//! buffers, and error types used by the training pipeline.

pub mod distance;
pub mod errors;
pub mod scratch;
