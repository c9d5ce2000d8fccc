use anyhow::{Result, bail};
use log::trace;
use rand::RngCore;

use crate::process::{BIG_PRIME, BOOTSTRAP_POINTS_PER_CODEWORD, Session, Workspace, lloyd};
use crate::structs::points::Vectors;
use crate::utils::errors::TrainError;

/// Source index of the `i`-th scattered sample out of `numpoints` points.
///
/// Deterministic for a given `numpoints`, and a permutation of
/// `0..numpoints` whenever `numpoints` is not a multiple of [`BIG_PRIME`].
#[inline]
pub fn sample_index(i: usize, numpoints: usize) -> usize {
    ((i as u128 * BIG_PRIME as u128) % numpoints as u128) as usize
}

/// Whether a point set is large enough to be bootstrapped from a subsample.
#[inline]
pub fn needs_subsample(numpoints: usize, num_cb: usize) -> bool {
    numpoints > num_cb.saturating_mul(BOOTSTRAP_POINTS_PER_CODEWORD)
}

/// Number of `i32` values needed by every subsample level together.
///
/// Level `n` holds `numpoints / 8^n` points, so the geometric series stays
/// below `numpoints / 7` points of `dim` values.
pub fn scratch_len(numpoints: usize, dim: usize) -> Result<usize> {
    let limit = isize::MAX as usize / size_of::<i32>();

    match (numpoints / 7).checked_mul(dim) {
        Some(len) if len <= limit => Ok(len),
        _ => bail!(TrainError::SizeOverflow { numpoints, dim }),
    }
}

/// Fills the session's codebook with a starting point for training.
///
/// Small point sets get `num_cb` scattered points copied as-is. Large ones
/// are subsampled to one eighth into `temp`, the subsample is initialised
/// recursively and trained with twice the step budget, and its codebook is
/// kept. `temp` must hold [`scratch_len`] values.
pub(crate) fn init_codebook<R: RngCore + ?Sized>(
    ws: &mut Workspace,
    session: &mut Session<'_, R>,
    points: Vectors,
    temp: &mut [i32],
    max_steps: usize,
) {
    let dim = session.dim;
    let numpoints = points.len();

    if needs_subsample(numpoints, session.num_cb) {
        let count = numpoints / 8;
        let (sample, rest) = temp.split_at_mut(count * dim);

        for (i, dst) in sample.chunks_exact_mut(dim).enumerate() {
            dst.copy_from_slice(points.get(sample_index(i, numpoints)));
        }

        let sample = Vectors::new(sample, dim);
        let steps = max_steps.saturating_mul(2);

        init_codebook(ws, session, sample, rest, steps);
        let stats = lloyd::run(ws, session, sample, steps);

        trace!(
            "Bootstrapped from {count} of {numpoints} points: {} steps, error {}",
            stats.steps, stats.error
        );
    } else {
        for (i, codeword) in session.codebook.chunks_exact_mut(dim).enumerate() {
            codeword.copy_from_slice(points.get(sample_index(i, numpoints)));
        }
    }
}
