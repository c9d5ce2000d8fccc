use log::trace;
use rand::RngCore;

use crate::process::partition::{partition, recompute_centroids};
use crate::process::shift::ShiftRefinement;
use crate::process::{DELTA_ERR_MAX, Session, TrainStats, Workspace};
use crate::structs::points::Vectors;

/// Runs Lloyd steps on `points` starting from the session's codebook.
///
/// Each step partitions the points, runs the shift refinement and moves the
/// codewords to their cell means. The loop stops once the error improves by
/// less than [`DELTA_ERR_MAX`] of itself, when it reaches zero, or after
/// `max_steps` steps (at least one step always runs).
pub(crate) fn run<R: RngCore + ?Sized>(
    ws: &mut Workspace,
    session: &mut Session<'_, R>,
    points: Vectors,
    max_steps: usize,
) -> TrainStats {
    let dim = session.dim;
    let num_cb = session.num_cb;
    let numpoints = points.len();

    let mut error = i64::MAX;
    let mut steps = 0;

    loop {
        let last_error = error;
        steps += 1;

        let nearest = &mut session.nearest[..numpoints];

        error = partition(
            points,
            session.codebook,
            nearest,
            &mut ws.cells,
            &mut ws.utility,
        );

        error = ShiftRefinement {
            points,
            codebook: session.codebook,
            nearest: &mut *nearest,
            cells: &mut ws.cells,
            utility: &mut ws.utility,
            scratch: ws.scratch.as_mut_slice(5 * dim),
            sums: ws.sums.as_mut_slice(2 * dim),
            rng: &mut *session.rng,
            error,
        }
        .run();

        recompute_centroids(
            points,
            nearest,
            session.codebook,
            ws.sums.as_mut_slice(num_cb.max(2) * dim),
            ws.sizes.as_mut_slice(num_cb),
        );

        trace!("Lloyd step {steps} over {numpoints} points: error {error}");

        if error == 0 || !improved(last_error, error) {
            return TrainStats {
                steps,
                error,
                converged: true,
            };
        }

        if steps >= max_steps {
            return TrainStats {
                steps,
                error,
                converged: false,
            };
        }
    }
}

#[inline]
fn improved(last_error: i64, error: i64) -> bool {
    last_error.saturating_sub(error) as f64 > DELTA_ERR_MAX * error as f64
}

#[test]
fn improvement_threshold() {
    assert!(improved(i64::MAX, 1_000_000));
    assert!(improved(1000, 900));
    assert!(!improved(1000, 910));
    assert!(!improved(1000, 1000));
    assert!(!improved(1000, 1200));
}
