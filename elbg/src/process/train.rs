use anyhow::{Result, bail};
use log::debug;
use rand::RngCore;

use crate::process::bootstrap::{self, needs_subsample, scratch_len};
use crate::process::{Session, TrainParams, TrainStats, Workspace, lloyd};
use crate::structs::points::Vectors;
use crate::utils::errors::TrainError;
use crate::utils::scratch::ScratchBuffer;

/// A reusable ELBG training context.
///
/// Owns every scratch buffer a training run needs and keeps them between
/// runs: buffers grow to the largest request seen and are only freed by
/// [`release`](Self::release) or by dropping the context. Creating one is
/// free; nothing is allocated before the first run.
///
/// One context serves one run at a time. Train in parallel with one
/// context per thread.
///
/// # Example
///
/// ```rust
/// use elbg::process::TrainParams;
/// use elbg::process::train::Trainer;
/// use rand::SeedableRng;
/// use rand::rngs::StdRng;
///
/// let points = [0, 0, 1, 1, 100, 100, 101, 99];
/// let mut codebook = [0; 4];
/// let mut nearest = [0; 4];
/// let mut rng = StdRng::seed_from_u64(1);
///
/// let mut trainer = Trainer::new();
/// let params = TrainParams::default().with_max_steps(4);
/// trainer.train(&points, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
///
/// assert_eq!(nearest[0], nearest[1]);
/// assert_ne!(nearest[0], nearest[2]);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug)]
pub struct Trainer {
    workspace: Workspace,
    temp_points: ScratchBuffer<i32>,
    runs: usize,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            workspace: Workspace::default(),
            temp_points: ScratchBuffer::new("temp_points"),
            runs: 0,
        }
    }
}

/// Sizes of one call, derived from the caller's buffers.
#[derive(Debug, Clone, Copy)]
struct Shape {
    dim: usize,
    numpoints: usize,
    num_cb: usize,
}

impl Shape {
    fn validate(
        points: &[i32],
        dim: usize,
        codebook: &[i32],
        nearest: &[usize],
        params: &TrainParams,
    ) -> Result<Self> {
        if !params.flags.is_empty() {
            bail!(TrainError::ReservedFlags(params.flags.bits()));
        }
        if dim == 0 {
            bail!(TrainError::ZeroDimension);
        }
        if points.len() % dim != 0 {
            bail!(TrainError::RaggedPoints {
                len: points.len(),
                dim,
            });
        }
        if codebook.len() % dim != 0 {
            bail!(TrainError::RaggedCodebook {
                len: codebook.len(),
                dim,
            });
        }

        let numpoints = points.len() / dim;
        let num_cb = codebook.len() / dim;

        if numpoints == 0 {
            bail!(TrainError::NoPoints);
        }
        if num_cb == 0 {
            bail!(TrainError::EmptyCodebook);
        }
        if nearest.len() < numpoints {
            bail!(TrainError::NearestTooShort {
                len: nearest.len(),
                numpoints,
            });
        }

        Ok(Self {
            dim,
            numpoints,
            num_cb,
        })
    }
}

impl Trainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trains `codebook` on `points`.
    ///
    /// `points` holds `numpoints * dim` values and `codebook` `num_cb * dim`
    /// values, both row-major. The codebook is initialised from the points,
    /// refined, and written in place; `nearest[i]` receives the codeword of
    /// point `i`. `rng` drives the weighted donor choice of the shift
    /// refinement and advances on every draw.
    ///
    /// On error the contents of `codebook` and `nearest` are unspecified.
    pub fn train<R: RngCore + ?Sized>(
        &mut self,
        points: &[i32],
        dim: usize,
        codebook: &mut [i32],
        nearest: &mut [usize],
        params: &TrainParams,
        rng: &mut R,
    ) -> Result<TrainStats> {
        let shape = Shape::validate(points, dim, codebook, nearest, params)?;
        let temp_len = self.prepare(shape)?;

        let points = Vectors::new(points, dim);
        let mut session = Session {
            codebook,
            nearest,
            rng,
            dim,
            num_cb: shape.num_cb,
        };

        bootstrap::init_codebook(
            &mut self.workspace,
            &mut session,
            points,
            self.temp_points.as_mut_slice(temp_len),
            params.max_steps,
        );
        let stats = lloyd::run(&mut self.workspace, &mut session, points, params.max_steps);

        self.finish(shape, &stats);
        Ok(stats)
    }

    /// Fills `codebook` with a starting codebook for `points` without
    /// running the final Lloyd loop on the full set.
    ///
    /// Together with [`refine`](Self::refine) this splits [`train`](Self::train)
    /// in two, for callers that adjust the starting codebook in between.
    pub fn init_codebook<R: RngCore + ?Sized>(
        &mut self,
        points: &[i32],
        dim: usize,
        codebook: &mut [i32],
        nearest: &mut [usize],
        params: &TrainParams,
        rng: &mut R,
    ) -> Result<()> {
        let shape = Shape::validate(points, dim, codebook, nearest, params)?;
        let temp_len = self.prepare(shape)?;

        let mut session = Session {
            codebook,
            nearest,
            rng,
            dim,
            num_cb: shape.num_cb,
        };

        bootstrap::init_codebook(
            &mut self.workspace,
            &mut session,
            Vectors::new(points, dim),
            self.temp_points.as_mut_slice(temp_len),
            params.max_steps,
        );

        Ok(())
    }

    /// Runs the Lloyd loop with shift refinement from the codebook as given.
    pub fn refine<R: RngCore + ?Sized>(
        &mut self,
        points: &[i32],
        dim: usize,
        codebook: &mut [i32],
        nearest: &mut [usize],
        params: &TrainParams,
        rng: &mut R,
    ) -> Result<TrainStats> {
        let shape = Shape::validate(points, dim, codebook, nearest, params)?;
        self.workspace
            .ensure(shape.num_cb, shape.numpoints, shape.dim)?;

        let mut session = Session {
            codebook,
            nearest,
            rng,
            dim,
            num_cb: shape.num_cb,
        };

        let stats = lloyd::run(
            &mut self.workspace,
            &mut session,
            Vectors::new(points, dim),
            params.max_steps,
        );

        self.finish(shape, &stats);
        Ok(stats)
    }

    /// Frees every buffer. The context stays usable and reallocates on the
    /// next run.
    pub fn release(&mut self) {
        self.workspace.release();
        self.temp_points.release();
    }

    /// Number of successful training runs on this context.
    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Grows the buffers for `shape` and returns the bootstrap scratch length.
    fn prepare(&mut self, shape: Shape) -> Result<usize> {
        let temp_len = if needs_subsample(shape.numpoints, shape.num_cb) {
            scratch_len(shape.numpoints, shape.dim)?
        } else {
            0
        };

        self.workspace
            .ensure(shape.num_cb, shape.numpoints, shape.dim)?;
        self.temp_points.ensure(temp_len)?;

        Ok(temp_len)
    }

    fn finish(&mut self, shape: Shape, stats: &TrainStats) {
        self.runs += 1;
        debug!(
            "Trained {} codewords on {} points of dim {}: {} steps, error {}{}",
            shape.num_cb,
            shape.numpoints,
            shape.dim,
            stats.steps,
            stats.error,
            if stats.converged { "" } else { " (step budget exhausted)" }
        );
    }
}

/// Trains with a lazily created context.
///
/// Creates the [`Trainer`] in `ctx` on first use and reuses it afterwards,
/// so encoders can keep one `Option<Trainer>` around and call this every
/// frame.
pub fn train<R: RngCore + ?Sized>(
    ctx: &mut Option<Trainer>,
    points: &[i32],
    dim: usize,
    codebook: &mut [i32],
    nearest: &mut [usize],
    params: &TrainParams,
    rng: &mut R,
) -> Result<TrainStats> {
    ctx.get_or_insert_with(Trainer::new)
        .train(points, dim, codebook, nearest, params, rng)
}

/// Tears down the context in `ctx`, freeing all of its buffers.
pub fn free(ctx: &mut Option<Trainer>) {
    if let Some(mut trainer) = ctx.take() {
        trainer.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::TrainFlags;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn grid(n: usize) -> Vec<i32> {
        (0..n as i32).flat_map(|i| [i % 17, i / 17]).collect()
    }

    #[test]
    fn buffers_grow_and_are_reused() -> Result<()> {
        let mut trainer = Trainer::new();
        let mut rng = StdRng::seed_from_u64(5);
        let params = TrainParams::default().with_max_steps(3);

        let small = grid(300);
        let mut codebook = vec![0; 8 * 2];
        let mut nearest = vec![0; 300];
        trainer.train(&small, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
        let temp_after_small = trainer.temp_points.allocated();
        assert_eq!(temp_after_small, 300 / 7 * 2);

        let large = grid(1000);
        let mut nearest = vec![0; 1000];
        trainer.train(&large, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
        assert_eq!(trainer.temp_points.allocated(), 1000 / 7 * 2);

        // a smaller run afterwards keeps the larger buffers
        let mut nearest = vec![0; 300];
        trainer.train(&small, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
        assert_eq!(trainer.temp_points.allocated(), 1000 / 7 * 2);
        assert_eq!(trainer.runs(), 3);

        trainer.release();
        assert_eq!(trainer.temp_points.allocated(), 0);
        Ok(())
    }

    fn expect_err(result: Result<TrainStats>, expected: TrainError) {
        let err = result.unwrap_err();
        assert_eq!(err.downcast_ref::<TrainError>(), Some(&expected));
    }

    #[test]
    fn invalid_arguments() {
        let mut trainer = Trainer::new();
        let mut rng = StdRng::seed_from_u64(0);
        let points = [1, 2, 3, 4, 5, 6];
        let mut codebook = [0; 4];
        let mut nearest = [0; 3];
        let params = TrainParams::default();

        expect_err(
            trainer.train(&points, 0, &mut codebook, &mut nearest, &params, &mut rng),
            TrainError::ZeroDimension,
        );
        expect_err(
            trainer.train(&points, 4, &mut codebook, &mut nearest, &params, &mut rng),
            TrainError::RaggedPoints { len: 6, dim: 4 },
        );
        expect_err(
            trainer.train(&points, 3, &mut codebook, &mut nearest, &params, &mut rng),
            TrainError::RaggedCodebook { len: 4, dim: 3 },
        );
        expect_err(
            trainer.train(&[], 2, &mut codebook, &mut nearest, &params, &mut rng),
            TrainError::NoPoints,
        );
        expect_err(
            trainer.train(&points, 2, &mut [], &mut nearest, &params, &mut rng),
            TrainError::EmptyCodebook,
        );
        expect_err(
            trainer.train(&points, 2, &mut codebook, &mut nearest[..2], &params, &mut rng),
            TrainError::NearestTooShort {
                len: 2,
                numpoints: 3,
            },
        );
        expect_err(
            trainer.refine(
                &points,
                2,
                &mut codebook,
                &mut nearest,
                &params.with_flags(TrainFlags::from_bits(0x4)),
                &mut rng,
            ),
            TrainError::ReservedFlags(0x4),
        );
        assert_eq!(trainer.runs(), 0);
    }

    #[test]
    fn lazy_context_lifecycle() -> Result<()> {
        let mut ctx = None;
        let mut rng = StdRng::seed_from_u64(9);
        let points = grid(40);
        let mut codebook = vec![0; 4 * 2];
        let mut nearest = vec![0; 40];

        let params = TrainParams::default();

        train(&mut ctx, &points, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
        assert_eq!(ctx.as_ref().map(Trainer::runs), Some(1));

        train(&mut ctx, &points, 2, &mut codebook, &mut nearest, &params, &mut rng)?;
        assert_eq!(ctx.as_ref().map(Trainer::runs), Some(2));

        free(&mut ctx);
        assert!(ctx.is_none());
        Ok(())
    }
}
