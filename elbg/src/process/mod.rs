use anyhow::Result;

use crate::structs::cells::Cells;
use crate::structs::utility::UtilityTable;
use crate::utils::scratch::ScratchBuffer;

/// Nearest-codeword assignment and centroid recomputation.
///
/// Rebuilds the [`Cells`] partition from scratch and moves every codeword to
/// the rounded mean of its cell.
pub mod partition;

/// Utility-driven codeword shifting, the "ELBG block".
///
/// Moves codewords that contribute little to the error reduction next to
/// codewords that contribute a lot, keeping a move only if it lowers the
/// total error.
pub mod shift;

/// The Lloyd iteration loop.
pub mod lloyd;

/// Starting codebook selection, recursing on subsamples of large point sets.
pub mod bootstrap;

/// The training context and public entry points.
///
/// Provides the [`Trainer`](train::Trainer) and the [`train`](train::train)
/// / [`free`](train::free) lifecycle functions.
pub mod train;

/// Relative error improvement below which the Lloyd loop stops.
pub const DELTA_ERR_MAX: f64 = 0.1;

/// Stride used to scatter sample indices over the point set.
pub const BIG_PRIME: u64 = 433_494_437;

/// Point sets larger than this many points per codeword are bootstrapped
/// from a subsample.
pub const BOOTSTRAP_POINTS_PER_CODEWORD: usize = 24;

/// Upper bound on the two-centroid sub-iterations used to split a donor cell.
pub const SPLIT_MAX_STEPS: usize = 8;

/// Reserved training flags.
///
/// No flag is defined yet; every bit must be zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TrainFlags(u32);

impl TrainFlags {
    pub const NONE: Self = Self(0);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Parameters of one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainParams {
    /// Maximum number of Lloyd steps on the full point set.
    ///
    /// Each bootstrap level below it gets twice the budget of the level
    /// above. Zero behaves like one: at least one step always runs.
    pub max_steps: usize,

    /// Reserved, must be [`TrainFlags::NONE`].
    pub flags: TrainFlags,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            max_steps: 1,
            flags: TrainFlags::NONE,
        }
    }
}

impl TrainParams {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_flags(mut self, flags: TrainFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// Outcome of a Lloyd run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrainStats {
    /// Lloyd steps run on the full point set.
    pub steps: usize,

    /// Total squared error of the last partition pass, after shifting.
    pub error: i64,

    /// `false` when the step budget ended the loop before the error settled.
    pub converged: bool,
}

/// Scratch state shared by every stage, owned by the training context.
#[derive(Debug)]
pub(crate) struct Workspace {
    pub cells: Cells,
    pub utility: UtilityTable,
    pub sizes: ScratchBuffer<usize>,
    pub sums: ScratchBuffer<i64>,
    pub scratch: ScratchBuffer<i32>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self {
            cells: Cells::default(),
            utility: UtilityTable::default(),
            sizes: ScratchBuffer::new("size_part"),
            sums: ScratchBuffer::new("centroid_sums"),
            scratch: ScratchBuffer::new("scratchbuf"),
        }
    }
}

impl Workspace {
    /// Grows every buffer for a run of `num_cb` codewords over `numpoints`
    /// points of `dim` components.
    ///
    /// The sizes do not depend on the bootstrap depth, so one call covers
    /// the whole run including subsample levels.
    pub fn ensure(&mut self, num_cb: usize, numpoints: usize, dim: usize) -> Result<()> {
        self.cells.ensure(num_cb, numpoints)?;
        self.utility.ensure(num_cb)?;
        self.sizes.ensure(num_cb)?;
        self.sums.ensure(num_cb.max(2).saturating_mul(dim))?;
        self.scratch.ensure(dim.saturating_mul(5))?;
        Ok(())
    }

    pub fn release(&mut self) {
        self.cells.release();
        self.utility.release();
        self.sizes.release();
        self.sums.release();
        self.scratch.release();
    }
}

/// Caller-owned buffers borrowed for one training call.
pub(crate) struct Session<'a, R: ?Sized> {
    pub codebook: &'a mut [i32],
    pub nearest: &'a mut [usize],
    pub rng: &'a mut R,
    pub dim: usize,
    pub num_cb: usize,
}
