use log::trace;
use rand::RngCore;

use crate::process::SPLIT_MAX_STEPS;
use crate::structs::cells::Cells;
use crate::structs::points::Vectors;
use crate::structs::utility::UtilityTable;
use crate::utils::distance::{accumulate, distance, distance_limited, write_mean};

/// One pass of the ELBG block over a freshly built partition.
///
/// Every low-utility codeword `k` is tried once: a donor `h` is drawn by
/// utility, `c` is the codeword nearest to `k`, and the move "merge `k`
/// into `c`, split `h` in two and hand one half to `k`" is kept only if
/// it strictly lowers the summed error of the three cells.
///
/// Codeword positions are not touched; the following centroid pass moves
/// them to the new cells.
pub struct ShiftRefinement<'a, R: ?Sized> {
    pub points: Vectors<'a>,
    pub codebook: &'a [i32],
    pub nearest: &'a mut [usize],
    pub cells: &'a mut Cells,
    pub utility: &'a mut UtilityTable,
    /// At least `5 * dim` values.
    pub scratch: &'a mut [i32],
    /// At least `2 * dim` values.
    pub sums: &'a mut [i64],
    pub rng: &'a mut R,
    pub error: i64,
}

/// The three codewords involved in one shift attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Low-utility codeword that gets moved.
    pub low: usize,
    /// High-utility donor whose cell is split.
    pub high: usize,
    /// Codeword nearest to `low`, absorbing its points.
    pub closest: usize,
}

impl<R: RngCore + ?Sized> ShiftRefinement<'_, R> {
    /// Runs the pass and returns the updated total error.
    pub fn run(mut self) -> i64 {
        let num_cb = self.utility.len();
        let dim = self.points.dim();
        let mut accepted = 0usize;

        self.utility.evaluate_increments(self.error);

        for low in 0..num_cb {
            if !self.utility.is_low(low, self.error) {
                continue;
            }

            let Some(high) = self.utility.pick_weighted(self.rng) else {
                break;
            };
            let closest = closest_codeword(self.codebook, dim, low);

            if high == low || closest == low || high == closest {
                continue;
            }

            if self.try_shift(Candidate { low, high, closest }) {
                accepted += 1;
            }
        }

        if accepted > 0 {
            trace!("Accepted {accepted} codeword shifts, error now {}", self.error);
        }

        self.error
    }

    /// Evaluates one candidate and applies it when it lowers the error.
    pub fn try_shift(&mut self, c: Candidate) -> bool {
        let dim = self.points.dim();
        let points = self.points;

        if self.cells.is_empty(c.high) {
            return false;
        }

        let old_error = self
            .utility
            .get(c.low)
            .saturating_add(self.utility.get(c.high))
            .saturating_add(self.utility.get(c.closest));

        let (proposals, rest) = self.scratch[..5 * dim].split_at_mut(2 * dim);
        let (merged, previous) = rest.split_at_mut(dim);
        let sums = &mut self.sums[..2 * dim];

        // low and closest merged into one cell around their common mean
        merged.copy_from_slice(&self.codebook[c.closest * dim..(c.closest + 1) * dim]);
        let merged_sums = &mut sums[..dim];
        merged_sums.fill(0);
        let mut count = 0;
        for i in self.cells.iter(c.low).chain(self.cells.iter(c.closest)) {
            accumulate(merged_sums, points.get(i));
            count += 1;
        }
        write_mean(merged, merged_sums, count);

        let merged_error = cell_error(points, self.cells, c.low, merged)
            .saturating_add(cell_error(points, self.cells, c.closest, merged));

        trisect_bounding_box(points, self.cells, c.high, proposals);
        let [low_error, high_error] =
            split_cell(points, self.cells, c.high, proposals, previous, sums);

        let new_error = merged_error
            .saturating_add(low_error)
            .saturating_add(high_error);

        if new_error >= old_error {
            return false;
        }

        let (first, second) = proposals.split_at(dim);
        self.cells.append(c.closest, c.low);
        self.cells.split(c.high, c.low, c.high, |i| {
            closer_to_second(points.get(i), first, second)
        });

        self.error = self
            .error
            .saturating_sub(old_error)
            .saturating_add(new_error);

        for (cell, utility) in [
            (c.low, low_error),
            (c.high, high_error),
            (c.closest, merged_error),
        ] {
            self.utility.set(cell, utility);
            for i in self.cells.iter(cell) {
                self.nearest[i] = cell;
            }
        }

        self.utility.evaluate_increments(self.error);

        true
    }
}

/// Codeword nearest to codeword `index`, excluding itself.
///
/// Returns `index` itself only when there is nothing else to pick
/// (a single codeword, or every other one saturating the distance).
pub fn closest_codeword(codebook: &[i32], dim: usize, index: usize) -> usize {
    let target = &codebook[index * dim..(index + 1) * dim];
    let mut pick = index;
    let mut diff_min = i32::MAX;

    for (k, codeword) in codebook.chunks_exact(dim).enumerate() {
        if k == index {
            continue;
        }
        let diff = distance_limited(codeword, target, diff_min);
        if diff < diff_min {
            pick = k;
            diff_min = diff;
        }
    }

    pick
}

/// Ties stay with the first centroid.
#[inline]
fn closer_to_second(point: &[i32], first: &[i32], second: &[i32]) -> bool {
    distance(point, second) < distance(point, first)
}

/// Summed squared distance of the points of `cell` to `centroid`.
fn cell_error(points: Vectors, cells: &Cells, cell: usize, centroid: &[i32]) -> i64 {
    cells.iter(cell).fold(0i64, |acc, i| {
        acc.saturating_add(distance(centroid, points.get(i)) as i64)
    })
}

/// Writes the 1/3 and 2/3 points of the bounding box of `cell` into the
/// two halves of `proposals`.
fn trisect_bounding_box(points: Vectors, cells: &Cells, cell: usize, proposals: &mut [i32]) {
    let dim = points.dim();
    let (first, second) = proposals.split_at_mut(dim);

    first.fill(i32::MAX);
    second.fill(i32::MIN);

    for i in cells.iter(cell) {
        for ((lo, hi), &v) in first.iter_mut().zip(second.iter_mut()).zip(points.get(i)) {
            *lo = (*lo).min(v);
            *hi = (*hi).max(v);
        }
    }

    for (lo, hi) in first.iter_mut().zip(second.iter_mut()) {
        let min = *lo as i64;
        let span = *hi as i64 - min;
        *lo = (min + span / 3) as i32;
        *hi = (min + 2 * span / 3) as i32;
    }
}

/// Two-centroid Lloyd iteration over the points of `cell`.
///
/// Refines the two halves of `proposals` until they stop moving or
/// [`SPLIT_MAX_STEPS`] is reached, then returns the error of each half
/// when every point goes to the nearer proposal.
fn split_cell(
    points: Vectors,
    cells: &Cells,
    cell: usize,
    proposals: &mut [i32],
    previous: &mut [i32],
    sums: &mut [i64],
) -> [i64; 2] {
    let dim = points.dim();

    for _ in 0..SPLIT_MAX_STEPS {
        sums.fill(0);
        let mut counts = [0usize; 2];

        {
            let (first, second) = proposals.split_at(dim);
            for i in cells.iter(cell) {
                let point = points.get(i);
                let side = closer_to_second(point, first, second) as usize;
                counts[side] += 1;
                accumulate(&mut sums[side * dim..(side + 1) * dim], point);
            }
        }

        previous.copy_from_slice(proposals);
        for (side, proposal) in proposals.chunks_exact_mut(dim).enumerate() {
            write_mean(proposal, &sums[side * dim..(side + 1) * dim], counts[side]);
        }

        if *previous == *proposals {
            break;
        }
    }

    let (first, second) = proposals.split_at(dim);
    let mut errors = [0i64; 2];
    for i in cells.iter(cell) {
        let point = points.get(i);
        let d = [distance(point, first), distance(point, second)];
        let side = (d[1] < d[0]) as usize;
        errors[side] = errors[side].saturating_add(d[side] as i64);
    }

    errors
}
