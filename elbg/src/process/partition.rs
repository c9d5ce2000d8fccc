use crate::structs::cells::Cells;
use crate::structs::points::Vectors;
use crate::structs::utility::UtilityTable;
use crate::utils::distance::{accumulate, distance, distance_limited, write_mean};

/// Finds the codeword closest to `point`.
///
/// Returns `(index, squared distance)`. Ties go to the lowest index.
pub fn nearest_codeword(point: &[i32], codebook: &[i32], dim: usize) -> (usize, i32) {
    nearest_from(point, codebook, dim, 0)
}

/// Nearest-codeword search seeded with a likely winner.
///
/// The distance to `hint` bounds every other distance computation, so a
/// good hint lets most candidates exit after a few components.
#[inline]
fn nearest_from(point: &[i32], codebook: &[i32], dim: usize, hint: usize) -> (usize, i32) {
    let mut best_idx = hint;
    let mut best_dist = distance(point, &codebook[hint * dim..(hint + 1) * dim]);

    for (k, codeword) in codebook.chunks_exact(dim).enumerate() {
        if k == best_idx {
            continue;
        }
        // one past the best, so that equal distances come back exact
        let dist = distance_limited(point, codeword, best_dist.saturating_add(1));
        if dist < best_dist || (dist == best_dist && k < best_idx) {
            best_idx = k;
            best_dist = dist;
        }
    }

    (best_idx, best_dist)
}

/// Assigns every point to its nearest codeword.
///
/// Rebuilds `cells` from empty, resets and accumulates `utility`, writes
/// `nearest[i]` for every point and returns the total error. All sums
/// saturate at `i64::MAX`.
pub fn partition(
    points: Vectors,
    codebook: &[i32],
    nearest: &mut [usize],
    cells: &mut Cells,
    utility: &mut UtilityTable,
) -> i64 {
    let dim = points.dim();
    let num_cb = codebook.len() / dim;

    cells.clear(num_cb);
    utility.reset(num_cb);

    let mut error = 0i64;
    let mut hint = 0;

    for (i, point) in points.iter().enumerate() {
        let (best, dist) = nearest_from(point, codebook, dim, hint);
        hint = best;

        nearest[i] = best;
        error = error.saturating_add(dist as i64);
        utility.add(best, dist as i64);
        cells.push(best, i);
    }

    error
}

/// Moves every codeword to the rounded mean of the points assigned to it.
///
/// Codewords without points keep their position. `sums` must hold
/// `num_cb * dim` values and `sizes` `num_cb` values.
pub fn recompute_centroids(
    points: Vectors,
    nearest: &[usize],
    codebook: &mut [i32],
    sums: &mut [i64],
    sizes: &mut [usize],
) {
    let dim = points.dim();
    let num_cb = codebook.len() / dim;
    let sums = &mut sums[..num_cb * dim];
    let sizes = &mut sizes[..num_cb];

    sums.fill(0);
    sizes.fill(0);

    for (point, &k) in points.iter().zip(nearest) {
        sizes[k] += 1;
        accumulate(&mut sums[k * dim..(k + 1) * dim], point);
    }

    for ((codeword, sum), &size) in codebook
        .chunks_exact_mut(dim)
        .zip(sums.chunks_exact(dim))
        .zip(sizes.iter())
    {
        write_mean(codeword, sum, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use proptest::prelude::*;

    struct Fixture {
        cells: Cells,
        utility: UtilityTable,
        nearest: Vec<usize>,
    }

    impl Fixture {
        fn new(num_cb: usize, numpoints: usize) -> Result<Self> {
            let mut cells = Cells::default();
            cells.ensure(num_cb, numpoints)?;
            let mut utility = UtilityTable::default();
            utility.ensure(num_cb)?;
            Ok(Self {
                cells,
                utility,
                nearest: vec![0; numpoints],
            })
        }
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let codebook = [5, 5, 0, 0, 0, 0];
        assert_eq!(nearest_codeword(&[0, 0], &codebook, 2), (1, 0));
        assert_eq!(nearest_codeword(&[3, 3], &codebook, 2), (0, 8));

        // a hint pointing at the higher duplicate must not win the tie
        assert_eq!(nearest_from(&[1, 1], &codebook, 2, 2), (1, 2));
    }

    #[test]
    fn assigns_and_accumulates() -> Result<()> {
        let points = [0, 0, 1, 0, 10, 10, 9, 11];
        let codebook = [0, 0, 10, 10];
        let mut f = Fixture::new(2, 4)?;

        let error = partition(
            Vectors::new(&points, 2),
            &codebook,
            &mut f.nearest,
            &mut f.cells,
            &mut f.utility,
        );
        assert_eq!(f.nearest, [0, 0, 1, 1]);
        assert_eq!(error, 3);
        assert_eq!(f.utility.as_slice(), [1, 2]);
        assert_eq!(f.cells.len(0), 2);
        assert_eq!(f.cells.len(1), 2);
        Ok(())
    }

    #[test]
    fn centroids_round_and_skip_empty_cells() {
        let points = [0, 0, 1, 1, 1, 2, -3, -4, -4, -4];
        let nearest = [0, 0, 0, 2, 2];
        let mut codebook = [9, 9, 42, -42, 0, 0];
        let mut sums = [0i64; 6];
        let mut sizes = [0usize; 3];

        recompute_centroids(
            Vectors::new(&points, 2),
            &nearest,
            &mut codebook,
            &mut sums,
            &mut sizes,
        );
        // (0+1+1)/3 rounds to 1, (0+1+2)/3 = 1, (-3-4)/2 rounds away to -4
        assert_eq!(codebook, [1, 1, 42, -42, -4, -4]);
        assert_eq!(sizes, [3, 0, 2]);
    }

    proptest! {
        #[test]
        fn partition_covers_every_point_once(
            (dim, num_cb, data, codebook) in (1usize..5, 1usize..8).prop_flat_map(|(dim, num_cb)| (
                Just(dim),
                Just(num_cb),
                prop::collection::vec(-1000i32..1000, dim..dim * 64),
                prop::collection::vec(-1000i32..1000, dim * num_cb),
            ))
        ) {
            let points = Vectors::new(&data, dim);
            let numpoints = points.len();
            let mut f = Fixture::new(num_cb, numpoints).unwrap();

            let error = partition(points, &codebook, &mut f.nearest, &mut f.cells, &mut f.utility);

            let mut seen = vec![0usize; numpoints];
            for k in 0..num_cb {
                for i in f.cells.iter(k) {
                    seen[i] += 1;
                    prop_assert_eq!(f.nearest[i], k);
                }
            }
            prop_assert!(seen.iter().all(|&n| n == 1));
            prop_assert_eq!((0..num_cb).map(|k| f.cells.len(k)).sum::<usize>(), numpoints);
            prop_assert_eq!(f.utility.total(), error);

            for (i, point) in points.iter().enumerate() {
                let chosen = distance(point, &codebook[f.nearest[i] * dim..][..dim]);
                for codeword in codebook.chunks_exact(dim) {
                    prop_assert!(chosen <= distance(point, codeword));
                }
            }
        }
    }
}
