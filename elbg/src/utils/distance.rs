//! Distance and rounding primitives.
//!
//! Every squared distance in the trainer goes through [`distance_limited`],
//! which bails out as soon as the running sum can no longer beat `limit`.
//! Error sums are `i64` and clamp at `i64::MAX` instead of wrapping.

/// Squared euclidean distance between `a` and `b`, bounded by `limit`.
///
/// Each per-component term is computed in 64 bits. Returns the exact
/// distance when it is below `limit`, and exactly `limit` as soon as the
/// partial sum reaches or exceeds it.
#[inline]
pub fn distance_limited(a: &[i32], b: &[i32], limit: i32) -> i32 {
    let bound = limit.max(0) as u64;
    let mut dist: u64 = 0;

    for (&x, &y) in a.iter().zip(b) {
        // |x - y| < 2^32, so the square fits in a u64
        let diff = (x as i64 - y as i64).unsigned_abs();
        let term = diff * diff;
        if term >= bound - dist {
            return limit;
        }
        dist += term;
    }

    dist as i32
}

/// Unbounded variant of [`distance_limited`], saturating at `i32::MAX`.
#[inline]
pub fn distance(a: &[i32], b: &[i32]) -> i32 {
    distance_limited(a, b, i32::MAX)
}

/// Integer division rounding half away from zero.
///
/// `count` must be positive.
#[inline]
pub fn rounded_div(sum: i64, count: i64) -> i64 {
    if sum >= 0 {
        (sum + (count >> 1)) / count
    } else {
        (sum - (count >> 1)) / count
    }
}

/// Writes the rounded mean `sums / count` into `dst`.
///
/// A zero `count` leaves `dst` untouched.
pub fn write_mean(dst: &mut [i32], sums: &[i64], count: usize) {
    if count == 0 {
        return;
    }

    for (d, &s) in dst.iter_mut().zip(sums) {
        *d = rounded_div(s, count as i64) as i32;
    }
}

/// Adds `point` componentwise into `sums`.
#[inline]
pub fn accumulate(sums: &mut [i64], point: &[i32]) {
    for (s, &v) in sums.iter_mut().zip(point) {
        *s += v as i64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn exact_below_limit() {
        assert_eq!(distance_limited(&[0, 0, 0], &[1, 2, 2], 100), 9);
        assert_eq!(distance(&[-3, 4], &[0, 0]), 25);
    }

    #[test]
    fn early_exit_returns_limit() {
        assert_eq!(distance_limited(&[0, 0], &[3, 4], 25), 25);
        assert_eq!(distance_limited(&[0, 0], &[3, 4], 10), 10);
        assert_eq!(distance_limited(&[0, 0], &[3, 4], 0), 0);
    }

    #[test]
    fn wide_terms_saturate() {
        let a = [i32::MIN, i32::MIN];
        let b = [i32::MAX, i32::MAX];
        assert_eq!(distance(&a, &b), i32::MAX);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(rounded_div(5, 2), 3);
        assert_eq!(rounded_div(-5, 2), -3);
        assert_eq!(rounded_div(4, 3), 1);
        assert_eq!(rounded_div(-4, 3), -1);
        assert_eq!(rounded_div(7, 7), 1);
        assert_eq!(rounded_div(0, 9), 0);
    }

    #[test]
    fn empty_mean_keeps_destination() {
        let mut dst = [7, -7];
        write_mean(&mut dst, &[100, 100], 0);
        assert_eq!(dst, [7, -7]);

        write_mean(&mut dst, &[9, -9], 2);
        assert_eq!(dst, [5, -5]);
    }

    proptest! {
        #[test]
        fn early_exit_matches_full_distance(
            pair in (1usize..12).prop_flat_map(|dim| (
                prop::collection::vec(-40_000i32..40_000, dim),
                prop::collection::vec(-40_000i32..40_000, dim),
            )),
            limit in 0i32..i32::MAX,
        ) {
            let (a, b) = pair;
            let exact: i64 = a
                .iter()
                .zip(&b)
                .map(|(&x, &y)| (x as i64 - y as i64).pow(2))
                .sum();

            let got = distance_limited(&a, &b, limit);
            if exact < limit as i64 {
                prop_assert_eq!(got as i64, exact);
            } else {
                prop_assert_eq!(got, limit);
            }
        }
    }
}
