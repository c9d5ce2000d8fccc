//! Per-codeword utility and the weighted donor table.
//!
//! The utility of a codeword is the summed squared distance of its cell's
//! points to it, so the utilities always add up to the total error. A
//! codeword earning more than its fair share (`num_cb * utility > error`)
//! is a candidate donor for the shift refinement, picked at random with
//! probability proportional to its utility through a prefix-sum table.

use anyhow::Result;
use rand::RngCore;

use crate::utils::scratch::ScratchBuffer;

#[derive(Debug)]
pub struct UtilityTable {
    utility: ScratchBuffer<i64>,
    increments: ScratchBuffer<i64>,
    num_cb: usize,
}

impl Default for UtilityTable {
    fn default() -> Self {
        Self {
            utility: ScratchBuffer::new("utility"),
            increments: ScratchBuffer::new("utility_inc"),
            num_cb: 0,
        }
    }
}

impl UtilityTable {
    pub fn ensure(&mut self, num_cb: usize) -> Result<()> {
        self.utility.ensure(num_cb)?;
        self.increments.ensure(num_cb)?;
        Ok(())
    }

    pub fn release(&mut self) {
        self.utility.release();
        self.increments.release();
        self.num_cb = 0;
    }

    /// Zeroes the utilities of `num_cb` codewords.
    pub fn reset(&mut self, num_cb: usize) {
        self.num_cb = num_cb;
        self.utility.as_mut_slice(num_cb).fill(0);
        self.increments.as_mut_slice(num_cb).fill(0);
    }

    pub fn len(&self) -> usize {
        self.num_cb
    }

    pub fn is_empty(&self) -> bool {
        self.num_cb == 0
    }

    pub fn as_slice(&self) -> &[i64] {
        self.utility.as_slice(self.num_cb)
    }

    #[inline]
    pub fn get(&self, cell: usize) -> i64 {
        self.as_slice()[cell]
    }

    pub fn set(&mut self, cell: usize, value: i64) {
        self.utility.as_mut_slice(self.num_cb)[cell] = value;
    }

    #[inline]
    pub fn add(&mut self, cell: usize, value: i64) {
        let slot = &mut self.utility.as_mut_slice(self.num_cb)[cell];
        *slot = slot.saturating_add(value);
    }

    /// Saturating sum of all utilities.
    pub fn total(&self) -> i64 {
        self.as_slice()
            .iter()
            .fold(0i64, |acc, &u| acc.saturating_add(u))
    }

    /// Whether `cell` earns less than its fair share of `error`.
    #[inline]
    pub fn is_low(&self, cell: usize, error: i64) -> bool {
        (self.num_cb as i128) * (self.get(cell) as i128) < error as i128
    }

    #[inline]
    fn is_high(&self, cell: usize, error: i64) -> bool {
        (self.num_cb as i128) * (self.get(cell) as i128) > error as i128
    }

    /// Rebuilds the prefix-sum table over the codewords above their fair share.
    pub fn evaluate_increments(&mut self, error: i64) {
        let mut inc = 0i64;
        for cell in 0..self.num_cb {
            if self.is_high(cell, error) {
                inc = inc.saturating_add(self.get(cell));
            }
            self.increments.as_mut_slice(self.num_cb)[cell] = inc;
        }
    }

    pub fn increments(&self) -> &[i64] {
        self.increments.as_slice(self.num_cb)
    }

    /// Last entry of the prefix-sum table; zero when no codeword qualifies.
    pub fn total_increment(&self) -> i64 {
        self.increments().last().copied().unwrap_or(0)
    }

    /// Picks a donor codeword with probability proportional to its utility.
    ///
    /// Returns `None` when the table is empty.
    pub fn pick_weighted<R: RngCore + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        let total = self.total_increment();
        if total <= 0 {
            return None;
        }

        let total = total as u64;
        let r = if total <= u32::MAX as u64 {
            rng.next_u32() as u64 % total
        } else {
            rng.next_u64() % total
        } + 1;

        let cell = self.increments().partition_point(|&inc| (inc as u64) < r);
        Some(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn table(values: &[i64]) -> Result<UtilityTable> {
        let mut table = UtilityTable::default();
        table.ensure(values.len())?;
        table.reset(values.len());
        for (cell, &value) in values.iter().enumerate() {
            table.add(cell, value);
        }
        Ok(table)
    }

    #[test]
    fn increments_cover_high_cells_only() -> Result<()> {
        let mut table = table(&[1, 50, 0, 49])?;
        let error = table.total();
        assert_eq!(error, 100);

        table.evaluate_increments(error);
        assert_eq!(table.increments(), [0, 50, 50, 99]);
        assert!(table.is_low(0, error));
        assert!(table.is_low(2, error));
        assert!(!table.is_low(1, error));
        Ok(())
    }

    #[test]
    fn weighted_pick_only_returns_donors() -> Result<()> {
        let mut table = table(&[1, 50, 0, 49])?;
        table.evaluate_increments(table.total());

        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = [0usize; 4];
        for _ in 0..2000 {
            hits[table.pick_weighted(&mut rng).unwrap()] += 1;
        }
        assert_eq!(hits[0], 0);
        assert_eq!(hits[2], 0);
        assert!(hits[1] > 800 && hits[3] > 800);
        Ok(())
    }

    #[test]
    fn no_donor_when_uniform() -> Result<()> {
        let mut table = table(&[10, 10, 10])?;
        table.evaluate_increments(table.total());
        assert_eq!(table.total_increment(), 0);

        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(table.pick_weighted(&mut rng), None);
        Ok(())
    }

    #[test]
    fn saturating_accumulation() -> Result<()> {
        let mut table = table(&[i64::MAX, 5])?;
        table.add(0, 1);
        assert_eq!(table.get(0), i64::MAX);
        assert_eq!(table.total(), i64::MAX);
        Ok(())
    }
}
