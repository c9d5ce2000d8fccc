//! Row-major views over flat integer vectors.

/// Read-only view of `len()` vectors of `dim()` integers each.
///
/// Used both for the caller's point set and for bootstrap subsamples.
#[derive(Debug, Clone, Copy)]
pub struct Vectors<'a> {
    data: &'a [i32],
    dim: usize,
}

impl<'a> Vectors<'a> {
    /// Wraps `data`. Trailing values that do not fill a whole vector are ignored.
    pub fn new(data: &'a [i32], dim: usize) -> Self {
        debug_assert!(dim > 0);
        Self { data, dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> &'a [i32] {
        &self.data[index * self.dim..(index + 1) * self.dim]
    }

    pub fn iter(&self) -> std::slice::ChunksExact<'a, i32> {
        self.data.chunks_exact(self.dim)
    }
}

#[test]
fn view_rows() {
    let data = [1, 2, 3, 4, 5, 6, 7];
    let v = Vectors::new(&data, 2);
    assert_eq!(v.len(), 3);
    assert_eq!(v.get(1), &[3, 4]);
    assert_eq!(v.iter().last(), Some(&[5, 6][..]));
}
