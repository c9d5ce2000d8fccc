use anyhow::{Result, bail};
use log::debug;

use crate::utils::errors::TrainError;

/// A grow-only scratch buffer owned by a training context.
///
/// Keeps its allocation between training runs so that encoders retraining
/// every frame do not pay for it again. The buffer is reallocated only when
/// a request exceeds the recorded capacity, and it never shrinks until
/// [`release`](Self::release) is called.
#[derive(Debug)]
pub struct ScratchBuffer<T> {
    name: &'static str,
    data: Vec<T>,
    allocated: usize,
}

impl<T: Copy + Default> ScratchBuffer<T> {
    /// Creates an empty buffer. Nothing is allocated until [`ensure`](Self::ensure).
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            data: Vec::new(),
            allocated: 0,
        }
    }

    /// Number of elements currently usable without reallocating.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    /// Makes at least `elements` elements available.
    ///
    /// On failure the old contents are gone and the recorded capacity is
    /// reset to zero, so the next call retries the allocation from scratch.
    pub fn ensure(&mut self, elements: usize) -> Result<()> {
        if self.allocated >= elements {
            return Ok(());
        }

        self.data = Vec::new();
        if self.data.try_reserve_exact(elements).is_err() {
            self.allocated = 0;
            bail!(TrainError::OutOfMemory {
                buffer: self.name,
                requested: elements,
            });
        }
        self.data.resize(elements, T::default());
        self.allocated = elements;

        debug!("Grew {} buffer to {} elements", self.name, elements);

        Ok(())
    }

    pub fn as_slice(&self, len: usize) -> &[T] {
        &self.data[..len]
    }

    pub fn as_mut_slice(&mut self, len: usize) -> &mut [T] {
        &mut self.data[..len]
    }

    /// Frees the allocation.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.allocated = 0;
    }
}

#[test]
fn grows_but_never_shrinks() -> Result<()> {
    let mut buf = ScratchBuffer::<i32>::new("test");
    assert_eq!(buf.allocated(), 0);

    buf.ensure(16)?;
    assert_eq!(buf.allocated(), 16);
    buf.as_mut_slice(16)[15] = 42;

    buf.ensure(4)?;
    assert_eq!(buf.allocated(), 16);
    assert_eq!(buf.as_slice(16)[15], 42);

    buf.ensure(32)?;
    assert_eq!(buf.allocated(), 32);

    buf.release();
    assert_eq!(buf.allocated(), 0);
    Ok(())
}

#[test]
fn failed_growth_resets_capacity() -> Result<()> {
    let mut buf = ScratchBuffer::<i64>::new("utility");
    buf.ensure(8)?;

    let err = buf.ensure(usize::MAX / 4).unwrap_err();
    assert_eq!(
        err.downcast_ref::<TrainError>(),
        Some(&TrainError::OutOfMemory {
            buffer: "utility",
            requested: usize::MAX / 4,
        })
    );
    assert_eq!(buf.allocated(), 0);

    buf.ensure(8)?;
    assert_eq!(buf.allocated(), 8);
    Ok(())
}
