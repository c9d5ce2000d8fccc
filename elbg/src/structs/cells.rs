//! Cell membership lists.
//!
//! A cell is the set of points currently assigned to one codeword. Every
//! point belongs to exactly one cell, so the lists live in an index arena
//! with one `next` link per point and one head per codeword. Prepending is
//! O(1) and rebuilding the whole partition is a single `clear`.

use anyhow::Result;

use crate::utils::scratch::ScratchBuffer;

/// End-of-list marker.
pub const NIL: usize = usize::MAX;

#[derive(Debug)]
pub struct Cells {
    head: ScratchBuffer<usize>,
    next: ScratchBuffer<usize>,
    num_cb: usize,
}

impl Default for Cells {
    fn default() -> Self {
        Self {
            head: ScratchBuffer::new("cells"),
            next: ScratchBuffer::new("cell_buffer"),
            num_cb: 0,
        }
    }
}

impl Cells {
    /// Grows the arena for `num_cb` cells over `numpoints` points.
    pub fn ensure(&mut self, num_cb: usize, numpoints: usize) -> Result<()> {
        self.head.ensure(num_cb)?;
        self.next.ensure(numpoints)?;
        Ok(())
    }

    pub fn release(&mut self) {
        self.head.release();
        self.next.release();
        self.num_cb = 0;
    }

    /// Empties all `num_cb` cells.
    pub fn clear(&mut self, num_cb: usize) {
        self.num_cb = num_cb;
        self.head.as_mut_slice(num_cb).fill(NIL);
    }

    pub fn num_cb(&self) -> usize {
        self.num_cb
    }

    fn heads(&self) -> &[usize] {
        self.head.as_slice(self.num_cb)
    }

    fn heads_mut(&mut self) -> &mut [usize] {
        self.head.as_mut_slice(self.num_cb)
    }

    fn links(&self) -> &[usize] {
        self.next.as_slice(self.next.allocated())
    }

    fn links_mut(&mut self) -> &mut [usize] {
        let len = self.next.allocated();
        self.next.as_mut_slice(len)
    }

    /// Prepends `point` to cell `cell`.
    #[inline]
    pub fn push(&mut self, cell: usize, point: usize) {
        let head = self.heads()[cell];
        self.links_mut()[point] = head;
        self.heads_mut()[cell] = point;
    }

    /// Iterates over the point indices of `cell`.
    pub fn iter(&self, cell: usize) -> CellIter<'_> {
        CellIter {
            links: self.links(),
            current: self.heads()[cell],
        }
    }

    pub fn is_empty(&self, cell: usize) -> bool {
        self.heads()[cell] == NIL
    }

    pub fn len(&self, cell: usize) -> usize {
        self.iter(cell).count()
    }

    /// Moves every point of `src` to the end of `dst`, leaving `src` empty.
    pub fn append(&mut self, dst: usize, src: usize) {
        if dst == src {
            return;
        }

        let moved = std::mem::replace(&mut self.heads_mut()[src], NIL);
        if moved == NIL {
            return;
        }

        let mut tail = self.heads()[dst];
        if tail == NIL {
            self.heads_mut()[dst] = moved;
            return;
        }

        let links = self.links_mut();
        while links[tail] != NIL {
            tail = links[tail];
        }
        links[tail] = moved;
    }

    /// Empties `from` and redistributes its points between `first` and
    /// `second`; `to_second` decides for each point index.
    ///
    /// `from` may be one of the destinations.
    pub fn split<F>(&mut self, from: usize, first: usize, second: usize, mut to_second: F)
    where
        F: FnMut(usize) -> bool,
    {
        let mut current = std::mem::replace(&mut self.heads_mut()[from], NIL);

        while current != NIL {
            let following = self.links()[current];
            let cell = if to_second(current) { second } else { first };
            self.push(cell, current);
            current = following;
        }
    }
}

pub struct CellIter<'a> {
    links: &'a [usize],
    current: usize,
}

impl Iterator for CellIter<'_> {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.current == NIL {
            return None;
        }
        let point = self.current;
        self.current = self.links[point];
        Some(point)
    }
}
