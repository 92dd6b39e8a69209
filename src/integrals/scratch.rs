//! Per-worker scratch memory for grid-integral evaluation.
//!
//! A [`ScratchArena`] owns one contiguous buffer. Evaluation phases obtain disjoint zeroed
//! sub-slices from a [`ScratchCarver`]; a nested carver obtained with [`ScratchCarver::sub`]
//! carves after everything its parent has handed out, and gives its region back when dropped so
//! that the next phase reuses the same memory.

use crate::integrals::GridIntegralError;

#[cfg(test)]
#[path = "scratch_tests.rs"]
mod scratch_tests;

/// A contiguous scratch buffer owned by one worker.
#[derive(Clone, Debug)]
pub struct ScratchArena {
    buffer: Vec<f64>,

    /// The largest number of elements ever simultaneously carved from this arena.
    high_water_mark: usize,
}

impl ScratchArena {
    /// Allocates a zeroed arena of `capacity` elements.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity],
            high_water_mark: 0,
        }
    }

    /// The number of elements in this arena.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// The largest number of elements ever simultaneously carved from this arena.
    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }

    /// Forgets the recorded high-water mark.
    pub fn reset_high_water_mark(&mut self) {
        self.high_water_mark = 0;
    }

    /// Returns a carver over the whole arena.
    pub fn carver(&mut self) -> ScratchCarver<'_> {
        let capacity = self.buffer.len();
        ScratchCarver {
            rest: &mut self.buffer[..],
            base: 0,
            used: 0,
            capacity,
            high_water_mark: &mut self.high_water_mark,
        }
    }
}

/// Hands out disjoint zeroed sub-slices of a [`ScratchArena`].
#[derive(Debug)]
pub struct ScratchCarver<'a> {
    /// The part of the arena not yet handed out by this carver.
    rest: &'a mut [f64],

    /// The arena offset at which this carver starts.
    base: usize,

    /// The number of elements handed out by this carver.
    used: usize,

    capacity: usize,

    high_water_mark: &'a mut usize,
}

impl<'a> ScratchCarver<'a> {
    /// Carves the next `len` elements, zeroed.
    ///
    /// # Errors
    ///
    /// Errors with [`GridIntegralError::ScratchExhausted`] if fewer than `len` elements remain.
    pub fn carve(&mut self, len: usize) -> Result<&'a mut [f64], GridIntegralError> {
        if len > self.rest.len() {
            return Err(GridIntegralError::ScratchExhausted {
                requested: self.base + self.used + len,
                available: self.capacity,
            });
        }
        let rest = std::mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(len);
        self.rest = tail;
        self.used += len;
        *self.high_water_mark = (*self.high_water_mark).max(self.base + self.used);
        head.fill(0.0);
        Ok(head)
    }

    /// Returns a nested carver over the remainder of the arena. Its region is released when it
    /// is dropped.
    pub fn sub(&mut self) -> ScratchCarver<'_> {
        ScratchCarver {
            rest: &mut *self.rest,
            base: self.base + self.used,
            used: 0,
            capacity: self.capacity,
            high_water_mark: &mut *self.high_water_mark,
        }
    }

    /// The number of elements still available to this carver.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}
