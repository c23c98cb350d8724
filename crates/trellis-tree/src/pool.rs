#![forbid(unsafe_code)]

//! Stack-disciplined pooling for frame builders.
//!
//! One builder is needed per component render, and renders nest (a parent
//! render triggers child renders before the batch commits), so builder
//! lifetimes form a stack. The pool enforces that shape: the last
//! acquired builder must be the first returned. Returning out of order,
//! or returning when nothing is outstanding, indicates the renderer's
//! bookkeeping is broken and panics immediately.
//!
//! Pooled builders keep their frame-array capacity across renders, which
//! is the point: a steady-state render pass allocates nothing for frame
//! storage.

use crate::builder::FrameBuilder;

/// LIFO pool of reusable [`FrameBuilder`]s.
#[derive(Debug, Default)]
pub struct BuilderPool {
    free: Vec<FrameBuilder>,
    /// Serials of builders currently checked out, in acquisition order.
    outstanding: Vec<u64>,
    next_serial: u64,
}

impl BuilderPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check out a builder, reusing a pooled one when available.
    pub fn acquire(&mut self) -> FrameBuilder {
        let mut builder = self.free.pop().unwrap_or_default();
        if builder.serial == 0 {
            self.next_serial += 1;
            builder.serial = self.next_serial;
        }
        self.outstanding.push(builder.serial);
        builder
    }

    /// Return a builder. Must be the most recently acquired outstanding
    /// builder.
    ///
    /// # Panics
    ///
    /// Panics on out-of-order return or when nothing is outstanding.
    pub fn release(&mut self, mut builder: FrameBuilder) {
        let expected = self
            .outstanding
            .pop()
            .expect("builder pool release with nothing outstanding");
        assert!(
            builder.serial == expected,
            "builder pool release out of acquisition order (expected serial {expected}, got {})",
            builder.serial
        );
        builder.clear();
        self.free.push(builder);
    }

    /// Number of builders currently checked out.
    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }
}
