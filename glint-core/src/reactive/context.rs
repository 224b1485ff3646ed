//! Tracking Frames
//!
//! A tracking frame records which tags are read while a computation runs.
//! When the computation finishes, the frame is committed into a single tag
//! that is valid for exactly as long as everything that was read.
//!
//! # Implementation
//!
//! Each runtime keeps a stack of frames. Beginning a computation pushes an
//! empty frame; every consumed tag lands in the top frame. Committing pops
//! the frame, combines its tags, and consumes the combined tag into the frame
//! below, so an outer computation also depends on whatever an inner one read.
//!
//! Frames are popped by [`TrackFrame`], a guard that keeps the stack
//! balanced even when the computation returns early or unwinds.

use std::cell::RefCell;

use smallvec::SmallVec;

use super::runtime::Runtime;
use super::tag::Tag;
use crate::error::{Error, Result};

/// Tags consumed during one computation.
#[derive(Debug, Default)]
struct Frame {
    tags: SmallVec<[Tag; 8]>,
}

/// The per-runtime stack of active frames.
pub(crate) struct FrameStack {
    frames: RefCell<Vec<Frame>>,
    dedupe: bool,
}

impl FrameStack {
    pub(crate) fn new(dedupe: bool) -> Self {
        Self {
            frames: RefCell::new(Vec::new()),
            dedupe,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.frames.borrow().is_empty()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    pub(crate) fn begin(&self) {
        self.frames.borrow_mut().push(Frame::default());
        tracing::trace!(depth = self.depth(), "tracking frame begun");
    }

    /// Record `tag` in the top frame. Reads outside any frame are untracked.
    pub(crate) fn consume(&self, tag: &Tag) {
        let mut frames = self.frames.borrow_mut();
        if let Some(frame) = frames.last_mut() {
            if self.dedupe && frame.tags.last().is_some_and(|last| last.ptr_eq(tag)) {
                return;
            }
            frame.tags.push(tag.clone());
        }
    }

    /// Pop the top frame, combine it, and propagate into the parent frame.
    pub(crate) fn commit(&self) -> Result<Tag> {
        let frame = self
            .frames
            .borrow_mut()
            .pop()
            .ok_or(Error::CommitWithoutBegin)?;
        let tag = Tag::combine(frame.tags);
        self.consume(&tag);
        tracing::trace!(depth = self.depth(), ?tag, "tracking frame committed");
        Ok(tag)
    }

    /// Drop every frame above `depth` without propagating anything.
    fn truncate(&self, depth: usize) {
        self.frames.borrow_mut().truncate(depth);
    }
}

/// Guard that owns one tracking frame.
///
/// Committing yields the frame's combined tag. Dropping the guard without
/// committing pops the frame and forgets everything it recorded.
pub struct TrackFrame {
    runtime: Runtime,
    depth: usize,
    open: bool,
}

impl TrackFrame {
    /// Push a new frame on `runtime`.
    pub fn begin(runtime: &Runtime) -> Self {
        let frames = &runtime.inner.frames;
        frames.begin();
        Self {
            runtime: runtime.clone(),
            depth: frames.depth(),
            open: true,
        }
    }

    /// Pop the frame and return its combined tag.
    ///
    /// # Panics
    ///
    /// If the frame this guard pushed is no longer the top of the stack,
    /// for example because the computation ended it by hand.
    pub fn commit(mut self) -> Tag {
        let frames = &self.runtime.inner.frames;
        let depth = frames.depth();
        if depth != self.depth {
            // Still open: the drop below restores the stack while unwinding.
            panic!(
                "{}: expected frame depth {}, found {depth}",
                Error::CommitWithoutBegin,
                self.depth
            );
        }
        self.open = false;
        frames.commit().unwrap_or_else(|err| panic!("{err}"))
    }

    /// Pop the frame without propagating its reads.
    pub fn discard(mut self) {
        self.open = false;
        self.runtime.inner.frames.truncate(self.depth - 1);
    }
}

impl Drop for TrackFrame {
    fn drop(&mut self) {
        if self.open {
            // Also removes frames a computation left open above this one.
            self.runtime.inner.frames.truncate(self.depth - 1);
        }
    }
}
