//! Suspension-aware frame stacks.
//!
//! Both directions of the engine keep an explicit stack of frames, one per
//! value being converted, instead of relying on the call stack. When an
//! operation runs out of bytes it unwinds normally, every frame keeps its
//! progress, and the next drive replays the dispatch path down to the
//! suspended frame. [`StackCursor`] is the bookkeeping that tells a
//! re-entered dispatch level whether it is starting a fresh frame or
//! resuming one that already exists.

mod read;
mod write;

pub(crate) use read::{ReadFrame, ReadPhase, ReadStack};
pub(crate) use write::{WriteFrame, WritePhase, WriteStack};

/// What a push means for the frame at the new depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushAction {
    /// No continuation is pending at this depth: allocate a fresh frame.
    Fresh,
    /// A continuation is being replayed: the frame already exists and
    /// holds the progress from the suspended attempt.
    Resume,
}

/// Depth bookkeeping shared by the read and write stacks.
///
/// `continuation_depth` is zero while no continuation is pending. On the
/// first unsuccessful pop it snapshots the depth of the deepest suspended
/// frame; subsequent pushes replay existing frames until the cursor
/// catches back up to that depth, at which point the continuation is
/// cleared and deeper pushes are fresh again.
#[derive(Debug, Default)]
pub(crate) struct StackCursor {
    depth: usize,
    continuation_depth: usize,
}

impl StackCursor {
    /// Current frame depth.
    pub(crate) fn depth(&self) -> usize {
        self.depth
    }

    /// Whether a suspended attempt is waiting to be replayed.
    pub(crate) fn is_resuming(&self) -> bool {
        self.continuation_depth != 0
    }

    /// Enter the next frame down.
    pub(crate) fn push(&mut self) -> PushAction {
        self.depth += 1;
        if self.continuation_depth == 0 {
            return PushAction::Fresh;
        }
        debug_assert!(self.depth <= self.continuation_depth);
        if self.depth == self.continuation_depth {
            // Caught up with the deepest suspended frame: it resumes now,
            // and anything pushed below it is new work.
            self.continuation_depth = 0;
        }
        PushAction::Resume
    }

    /// Leave the current frame. `complete` is false when the frame
    /// suspended and must be revisited; the first incomplete pop snapshots
    /// the continuation depth.
    pub(crate) fn pop(&mut self, complete: bool) {
        debug_assert!(self.depth > 0);
        if complete {
            debug_assert_eq!(
                self.continuation_depth, 0,
                "completed a frame while a continuation is pending"
            );
        } else if self.continuation_depth == 0 {
            self.continuation_depth = self.depth;
        }
        self.depth -= 1;
    }
}
