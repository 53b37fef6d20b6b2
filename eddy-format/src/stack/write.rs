//! The write-side frame stack.

use eddy_core::{CancelToken, StreamRef, TypeKind, TypeRegistry, TypeTag, Value};

use crate::error::{Error, ErrorKind, Result};
use crate::path;
use crate::refs::{RefMode, ReferenceTracker};
use crate::stack::{PushAction, StackCursor};

/// Progress of one value through its converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum WritePhase {
    /// Nothing emitted for this value yet.
    #[default]
    Start,
    /// The container token and metadata are out; emitting members.
    Members,
}

/// Per-value write progress. Survives suspension.
#[derive(Debug)]
pub(crate) struct WriteFrame {
    /// Tag the converter runs under. Starts as the declared tag; the
    /// dynamic converter and polymorphic resolution retarget it.
    pub ty: TypeTag,
    pub phase: WritePhase,
    /// Next property to emit (object frames).
    pub prop_index: usize,
    /// Next element index (array and stream frames).
    pub elem_index: usize,
    /// Writer container depth when the converter was first entered.
    pub entry_depth: usize,
    /// Identity pushed onto the cycle path, to pop on completion.
    pub identity: Option<usize>,
    /// `$id` to emit right after the container opens.
    pub pending_ref_id: Option<String>,
    /// Discriminator property and id to emit after any `$id`.
    pub discriminator: Option<(String, String)>,
    /// Whether polymorphic retargeting already ran for this frame.
    pub resolved: bool,
    /// One-entry memo of the last child resolution done under this frame:
    /// (declared base, runtime, effective, discriminator id). Collections
    /// of one dominant subtype hit this without touching the resolver
    /// cache lock.
    pub sibling: Option<(TypeTag, TypeTag, TypeTag, Option<String>)>,
    /// Stream item fetched but not yet written (fetch completed, then the
    /// write suspended).
    pub pending_item: Option<Value>,
    /// Stream fetch reported pending; re-poll before anything else.
    pub fetch_pending: bool,
    /// The current member's name token is already in the output buffer;
    /// a resume must not re-emit it.
    pub name_emitted: bool,
    /// This collection was wrapped in a `{"$id": .., "$values": ..}`
    /// envelope and owes a closing `}`.
    pub wrapped: bool,
}

impl WriteFrame {
    fn new(ty: TypeTag) -> Self {
        WriteFrame {
            ty,
            phase: WritePhase::Start,
            prop_index: 0,
            elem_index: 0,
            entry_depth: 0,
            identity: None,
            pending_ref_id: None,
            discriminator: None,
            resolved: false,
            sibling: None,
            pending_item: None,
            fetch_pending: false,
            name_emitted: false,
            wrapped: false,
        }
    }
}

/// All mutable state of one serialization operation.
pub(crate) struct WriteStack {
    cursor: StackCursor,
    frames: Vec<WriteFrame>,
    /// Identity tracking for the operation.
    pub refs: ReferenceTracker,
    /// Cooperative cancellation, checked at fetch boundaries.
    pub cancel: CancelToken,
    /// Streams whose disposal is owed by this operation. Populated when a
    /// stream frame first starts, drained exactly once by the driver.
    pub pending_disposals: Vec<StreamRef>,
}

impl WriteStack {
    pub(crate) fn new(mode: RefMode, cancel: CancelToken) -> Self {
        WriteStack {
            cursor: StackCursor::default(),
            frames: Vec::new(),
            refs: ReferenceTracker::new(mode),
            cancel,
            pending_disposals: Vec::new(),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.cursor.depth()
    }

    pub(crate) fn is_resuming(&self) -> bool {
        self.cursor.is_resuming()
    }

    /// Enter the frame for the next value. Returns the frame index and
    /// whether it is fresh or resuming.
    pub(crate) fn push(&mut self, ty: TypeTag) -> (usize, PushAction) {
        let action = self.cursor.push();
        let index = self.cursor.depth() - 1;
        log::trace!("write frame {index} push {ty:?} ({action:?})");
        match action {
            PushAction::Fresh => {
                debug_assert_eq!(self.frames.len(), index);
                self.frames.push(WriteFrame::new(ty));
            }
            PushAction::Resume => {
                // The frame keeps the tag it was retargeted to; do not
                // reset it to the declared tag.
                debug_assert!(self.frames.len() > index);
            }
        }
        (index, action)
    }

    /// Leave the current frame. Completed frames are discarded; suspended
    /// frames keep their progress for the replay.
    pub(crate) fn pop(&mut self, complete: bool) {
        log::trace!(
            "write frame {} pop (complete: {complete})",
            self.cursor.depth() - 1
        );
        if complete {
            let frame = self.frames.pop();
            debug_assert!(frame.is_some());
        }
        self.cursor.pop(complete);
    }

    pub(crate) fn frame(&self, index: usize) -> &WriteFrame {
        &self.frames[index]
    }

    pub(crate) fn frame_mut(&mut self, index: usize) -> &mut WriteFrame {
        &mut self.frames[index]
    }

    /// Render the path from the root to the value currently in progress,
    /// for error messages.
    pub(crate) fn render_path(&self, registry: &TypeRegistry) -> String {
        let mut out = String::from("$");
        for frame in &self.frames {
            match &registry.get(frame.ty).kind {
                TypeKind::Object(layout) => {
                    if let Some(prop) = layout.properties.get(frame.prop_index) {
                        path::append_property(&mut out, &prop.name);
                    }
                }
                TypeKind::Array { .. } | TypeKind::Stream { .. } => {
                    path::append_index(&mut out, frame.elem_index);
                }
                TypeKind::Scalar(_) | TypeKind::Any => {}
            }
        }
        out
    }

    /// Dispose every stream owed by this operation, exactly once,
    /// aggregating all failures.
    pub(crate) fn drain_disposals(&mut self) -> Result<()> {
        let mut failures = Vec::new();
        for stream in self.pending_disposals.drain(..) {
            if let Err(err) = stream.borrow_mut().dispose() {
                failures.push(err.message);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::Disposal(failures)))
        }
    }
}
