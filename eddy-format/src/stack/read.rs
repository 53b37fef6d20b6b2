//! The read-side frame stack.

use eddy_core::{TypeKind, TypeRegistry, TypeTag, Value};

use crate::path;
use crate::refs::{RefMode, ReferenceTracker};
use crate::stack::{PushAction, StackCursor};

/// Progress of one value through its converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ReadPhase {
    /// The container start token has not been consumed yet.
    #[default]
    Start,
    /// Start token consumed; probing metadata properties (`$id`, `$ref`,
    /// the discriminator, `$values`). Each probe is atomic: a suspension
    /// mid-probe rewinds to the last committed token and retries.
    Meta,
    /// Metadata handled; consuming members.
    Members,
}

/// Per-value read progress. Survives suspension.
#[derive(Debug)]
pub(crate) struct ReadFrame {
    /// Tag the converter runs under. Starts as the declared tag; a
    /// discriminator retargets it.
    pub ty: TypeTag,
    pub phase: ReadPhase,
    /// Value under construction. For slot-constructed objects and for
    /// arrays this is allocated before any member is read, so that `$id`
    /// registration and cyclic `$ref`s observe the final allocation.
    pub instance: Option<Value>,
    /// Elements appended so far (array frames), for path rendering.
    pub elem_index: usize,
    /// `$id` read during the metadata probe, to register once the
    /// allocation exists.
    pub pending_id: Option<String>,
    /// Buffered `(slot, value)` pairs for parameterized construction.
    pub ctor_args: Vec<(usize, Value)>,
    /// Slot awaiting its value, when the name token was consumed but the
    /// value suspended. `None` for unknown properties being skipped.
    pub pending_slot: Option<usize>,
    /// Wire name of the member currently in progress, for path rendering.
    pub current_name: Option<String>,
    /// An unknown property's subtree is being skipped; tokens are consumed
    /// until the reader returns to `skip_depth`.
    pub skipping: bool,
    pub skip_depth: usize,
    /// This array frame was entered through a `{"$id": .., "$values": ..}`
    /// wrapper and owes a closing `}` after its `]`.
    pub values_wrapper: bool,
    /// An element read is in progress (array frames); a resume must go
    /// straight back into the child instead of peeking for `]`.
    pub elem_pending: bool,
    /// Reader container depth when the converter was first entered.
    pub entry_depth: usize,
    /// Reader byte counter when the converter was first entered.
    pub entry_bytes: usize,
}

impl ReadFrame {
    fn new(ty: TypeTag) -> Self {
        ReadFrame {
            ty,
            phase: ReadPhase::Start,
            instance: None,
            elem_index: 0,
            pending_id: None,
            ctor_args: Vec::new(),
            pending_slot: None,
            current_name: None,
            skipping: false,
            skip_depth: 0,
            values_wrapper: false,
            elem_pending: false,
            entry_depth: 0,
            entry_bytes: 0,
        }
    }
}

/// All mutable state of one deserialization operation.
pub(crate) struct ReadStack {
    cursor: StackCursor,
    frames: Vec<ReadFrame>,
    /// `$id`/`$ref` state for the operation.
    pub refs: ReferenceTracker,
}

impl ReadStack {
    pub(crate) fn new(mode: RefMode) -> Self {
        ReadStack {
            cursor: StackCursor::default(),
            frames: Vec::new(),
            refs: ReferenceTracker::new(mode),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.cursor.depth()
    }

    pub(crate) fn is_resuming(&self) -> bool {
        self.cursor.is_resuming()
    }

    pub(crate) fn push(&mut self, ty: TypeTag) -> (usize, PushAction) {
        let action = self.cursor.push();
        let index = self.cursor.depth() - 1;
        log::trace!("read frame {index} push {ty:?} ({action:?})");
        match action {
            PushAction::Fresh => {
                debug_assert_eq!(self.frames.len(), index);
                self.frames.push(ReadFrame::new(ty));
            }
            PushAction::Resume => {
                debug_assert!(self.frames.len() > index);
            }
        }
        (index, action)
    }

    pub(crate) fn pop(&mut self, complete: bool) {
        log::trace!(
            "read frame {} pop (complete: {complete})",
            self.cursor.depth() - 1
        );
        if complete {
            let frame = self.frames.pop();
            debug_assert!(frame.is_some());
        }
        self.cursor.pop(complete);
    }

    pub(crate) fn frame(&self, index: usize) -> &ReadFrame {
        &self.frames[index]
    }

    pub(crate) fn frame_mut(&mut self, index: usize) -> &mut ReadFrame {
        &mut self.frames[index]
    }

    /// Render the path from the root to the member currently in progress.
    pub(crate) fn render_path(&self, registry: &TypeRegistry) -> String {
        let mut out = String::from("$");
        for frame in &self.frames {
            if let Some(name) = &frame.current_name {
                path::append_property(&mut out, name);
            } else if matches!(registry.get(frame.ty).kind, TypeKind::Array { .. })
                || frame.values_wrapper
            {
                path::append_index(&mut out, frame.elem_index);
            }
        }
        out
    }
}
