//! Reference tracking: cycle breaking and `$id`/`$ref` preservation.

use std::collections::HashMap;

use eddy_core::Value;

use crate::error::{Error, ErrorKind, Result};

/// How object identity is treated across a serialization operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefMode {
    /// No identity tracking. Cyclic graphs recurse until the depth limit.
    #[default]
    Ignore,
    /// A value already being serialized on the current path is written as
    /// `null` instead of recursing.
    CycleBreak,
    /// Identity is preserved on the wire: the first occurrence of a shared
    /// value carries `$id`, later occurrences become `{"$ref": id}`.
    Preserve,
}

/// Per-operation identity state. Lives on the write or read stack and is
/// reset between top-level operations.
#[derive(Debug, Default)]
pub struct ReferenceTracker {
    mode: RefMode,
    // Cycle breaking: identities of containers currently open on the path.
    on_path: Vec<usize>,
    // Preservation, write side: identity -> assigned id.
    ids: HashMap<usize, String>,
    next_id: u64,
    // Preservation, read side: id -> resolved value.
    by_id: HashMap<String, Value>,
}

impl ReferenceTracker {
    /// A tracker in the given mode.
    pub fn new(mode: RefMode) -> Self {
        ReferenceTracker {
            mode,
            ..Default::default()
        }
    }

    /// The operating mode.
    pub fn mode(&self) -> RefMode {
        self.mode
    }

    /// Record a container as open on the current path. Returns `true` when
    /// the identity is already on the path, i.e. a cycle.
    pub fn enter(&mut self, identity: usize) -> bool {
        if self.on_path.contains(&identity) {
            return true;
        }
        self.on_path.push(identity);
        false
    }

    /// Record a container as closed. Must pair with a successful
    /// [`ReferenceTracker::enter`].
    pub fn exit(&mut self, identity: usize) {
        let popped = self.on_path.pop();
        debug_assert_eq!(popped, Some(identity), "unbalanced reference path");
    }

    /// Preservation, write side: the id for an identity. The `bool` is
    /// `true` when this is the first occurrence (serialize the payload and
    /// emit `$id`), `false` for later occurrences (emit `$ref`).
    pub fn id_for(&mut self, identity: usize) -> (String, bool) {
        if let Some(id) = self.ids.get(&identity) {
            return (id.clone(), false);
        }
        self.next_id += 1;
        let id = self.next_id.to_string();
        self.ids.insert(identity, id.clone());
        (id, true)
    }

    /// Preservation, read side: bind an id read from `$id` to its value.
    /// The value is registered before its properties are populated so that
    /// forward and cyclic `$ref`s resolve to the same allocation.
    pub fn register(&mut self, id: &str, value: Value) -> Result<()> {
        if self.by_id.insert(id.to_owned(), value).is_some() {
            return Err(Error::new(ErrorKind::RefMetadata {
                message: format!("duplicate $id `{id}`"),
            }));
        }
        Ok(())
    }

    /// Preservation, read side: resolve a `$ref`.
    pub fn resolve(&self, id: &str) -> Result<Value> {
        self.by_id
            .get(id)
            .cloned()
            .ok_or_else(|| Error::new(ErrorKind::UnknownReference { id: id.to_owned() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_detection_is_path_scoped() {
        let mut refs = ReferenceTracker::new(RefMode::CycleBreak);
        assert!(!refs.enter(1));
        assert!(!refs.enter(2));
        assert!(refs.enter(1), "identity already on path");
        refs.exit(2);
        refs.exit(1);
        // Re-entering after exit is not a cycle: siblings may share values.
        assert!(!refs.enter(1));
    }

    #[test]
    fn preserve_ids_are_sequential_and_stable() {
        let mut refs = ReferenceTracker::new(RefMode::Preserve);
        assert_eq!(refs.id_for(10), ("1".to_owned(), true));
        assert_eq!(refs.id_for(20), ("2".to_owned(), true));
        assert_eq!(refs.id_for(10), ("1".to_owned(), false));
    }

    #[test]
    fn duplicate_read_id_is_rejected() {
        let mut refs = ReferenceTracker::new(RefMode::Preserve);
        refs.register("1", Value::array(vec![])).unwrap();
        let err = refs.register("1", Value::array(vec![])).unwrap_err();
        assert_eq!(err.code(), "ref_metadata");
    }

    #[test]
    fn dangling_ref_is_an_error() {
        let refs = ReferenceTracker::new(RefMode::Preserve);
        assert_eq!(refs.resolve("7").unwrap_err().code(), "unknown_reference");
    }
}
