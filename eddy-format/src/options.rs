//! Per-operation configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use eddy_core::{ConfigError, ConfigErrorKind, TypeKind, TypeRegistry, TypeTag};

use crate::cache::LruCache;
use crate::converters::{
    ArrayConverter, Converter, DynamicConverter, ObjectConverter, ScalarConverter, StreamConverter,
};
use crate::refs::RefMode;

const CONVERTER_CACHE_CAPACITY: usize = 64;
const DEFAULT_MAX_DEPTH: usize = 64;

/// Engine configuration: the type registry, reference handling, depth
/// limit and converter overrides.
///
/// Options seal themselves the first time they are used for an operation;
/// every mutator fails afterwards. This makes it safe to share one
/// `Options` value across many operations without any of them observing a
/// configuration change mid-flight.
pub struct Options {
    registry: Arc<TypeRegistry>,
    reference_mode: RefMode,
    max_depth: usize,
    custom: HashMap<TypeTag, Arc<dyn Converter>>,
    resolved: Mutex<LruCache<TypeTag, Arc<dyn Converter>>>,
    sealed: AtomicBool,
}

impl Options {
    /// Options over a registry, with defaults: references ignored, depth
    /// limit 64, no converter overrides.
    pub fn new(registry: TypeRegistry) -> Self {
        Options {
            registry: Arc::new(registry),
            reference_mode: RefMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            custom: HashMap::new(),
            resolved: Mutex::new(LruCache::new(CONVERTER_CACHE_CAPACITY)),
            sealed: AtomicBool::new(false),
        }
    }

    /// The type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// The configured reference handling mode.
    pub fn reference_mode(&self) -> RefMode {
        self.reference_mode
    }

    /// The configured depth limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Whether these options have been used for an operation.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Set the reference handling mode.
    pub fn set_reference_mode(&mut self, mode: RefMode) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.reference_mode = mode;
        Ok(())
    }

    /// Set the maximum nesting depth.
    pub fn set_max_depth(&mut self, depth: usize) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.max_depth = depth.max(1);
        Ok(())
    }

    /// Override the converter for a type. The override is treated as
    /// untrusted: cursor depth is validated around every call.
    pub fn set_converter(
        &mut self,
        ty: TypeTag,
        converter: Arc<dyn Converter>,
    ) -> Result<(), ConfigError> {
        self.check_mutable()?;
        self.custom.insert(ty, converter);
        Ok(())
    }

    fn check_mutable(&self) -> Result<(), ConfigError> {
        if self.is_sealed() {
            return Err(ConfigError::new(ConfigErrorKind::Sealed));
        }
        Ok(())
    }

    /// One-way seal, flipped by the first operation.
    pub(crate) fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    /// The effective converter for a tag: override, then cache, then the
    /// built-in for the tag's kind.
    pub(crate) fn converter_for(
        &self,
        ty: TypeTag,
        registry: &TypeRegistry,
    ) -> Arc<dyn Converter> {
        if let Some(custom) = self.custom.get(&ty) {
            return custom.clone();
        }
        let mut cache = self
            .resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(hit) = cache.get(&ty) {
            return hit;
        }
        let built: Arc<dyn Converter> = match registry.get(ty).kind {
            TypeKind::Scalar(kind) => Arc::new(ScalarConverter(kind)),
            TypeKind::Object(_) => Arc::new(ObjectConverter),
            TypeKind::Array { .. } => Arc::new(ArrayConverter),
            TypeKind::Stream { .. } => Arc::new(StreamConverter),
            TypeKind::Any => Arc::new(DynamicConverter),
        };
        cache.insert(ty, built.clone());
        built
    }
}

impl std::fmt::Debug for Options {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("reference_mode", &self.reference_mode)
            .field("max_depth", &self.max_depth)
            .field("overrides", &self.custom.len())
            .field("sealed", &self.is_sealed())
            .finish_non_exhaustive()
    }
}
