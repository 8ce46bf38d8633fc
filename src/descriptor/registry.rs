//! Descriptor providers and the per-type descriptor cache

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Described, TypeDescriptor, TypeName};
use crate::lock;

/// Source of type descriptors
///
/// Implementations must be deterministic and side-effect free for a given
/// type name.
pub trait PropertyDescriptorProvider: Send + Sync {
    fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>>;
}

/// Descriptors registered up front
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeName, Arc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same name
    pub fn register(&mut self, descriptor: TypeDescriptor) {
        self.types
            .insert(descriptor.name().clone(), Arc::new(descriptor));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_type(mut self, descriptor: TypeDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    /// Register the descriptor of a Rust type
    pub fn with_described<T: Described>(self) -> Self {
        self.with_type(T::type_descriptor())
    }

    pub fn contains(&self, type_name: &TypeName) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl PropertyDescriptorProvider for TypeRegistry {
    fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>> {
        self.types.get(type_name).cloned()
    }
}

/// Memoizes a provider: every type is described at most once per winner and
/// all callers observe the same `Arc`
pub struct DescriptorCache {
    provider: Box<dyn PropertyDescriptorProvider>,
    descriptors: RwLock<HashMap<TypeName, Option<Arc<TypeDescriptor>>>>,
}

impl DescriptorCache {
    pub fn new(provider: impl PropertyDescriptorProvider + 'static) -> Self {
        Self::from_boxed(Box::new(provider))
    }

    pub(crate) fn from_boxed(provider: Box<dyn PropertyDescriptorProvider>) -> Self {
        Self {
            provider,
            descriptors: RwLock::new(HashMap::new()),
        }
    }

    pub fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>> {
        if let Some(cached) = lock::read(&self.descriptors).get(type_name) {
            return cached.clone();
        }

        // Computed outside the lock; the first published result wins
        let described = self.provider.describe(type_name);
        lock::write(&self.descriptors)
            .entry(type_name.clone())
            .or_insert(described)
            .clone()
    }

    /// Number of memoized lookups, misses included
    pub fn len(&self) -> usize {
        lock::read(&self.descriptors).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PropertyDescriptorProvider for DescriptorCache {
    fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>> {
        DescriptorCache::describe(self, type_name)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::descriptor::ValueType;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
    }

    impl PropertyDescriptorProvider for CountingProvider {
        fn describe(&self, type_name: &TypeName) -> Option<Arc<TypeDescriptor>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (type_name.as_str() == "Known").then(|| {
                Arc::new(TypeDescriptor::new("Known").property("id", ValueType::Integer))
            })
        }
    }

    #[test]
    fn test_registry_describe() {
        let registry = TypeRegistry::new()
            .with_type(TypeDescriptor::new("A").property("x", ValueType::Bool));

        assert!(registry.contains(&"A".into()));
        assert_eq!(registry.len(), 1);
        assert!(registry.describe(&"B".into()).is_none());
        assert_eq!(
            registry.describe(&"A".into()).unwrap().properties().len(),
            1
        );
    }

    #[test]
    fn test_cache_memoizes_hits_and_misses() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DescriptorCache::new(CountingProvider {
            calls: calls.clone(),
        });

        let first = cache.describe(&"Known".into()).unwrap();
        let second = cache.describe(&"Known".into()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        assert!(cache.describe(&"Missing".into()).is_none());
        assert!(cache.describe(&"Missing".into()).is_none());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_identical_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = DescriptorCache::new(CountingProvider { calls });

        let described: Vec<Arc<TypeDescriptor>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| cache.describe(&"Known".into()).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(described.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
