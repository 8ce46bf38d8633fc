//! Engine-wide cache of type map plans

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use super::{TypeMapKey, TypeMapPlan};
use crate::lock;

thread_local! {
    /// Keys whose plans the current thread is building, innermost last
    static BUILD_STACK: RefCell<Vec<TypeMapKey>> = const { RefCell::new(Vec::new()) };
}

/// Plans keyed by type pair and optional name
///
/// The first requester of a key registers an unbuilt plan and builds it;
/// every other requester receives the same `Arc`. Requesters that are not
/// building anything themselves wait until the plan is published. A thread
/// that is already building gets the in-progress plan straight away, which
/// breaks self-referential and cross-thread build cycles. A build that
/// panics is dropped from the store, so the next requester builds afresh.
#[derive(Default)]
pub(crate) struct TypeMapStore {
    plans: RwLock<HashMap<TypeMapKey, Arc<TypeMapPlan>>>,
}

impl TypeMapStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Cached plan for `key`, building it with `build` on first request
    pub(crate) fn get_or_build(
        &self,
        key: &TypeMapKey,
        build: impl FnOnce(&Arc<TypeMapPlan>),
    ) -> Arc<TypeMapPlan> {
        loop {
            if let Some(existing) = self.get(key) {
                return existing;
            }

            let existing = {
                let mut plans = lock::write(&self.plans);
                match plans.get(key) {
                    Some(existing) => existing.clone(),
                    None => {
                        let plan = Arc::new(TypeMapPlan::new(key.clone()));
                        plans.insert(key.clone(), plan.clone());
                        drop(plans);

                        let _guard = BuildGuard::enter(self, &plan);
                        build(&plan);
                        return plan;
                    }
                }
            };
            if let Some(settled) = self.settle(existing) {
                return settled;
            }
        }
    }

    /// Cached plan for `key`, never builds
    pub(crate) fn get(&self, key: &TypeMapKey) -> Option<Arc<TypeMapPlan>> {
        let existing = lock::read(&self.plans).get(key).cloned()?;
        self.settle(existing)
    }

    /// Every cached plan, ordered by key, each published before it is returned
    pub(crate) fn all(&self) -> Vec<Arc<TypeMapPlan>> {
        let cached: Vec<Arc<TypeMapPlan>> = lock::read(&self.plans).values().cloned().collect();
        let mut plans: Vec<Arc<TypeMapPlan>> =
            cached.into_iter().filter_map(|plan| self.settle(plan)).collect();
        plans.sort_by(|a, b| a.key().cmp(b.key()));
        plans
    }

    pub(crate) fn len(&self) -> usize {
        lock::read(&self.plans).len()
    }

    /// Wait for `plan` where allowed; `None` if its build was abandoned
    fn settle(&self, plan: Arc<TypeMapPlan>) -> Option<Arc<TypeMapPlan>> {
        let plan = self.await_plan(plan);
        if plan.is_ready() && !self.is_cached(&plan) {
            return None;
        }
        Some(plan)
    }

    fn is_cached(&self, plan: &Arc<TypeMapPlan>) -> bool {
        lock::read(&self.plans)
            .get(plan.key())
            .is_some_and(|cached| Arc::ptr_eq(cached, plan))
    }

    fn await_plan(&self, plan: Arc<TypeMapPlan>) -> Arc<TypeMapPlan> {
        if plan.is_ready() {
            return plan;
        }

        let (building, own) = BUILD_STACK.with(|stack| {
            let stack = stack.borrow();
            (!stack.is_empty(), stack.contains(plan.key()))
        });
        if own {
            debug!(type_map = %plan.key(), "Reusing type map under construction");
        } else if building {
            warn!(
                type_map = %plan.key(),
                "Reusing type map still under construction by another thread"
            );
        } else {
            plan.wait_ready();
        }
        plan
    }
}

/// Tracks a build on the current thread and publishes the plan when done.
/// A panicking build is removed from the store before waiters are released.
struct BuildGuard<'a> {
    store: &'a TypeMapStore,
    plan: Arc<TypeMapPlan>,
}

impl<'a> BuildGuard<'a> {
    fn enter(store: &'a TypeMapStore, plan: &Arc<TypeMapPlan>) -> Self {
        BUILD_STACK.with(|stack| stack.borrow_mut().push(plan.key().clone()));
        Self {
            store,
            plan: plan.clone(),
        }
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        BUILD_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        if std::thread::panicking() {
            warn!(type_map = %self.plan.key(), "Type map build panicked, discarded");
            let mut plans = lock::write(&self.store.plans);
            if plans
                .get(self.plan.key())
                .is_some_and(|cached| Arc::ptr_eq(cached, &self.plan))
            {
                plans.remove(self.plan.key());
            }
        }
        self.plan.mark_ready();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(source: &str, destination: &str) -> TypeMapKey {
        TypeMapKey::new(source.into(), destination.into(), None)
    }

    #[test]
    fn test_builds_once() {
        let store = TypeMapStore::new();
        let builds = AtomicUsize::new(0);

        let first = store.get_or_build(&key("A", "B"), |_| {
            builds.fetch_add(1, Ordering::SeqCst);
        });
        let second = store.get_or_build(&key("A", "B"), |_| {
            builds.fetch_add(1, Ordering::SeqCst);
        });

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(first.is_ready());
    }

    #[test]
    fn test_names_are_part_of_the_key() {
        let store = TypeMapStore::new();
        let plain = store.get_or_build(&key("A", "B"), |_| {});
        let named = store.get_or_build(
            &TypeMapKey::new("A".into(), "B".into(), Some("short".to_string())),
            |_| {},
        );

        assert!(!Arc::ptr_eq(&plain, &named));
        assert_eq!(store.len(), 2);
        assert!(store.get(&key("B", "A")).is_none());
    }

    #[test]
    fn test_recursive_request_returns_plan_in_construction() {
        let store = TypeMapStore::new();
        let outer = store.get_or_build(&key("Node", "NodeDto"), |plan| {
            let inner = store.get_or_build(&key("Node", "NodeDto"), |_| {
                panic!("must not build twice");
            });
            assert!(Arc::ptr_eq(plan, &inner));
            assert!(!inner.is_ready());
        });
        assert!(outer.is_ready());
    }

    #[test]
    fn test_concurrent_requests_share_one_plan() {
        let store = TypeMapStore::new();
        let builds = AtomicUsize::new(0);

        let plans: Vec<Arc<TypeMapPlan>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        store.get_or_build(&key("A", "B"), |_| {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(20));
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(plans.iter().all(|p| Arc::ptr_eq(p, &plans[0]) && p.is_ready()));
    }

    #[test]
    fn test_all_is_sorted() {
        let store = TypeMapStore::new();
        store.get_or_build(&key("B", "C"), |_| {});
        store.get_or_build(&key("A", "C"), |_| {});

        let sources: Vec<String> = store
            .all()
            .iter()
            .map(|p| p.key().source.to_string())
            .collect();
        assert_eq!(sources, vec!["A", "B"]);
    }

    #[test]
    fn test_all_waits_for_plans_in_construction() {
        let store = TypeMapStore::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                store.get_or_build(&key("A", "B"), |_| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                });
            });

            started_rx.recv().unwrap();
            let plans = store.all();
            assert_eq!(plans.len(), 1);
            assert!(plans[0].is_ready());
        });
    }

    #[test]
    fn test_panicking_build_is_discarded() {
        let store = TypeMapStore::new();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            store.get_or_build(&key("A", "B"), |_| panic!("descriptor lookup failed"));
        }));
        assert!(outcome.is_err());
        assert!(store.get(&key("A", "B")).is_none());
        assert_eq!(store.len(), 0);

        let builds = AtomicUsize::new(0);
        let rebuilt = store.get_or_build(&key("A", "B"), |_| {
            builds.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(rebuilt.is_ready());
    }

    #[test]
    fn test_waiters_rebuild_after_panicking_build() {
        let store = TypeMapStore::new();
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let builds = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            let failing = scope.spawn(|| {
                store.get_or_build(&key("A", "B"), |_| {
                    started_tx.send(()).unwrap();
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    panic!("tokenizer failed");
                });
            });

            started_rx.recv().unwrap();
            let plan = store.get_or_build(&key("A", "B"), |_| {
                builds.fetch_add(1, Ordering::SeqCst);
            });
            assert!(plan.is_ready());
            assert!(failing.join().is_err());
        });

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }
}
