//! Process-wide typed event bus plus per-emitter local subscriber lists
//! (spec §5, §6, §9).
//!
//! The teacher erases heterogeneous values behind `Any` and downcasts at
//! dispatch everywhere it needs an extensible registry keyed by type
//! (`impl_serdeany!` for fuzzer metadata in `evm::abi`/`mutation_utils`).
//! The event bus applies the same "erase, downcast at dispatch" shape to
//! subscriber callbacks instead of metadata values: the global map is keyed
//! by `TypeId` (a stringified type name, conceptually) to a list of erased
//! callbacks, guarded by its own mutex, and lives for process lifetime.
//!
//! Subscribers are invoked synchronously, on the publishing thread, in
//! registration order; an error from any subscriber short-circuits the
//! remaining subscribers for that `publish` call and propagates to the
//! publisher.

use crate::error::FuzzResult;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::marker::PhantomData;

type ErasedCallback = Box<dyn Fn(&dyn Any) -> FuzzResult<()> + Send + Sync>;

static GLOBAL_SUBSCRIBERS: Lazy<Mutex<HashMap<TypeId, Vec<ErasedCallback>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Register a process-lifetime subscriber for events of type `T`.
pub fn subscribe_global<T>(callback: impl Fn(&T) -> FuzzResult<()> + Send + Sync + 'static)
where
    T: Any + 'static,
{
    let erased: ErasedCallback = Box::new(move |any_event: &dyn Any| {
        let event = any_event
            .downcast_ref::<T>()
            .expect("event bus dispatched wrong payload type");
        callback(event)
    });
    GLOBAL_SUBSCRIBERS
        .lock()
        .entry(TypeId::of::<T>())
        .or_default()
        .push(erased);
}

fn publish_global<T: Any + 'static>(event: &T) -> FuzzResult<()> {
    // Held across dispatch: subscriber callbacks in this crate never
    // publish to the same event type from within their own handler.
    let guard = GLOBAL_SUBSCRIBERS.lock();
    if let Some(callbacks) = guard.get(&TypeId::of::<T>()) {
        for callback in callbacks {
            callback(event)?;
        }
    }
    Ok(())
}

/// Per-instance emitter. Each call site that needs to publish events of
/// type `T` owns one of these; publishing fans out to this emitter's own
/// local subscribers first, then to the global subscribers for `T`.
pub struct Emitter<T> {
    locals: Mutex<Vec<ErasedCallback>>,
    _marker: PhantomData<T>,
}

impl<T: Any + 'static> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Any + 'static> Emitter<T> {
    pub fn new() -> Self {
        Self {
            locals: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    pub fn subscribe(&self, callback: impl Fn(&T) -> FuzzResult<()> + Send + Sync + 'static) {
        let erased: ErasedCallback = Box::new(move |any_event: &dyn Any| {
            let event = any_event
                .downcast_ref::<T>()
                .expect("event bus dispatched wrong payload type");
            callback(event)
        });
        self.locals.lock().push(erased);
    }

    /// Publish one event: every local subscriber runs first (in
    /// registration order), then every global subscriber for `T`. The
    /// first error from either short-circuits the rest.
    pub fn publish(&self, event: T) -> FuzzResult<()> {
        {
            let locals = self.locals.lock();
            for callback in locals.iter() {
                callback(&event)?;
            }
        }
        publish_global(&event)
    }
}

impl<T> Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("local_subscribers", &self.locals.lock().len())
            .finish()
    }
}

// ---------------------------------------------------------------------
// Typed lifecycle events published on the event stream to the (external)
// API layer (spec §6).
// ---------------------------------------------------------------------

use crate::testcase::TestCaseStatus;
use crate::types::EVMAddress;

#[derive(Debug, Clone)]
pub struct ContractAdded {
    pub name: String,
    pub address: EVMAddress,
}

#[derive(Debug, Clone)]
pub struct ContractDeleted {
    pub name: String,
    pub address: EVMAddress,
}

#[derive(Debug, Clone)]
pub struct WorkerChainCreated {
    pub worker_id: usize,
}

#[derive(Debug, Clone)]
pub struct WorkerChainSetup {
    pub worker_id: usize,
    pub deployed_contracts: Vec<EVMAddress>,
}

#[derive(Debug, Clone)]
pub struct CallSequenceTesting {
    pub worker_id: usize,
    pub sequence_len: usize,
}

#[derive(Debug, Clone)]
pub struct CallSequenceTested {
    pub worker_id: usize,
    pub sequence_len: usize,
    pub new_coverage_bits: usize,
}

#[derive(Debug, Clone)]
pub struct TestCaseStatusChanged {
    pub test_case_id: String,
    pub old_status: TestCaseStatus,
    pub new_status: TestCaseStatus,
}

#[derive(Debug, Clone)]
pub struct FuzzerStopped {
    pub exit_code: i32,
    pub failed_tests: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct EventA(u32);
    #[derive(Debug, Clone)]
    struct EventB(u32);

    #[test]
    fn delivers_to_every_local_and_global_subscriber_exactly_n_times() {
        let global_a = Arc::new(AtomicUsize::new(0));
        let global_b = Arc::new(AtomicUsize::new(0));
        {
            let g = global_a.clone();
            subscribe_global::<EventA>(move |_| {
                g.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let g = global_b.clone();
            subscribe_global::<EventB>(move |_| {
                g.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let emitter_a1: Emitter<EventA> = Emitter::new();
        let emitter_a2: Emitter<EventA> = Emitter::new();
        let emitter_b1: Emitter<EventB> = Emitter::new();
        let emitter_b2: Emitter<EventB> = Emitter::new();

        let local_a1 = Arc::new(AtomicUsize::new(0));
        let local_a2 = Arc::new(AtomicUsize::new(0));
        let local_b1 = Arc::new(AtomicUsize::new(0));
        let local_b2 = Arc::new(AtomicUsize::new(0));

        {
            let l = local_a1.clone();
            emitter_a1.subscribe(move |_| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let l = local_a2.clone();
            emitter_a2.subscribe(move |_| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let l = local_b1.clone();
            emitter_b1.subscribe(move |_| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let l = local_b2.clone();
            emitter_b2.subscribe(move |_| {
                l.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        for _ in 0..2 {
            emitter_a1.publish(EventA(1)).unwrap();
        }
        for _ in 0..5 {
            emitter_a2.publish(EventA(2)).unwrap();
        }
        for _ in 0..9 {
            emitter_b1.publish(EventB(1)).unwrap();
        }
        for _ in 0..13 {
            emitter_b2.publish(EventB(2)).unwrap();
        }

        assert_eq!(local_a1.load(Ordering::SeqCst), 2);
        assert_eq!(local_a2.load(Ordering::SeqCst), 5);
        assert_eq!(local_b1.load(Ordering::SeqCst), 9);
        assert_eq!(local_b2.load(Ordering::SeqCst), 13);
        assert_eq!(global_a.load(Ordering::SeqCst), 7);
        assert_eq!(global_b.load(Ordering::SeqCst), 22);
    }

    #[test]
    fn subscriber_error_short_circuits_publish() {
        #[derive(Debug, Clone)]
        struct EventC(u32);
        let calls = Arc::new(AtomicUsize::new(0));
        let emitter: Emitter<EventC> = Emitter::new();
        emitter.subscribe(|_| Err(crate::error::FuzzError::config("boom")));
        {
            let c = calls.clone();
            emitter.subscribe(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        let result = emitter.publish(EventC(0));
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
