//! Runtime loader: brings an external runtime up once and shares it.
//!
//! The loader owns a single slot:
//!
//! ```text
//! Uninitialized ──acquire──▶ Pending(shared future) ──▶ Ready(Arc<R>)
//!                                     │
//!                                     └──────────────▶ Failed(ExecError)
//! ```
//!
//! Every caller that arrives while the slot is `Pending` awaits the same
//! shared future, so the host sees exactly one injection and one
//! initialization. The slot lock is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use playground_core::config::FailurePolicy;

use crate::error::ExecError;

/// Host-side contract of an external runtime.
#[async_trait]
pub trait RuntimeHost: Send + Sync + 'static {
    /// Initialized runtime handle.
    type Runtime: Send + Sync + 'static;
    /// Whatever `initialize` needs from the bootstrap entry point.
    type Entry: Send + 'static;

    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    /// The bootstrap entry point, if the host already provides it.
    fn entry_point(&self) -> Option<Self::Entry>;

    /// Locate or inject the loader resource and wait until it is ready.
    /// Must attach to an existing resource rather than duplicate it.
    async fn inject_loader(&self) -> Result<(), ExecError>;

    /// Bring the runtime up from its entry point.
    async fn initialize(&self, entry: Self::Entry) -> Result<Self::Runtime, ExecError>;

    /// Whether a resolved runtime can still serve requests.
    fn is_healthy(&self, _runtime: &Self::Runtime) -> bool {
        true
    }
}

/// Snapshot of the loader slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderState {
    Uninitialized,
    Pending,
    Ready,
    Failed(ExecError),
}

type LoadFuture<R> = Shared<BoxFuture<'static, Result<Arc<R>, ExecError>>>;

enum Slot<R> {
    Uninitialized,
    Pending { attempt: u64, future: LoadFuture<R> },
    Ready(Arc<R>),
    Failed(ExecError),
}

pub struct RuntimeLoader<H: RuntimeHost> {
    host: Arc<H>,
    slot: Mutex<Slot<H::Runtime>>,
    attempts: Mutex<u64>,
    policy: FailurePolicy,
}

impl<H: RuntimeHost> RuntimeLoader<H> {
    pub fn new(host: H, policy: FailurePolicy) -> Self {
        Self {
            host: Arc::new(host),
            slot: Mutex::new(Slot::Uninitialized),
            attempts: Mutex::new(0),
            policy,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn state(&self) -> LoaderState {
        match &*self.lock_slot() {
            Slot::Uninitialized => LoaderState::Uninitialized,
            Slot::Pending { .. } => LoaderState::Pending,
            Slot::Ready(_) => LoaderState::Ready,
            Slot::Failed(err) => LoaderState::Failed(err.clone()),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<H::Runtime>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_attempt(&self) -> u64 {
        let mut attempts = self.attempts.lock().unwrap_or_else(PoisonError::into_inner);
        *attempts += 1;
        *attempts
    }

    /// Resolve the shared runtime, starting the bootstrap if nobody has yet.
    pub async fn acquire(&self) -> Result<Arc<H::Runtime>, ExecError> {
        let (attempt, future) = {
            let mut slot = self.lock_slot();
            let in_flight = match &*slot {
                Slot::Ready(runtime) if self.host.is_healthy(runtime) => {
                    return Ok(runtime.clone());
                }
                Slot::Failed(err) if self.policy == FailurePolicy::CacheFailure => {
                    return Err(err.clone());
                }
                Slot::Pending { attempt, future } => Some((*attempt, future.clone())),
                Slot::Ready(_) => {
                    tracing::warn!(runtime = self.host.name(), "runtime is no longer healthy, reloading");
                    None
                }
                Slot::Uninitialized | Slot::Failed(_) => None,
            };
            match in_flight {
                Some(joined) => joined,
                None => {
                    let attempt = self.next_attempt();
                    let future = bootstrap(self.host.clone()).boxed().shared();
                    *slot = Slot::Pending {
                        attempt,
                        future: future.clone(),
                    };
                    tracing::debug!(runtime = self.host.name(), attempt, "runtime bootstrap started");
                    (attempt, future)
                }
            }
        };
        self.settle(attempt, future.await)
    }

    /// Record the outcome of `attempt`, unless a newer attempt replaced it.
    fn settle(
        &self,
        attempt: u64,
        result: Result<Arc<H::Runtime>, ExecError>,
    ) -> Result<Arc<H::Runtime>, ExecError> {
        let mut slot = self.lock_slot();
        if matches!(&*slot, Slot::Pending { attempt: current, .. } if *current == attempt) {
            *slot = match &result {
                Ok(runtime) => {
                    crate::info_log!(runtime = self.host.name(), "runtime ready");
                    Slot::Ready(runtime.clone())
                }
                Err(err) => {
                    tracing::warn!(runtime = self.host.name(), error = %err, "runtime load failed");
                    Slot::Failed(err.clone())
                }
            };
        }
        result
    }
}

async fn bootstrap<H: RuntimeHost>(host: Arc<H>) -> Result<Arc<H::Runtime>, ExecError> {
    let entry = match host.entry_point() {
        Some(entry) => entry,
        None => {
            host.inject_loader().await?;
            host.entry_point().ok_or_else(|| {
                ExecError::RuntimeUnavailable(format!(
                    "{} runtime is unavailable on this host.",
                    host.name()
                ))
            })?
        }
    };
    let runtime = host.initialize(entry).await?;
    Ok(Arc::new(runtime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeHost {
        preinstalled: bool,
        injected: AtomicBool,
        injections: AtomicUsize,
        initializations: AtomicUsize,
        inject_provides_entry: bool,
        fail_initialize: AtomicBool,
        healthy: AtomicBool,
    }

    impl FakeHost {
        fn working() -> Self {
            Self {
                inject_provides_entry: true,
                healthy: AtomicBool::new(true),
                ..Default::default()
            }
        }
    }

    struct FakeRuntime {
        serial: usize,
    }

    #[async_trait]
    impl RuntimeHost for FakeHost {
        type Runtime = FakeRuntime;
        type Entry = ();

        fn name(&self) -> &str {
            "Fake"
        }

        fn entry_point(&self) -> Option<()> {
            (self.preinstalled || self.injected.load(Ordering::SeqCst)).then_some(())
        }

        async fn inject_loader(&self) -> Result<(), ExecError> {
            self.injections.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.inject_provides_entry {
                self.injected.store(true, Ordering::SeqCst);
            }
            Ok(())
        }

        async fn initialize(&self, _entry: ()) -> Result<FakeRuntime, ExecError> {
            let serial = self.initializations.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if self.fail_initialize.load(Ordering::SeqCst) {
                return Err(ExecError::RuntimeLoadFailed("Failed to load Fake runtime.".into()));
            }
            Ok(FakeRuntime { serial })
        }

        fn is_healthy(&self, _runtime: &FakeRuntime) -> bool {
            self.healthy.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_concurrent_acquire_shares_one_bootstrap() {
        let loader = RuntimeLoader::new(FakeHost::working(), FailurePolicy::default());
        let handles = join_all((0..8).map(|_| loader.acquire())).await;
        let handles: Vec<_> = handles.into_iter().map(Result::unwrap).collect();

        assert_eq!(loader.host().injections.load(Ordering::SeqCst), 1);
        assert_eq!(loader.host().initializations.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(loader.state(), LoaderState::Ready);

        let later = loader.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&later, &handles[0]));
        assert_eq!(loader.host().initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_preinstalled_entry_skips_injection() {
        let host = FakeHost {
            preinstalled: true,
            ..FakeHost::working()
        };
        let loader = RuntimeLoader::new(host, FailurePolicy::default());
        loader.acquire().await.unwrap();
        assert_eq!(loader.host().injections.load(Ordering::SeqCst), 0);
        assert_eq!(loader.host().initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_unavailable() {
        let host = FakeHost {
            inject_provides_entry: false,
            ..FakeHost::working()
        };
        let loader = RuntimeLoader::new(host, FailurePolicy::CacheFailure);
        let err = loader.acquire().await.err().unwrap();
        assert!(matches!(err, ExecError::RuntimeUnavailable(_)));
        assert_eq!(loader.host().initializations.load(Ordering::SeqCst), 0);
        assert_eq!(loader.state(), LoaderState::Failed(err));
    }

    #[tokio::test]
    async fn test_cached_failure_is_not_retried() {
        let host = FakeHost::working();
        host.fail_initialize.store(true, Ordering::SeqCst);
        let loader = RuntimeLoader::new(host, FailurePolicy::CacheFailure);

        let first = loader.acquire().await.err().unwrap();
        loader.host().fail_initialize.store(false, Ordering::SeqCst);
        let second = loader.acquire().await.err().unwrap();

        assert_eq!(first, second);
        assert!(matches!(first, ExecError::RuntimeLoadFailed(_)));
        assert_eq!(loader.host().initializations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_retried_on_next_call() {
        let host = FakeHost::working();
        host.fail_initialize.store(true, Ordering::SeqCst);
        let loader = RuntimeLoader::new(host, FailurePolicy::RetryOnNextCall);

        assert!(loader.acquire().await.is_err());
        assert!(matches!(loader.state(), LoaderState::Failed(_)));

        loader.host().fail_initialize.store(false, Ordering::SeqCst);
        let runtime = loader.acquire().await.unwrap();
        assert_eq!(runtime.serial, 2);
        assert_eq!(loader.state(), LoaderState::Ready);
        // The injected entry point is reused by the second attempt.
        assert_eq!(loader.host().injections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_runtime_is_reloaded() {
        let loader = RuntimeLoader::new(FakeHost::working(), FailurePolicy::default());
        let first = loader.acquire().await.unwrap();
        loader.host().healthy.store(false, Ordering::SeqCst);
        let second = loader.acquire().await.unwrap();
        loader.host().healthy.store(true, Ordering::SeqCst);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.serial, 2);
    }
}
