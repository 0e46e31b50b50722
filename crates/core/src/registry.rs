//! Per-identity engine slots with at-most-once resolution.
//!
//! Each slot moves `Unresolved -> Resolving -> Present | Absent` and never goes
//! back, except that an in-flight non-blocking resolution that is cancelled
//! resets the slot to `Unresolved` so the next caller can retry.

use crate::config::HybridConfig;
use crate::engine::{Engine, EngineId, EngineLoader, NativeLoader, ReferenceLoader};
use crate::error::{HybridError, LoadFailure, Unavailable};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Observable state of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Nobody asked for the engine yet.
    Unresolved,
    /// A non-blocking resolution is in flight.
    Resolving,
    /// Resolution completed without a handle.
    Absent(LoadFailure),
    /// A handle exists.
    Present {
        /// Whether blocking callers can use it.
        blocking: bool,
    },
}

enum SlotState {
    Unresolved,
    Resolving(watch::Receiver<bool>),
    Absent(LoadFailure),
    Present(Arc<dyn Engine>),
}

struct Slot {
    loader: Arc<dyn EngineLoader>,
    state: Mutex<SlotState>,
    attempts: AtomicUsize,
}

impl Slot {
    fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            state: Mutex::new(SlotState::Unresolved),
            attempts: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // A panic while holding the lock never leaves a half-written state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, outcome: Result<Arc<dyn Engine>, LoadFailure>) -> SlotState {
        match outcome {
            Ok(engine) if engine.is_available() => SlotState::Present(engine),
            Ok(_) => SlotState::Absent(LoadFailure::Disabled),
            Err(failure) => SlotState::Absent(failure),
        }
    }
}

enum Next {
    Ready(Result<Arc<dyn Engine>, LoadFailure>),
    Wait(watch::Receiver<bool>),
    Load(watch::Sender<bool>),
}

/// Resets a slot left in `Resolving` when the loading future is dropped
/// before it settles.
struct ResolveGuard<'a> {
    slot: &'a Slot,
    armed: bool,
}

impl Drop for ResolveGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.slot.lock() = SlotState::Unresolved;
        }
    }
}

/// Owns both engine slots.
///
/// A registry belongs to one [`Compiler`](crate::Compiler); independent
/// registries share nothing.
pub struct EngineRegistry {
    slots: [Slot; 2],
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("reference", &self.status(EngineId::Reference))
            .field("native", &self.status(EngineId::Native))
            .finish()
    }
}

impl EngineRegistry {
    /// Registry with the standard loaders for `config`.
    pub fn from_config(config: &HybridConfig) -> Self {
        Self::with_loaders(
            Arc::new(ReferenceLoader),
            Arc::new(NativeLoader::from_config(config)),
        )
    }

    /// Registry with custom loaders.
    ///
    /// Each loader must report the identity of the slot it is given:
    /// `reference.name()` is [`EngineId::Reference`] and `native.name()` is
    /// [`EngineId::Native`]. Slots are keyed by position, so a swapped loader
    /// would serve the wrong engine; debug builds panic on a mismatch.
    pub fn with_loaders(
        reference: Arc<dyn EngineLoader>,
        native: Arc<dyn EngineLoader>,
    ) -> Self {
        debug_assert_eq!(
            reference.name(),
            EngineId::Reference,
            "reference slot given a {} loader",
            reference.name()
        );
        debug_assert_eq!(
            native.name(),
            EngineId::Native,
            "native slot given a {} loader",
            native.name()
        );
        Self {
            slots: [Slot::new(reference), Slot::new(native)],
        }
    }

    fn slot(&self, id: EngineId) -> &Slot {
        &self.slots[id.index()]
    }

    /// Snapshot of a slot. Never triggers resolution.
    pub fn status(&self, id: EngineId) -> EngineStatus {
        match &*self.slot(id).lock() {
            SlotState::Unresolved => EngineStatus::Unresolved,
            SlotState::Resolving(_) => EngineStatus::Resolving,
            SlotState::Absent(failure) => EngineStatus::Absent(failure.clone()),
            SlotState::Present(engine) => EngineStatus::Present {
                blocking: engine.supports_blocking(),
            },
        }
    }

    /// How many times the slot's loader has been invoked.
    pub fn load_attempts(&self, id: EngineId) -> usize {
        self.slot(id).attempts.load(Ordering::SeqCst)
    }

    /// The handle, if the slot is already `Present`.
    pub fn cached(&self, id: EngineId) -> Option<Arc<dyn Engine>> {
        match &*self.slot(id).lock() {
            SlotState::Present(engine) => Some(Arc::clone(engine)),
            _ => None,
        }
    }

    fn begin(&self, slot: &Slot) -> Next {
        let mut state = slot.lock();
        match &*state {
            SlotState::Present(engine) => Next::Ready(Ok(Arc::clone(engine))),
            SlotState::Absent(failure) => Next::Ready(Err(failure.clone())),
            SlotState::Resolving(rx) => Next::Wait(rx.clone()),
            SlotState::Unresolved => {
                let (tx, rx) = watch::channel(false);
                *state = SlotState::Resolving(rx);
                Next::Load(tx)
            }
        }
    }

    async fn resolve_inner(&self, id: EngineId) -> Result<Arc<dyn Engine>, LoadFailure> {
        let slot = self.slot(id);
        loop {
            match self.begin(slot) {
                Next::Ready(result) => return result,
                Next::Wait(mut rx) => {
                    // A closed channel means the loader was dropped; re-check the slot.
                    let _ = rx.wait_for(|done| *done).await;
                }
                Next::Load(tx) => {
                    let mut guard = ResolveGuard { slot, armed: true };
                    slot.attempts.fetch_add(1, Ordering::SeqCst);
                    log::debug!("resolving {} engine", id);

                    let outcome = slot.loader.load().await;
                    if let Err(failure) = &outcome {
                        log::debug!("{} engine is absent: {}", id, failure);
                    }

                    *slot.lock() = slot.settle(outcome);
                    guard.armed = false;
                    tx.send_replace(true);
                }
            }
        }
    }

    /// Resolve from a non-blocking context.
    ///
    /// Concurrent callers for the same identity share a single load. A
    /// completed resolution, present or absent, is never repeated.
    pub async fn resolve(&self, id: EngineId) -> Result<Arc<dyn Engine>, HybridError> {
        self.resolve_inner(id)
            .await
            .map_err(|failure| HybridError::EngineUnavailable {
                engine: id,
                reason: Unavailable::Absent(failure),
            })
    }

    /// Whether the engine resolves to a handle. Triggers resolution.
    pub async fn is_available(&self, id: EngineId) -> bool {
        self.resolve_inner(id).await.is_ok()
    }

    /// Resolve from a blocking context.
    ///
    /// Never waits on a non-blocking load: while one is in flight either
    /// engine reports [`Unavailable::Loading`]. A native engine that has not
    /// been resolved yet reports [`Unavailable::NotPreloaded`]; a reference
    /// engine whose loader cannot load without suspending reports
    /// [`HybridError::SyncLoadUnsupported`].
    pub fn resolve_blocking(&self, id: EngineId) -> Result<Arc<dyn Engine>, HybridError> {
        let slot = self.slot(id);
        let mut state = slot.lock();

        match &*state {
            SlotState::Present(engine) if engine.supports_blocking() => {
                return Ok(Arc::clone(engine));
            }
            SlotState::Present(_) => return Err(HybridError::SyncLoadUnsupported { engine: id }),
            SlotState::Absent(failure) => {
                return Err(HybridError::EngineUnavailable {
                    engine: id,
                    reason: Unavailable::Absent(failure.clone()),
                });
            }
            SlotState::Resolving(_) => {
                return Err(HybridError::EngineUnavailable {
                    engine: id,
                    reason: Unavailable::Loading,
                });
            }
            SlotState::Unresolved => {}
        }

        match slot.loader.load_blocking() {
            Err(LoadFailure::BlockingUnsupported) => Err(match id {
                EngineId::Native => HybridError::EngineUnavailable {
                    engine: id,
                    reason: Unavailable::NotPreloaded,
                },
                EngineId::Reference => HybridError::SyncLoadUnsupported { engine: id },
            }),
            outcome => {
                slot.attempts.fetch_add(1, Ordering::SeqCst);
                *state = slot.settle(outcome);
                match &*state {
                    SlotState::Present(engine) if engine.supports_blocking() => {
                        Ok(Arc::clone(engine))
                    }
                    SlotState::Present(_) => Err(HybridError::SyncLoadUnsupported { engine: id }),
                    SlotState::Absent(failure) => Err(HybridError::EngineUnavailable {
                        engine: id,
                        reason: Unavailable::Absent(failure.clone()),
                    }),
                    SlotState::Unresolved | SlotState::Resolving(_) => {
                        Err(HybridError::SyncLoadUnsupported { engine: id })
                    }
                }
            }
        }
    }
}
