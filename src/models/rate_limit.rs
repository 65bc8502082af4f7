use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AppError, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-identity upload cooldown
///
/// Remembers the last accepted upload of every identity (unix millis) and
/// rejects a new one until the window has elapsed. Process-local: the map is
/// unbounded and lost on restart.
#[derive(Debug)]
pub struct CooldownTracker {
    window_ms: i64,
    last_upload: Mutex<HashMap<String, i64>>,
}

impl CooldownTracker {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_ms: window_secs * 1000,
            last_upload: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the identity's slot for an upload starting at `now_ms`
    ///
    /// Check and claim happen under one lock, so concurrent uploads from the
    /// same identity cannot both pass. Returns Err(CooldownActive) with the
    /// remaining whole minutes, rounded up. The claim is undone when the
    /// reservation drops without [`CooldownReservation::commit`].
    pub fn reserve(&self, identity: &str, now_ms: i64) -> Result<CooldownReservation<'_>> {
        let mut last_upload = lock(&self.last_upload);
        let previous = last_upload.get(identity).copied();

        if let Some(last) = previous {
            let elapsed = now_ms - last;
            if elapsed < self.window_ms {
                let remaining_ms = self.window_ms - elapsed;
                let remaining_minutes = (remaining_ms + 59_999) / 60_000;
                tracing::warn!(
                    "Upload cooldown active for {}: {} minutes remaining",
                    identity,
                    remaining_minutes
                );
                return Err(AppError::CooldownActive { remaining_minutes });
            }
        }

        last_upload.insert(identity.to_string(), now_ms);
        Ok(CooldownReservation {
            tracker: self,
            identity: identity.to_string(),
            previous,
            committed: false,
        })
    }
}

/// A claimed cooldown slot; restores the previous state on drop unless committed
#[derive(Debug)]
pub struct CooldownReservation<'a> {
    tracker: &'a CooldownTracker,
    identity: String,
    previous: Option<i64>,
    committed: bool,
}

impl CooldownReservation<'_> {
    /// Keep the slot: the upload was accepted
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for CooldownReservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut last_upload = lock(&self.tracker.last_upload);
        match self.previous {
            Some(previous) => {
                last_upload.insert(self.identity.clone(), previous);
            }
            None => {
                last_upload.remove(&self.identity);
            }
        }
    }
}

/// Names currently being submitted
///
/// A name is held by an [`InFlightGuard`] and released when the guard drops,
/// whatever the outcome of the submission.
#[derive(Debug, Default)]
pub struct InFlightSet {
    names: Mutex<HashSet<String>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `name`, failing with UploadInProgress if another submission holds it
    pub fn try_acquire(self: &Arc<Self>, name: &str) -> Result<InFlightGuard> {
        if !lock(&self.names).insert(name.to_string()) {
            tracing::warn!("Upload already in progress for {}", name);
            return Err(AppError::UploadInProgress);
        }

        Ok(InFlightGuard {
            set: Arc::clone(self),
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        lock(&self.names).contains(name)
    }

    pub fn len(&self) -> usize {
        lock(&self.names).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its name from the [`InFlightSet`] on drop
#[derive(Debug)]
pub struct InFlightGuard {
    set: Arc<InFlightSet>,
    name: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set.names).remove(&self.name);
    }
}

/// Last config accepted per identity, for the one-config-per-user policy
#[derive(Debug, Default)]
pub struct SubmitterRegistry {
    by_identity: Mutex<HashMap<String, String>>,
}

impl SubmitterRegistry {
    pub fn config_for(&self, identity: &str) -> Option<String> {
        lock(&self.by_identity).get(identity).cloned()
    }

    pub fn record(&self, identity: &str, config_id: &str) {
        lock(&self.by_identity).insert(identity.to_string(), config_id.to_string());
    }
}

/// All in-memory upload state shared by the submission pipeline
#[derive(Debug)]
pub struct UploadTrackers {
    pub cooldown: CooldownTracker,
    pub in_flight: Arc<InFlightSet>,
    /// Keyed by GitHub user id
    pub users: SubmitterRegistry,
    /// Keyed by client IP
    pub addresses: SubmitterRegistry,
}

impl UploadTrackers {
    pub fn new(cooldown_secs: i64) -> Self {
        Self {
            cooldown: CooldownTracker::new(cooldown_secs),
            in_flight: Arc::new(InFlightSet::new()),
            users: SubmitterRegistry::default(),
            addresses: SubmitterRegistry::default(),
        }
    }
}
