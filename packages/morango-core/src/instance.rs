//! Process-wide instance identity and monotonic write counter.
//!
//! An [`InstanceId`] is minted once per process lifetime (a new one on every
//! cold start) and is paired with a [`Counter`] that is bumped atomically
//! whenever a batch of local writes is sealed. The pair is the unit that
//! [`crate::fsic`] and [`crate::store`] key off of.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot_compat::InstanceLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 32-hex-char lowercase UUID identifying one process lifetime.
///
/// Renders without hyphens to match the wire format.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Mints a fresh, random instance id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an existing 32-hex-char id (e.g. read back from storage).
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not exactly 32 lowercase hex characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidInstanceId> {
        let raw = raw.into();
        let valid = raw.len() == 32 && raw.bytes().all(|b| b.is_ascii_hexdigit()) && raw.chars().all(|c| !c.is_ascii_uppercase());
        if valid {
            Ok(Self(raw))
        } else {
            Err(InvalidInstanceId(raw))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised by [`InstanceId::parse`] when the input isn't a 32-hex-char id.
#[derive(Debug, thiserror::Error)]
#[error("invalid instance id: {0:?}")]
pub struct InvalidInstanceId(pub String);

/// Monotonic per-instance write counter. Starts at zero (no writes yet).
pub type Counter = u64;

/// Process-wide `(instance_id, counter)` pair.
///
/// Exactly one [`InstanceRegistry`] should exist per process. `bump` is
/// serialized against other bumps via an internal atomic; readers see a
/// point-in-time snapshot via [`InstanceRegistry::current`].
pub struct InstanceRegistry {
    instance_id: InstanceId,
    counter: AtomicU64,
    write_lock: InstanceLock,
}

impl InstanceRegistry {
    /// Creates a registry for a freshly-minted instance id, counter at 0.
    #[must_use]
    pub fn new(instance_id: InstanceId) -> Self {
        Self {
            instance_id,
            counter: AtomicU64::new(0),
            write_lock: InstanceLock::new(),
        }
    }

    /// Restores a registry from a previously-persisted `(instance_id, counter)`.
    #[must_use]
    pub fn restore(instance_id: InstanceId, counter: Counter) -> Self {
        Self {
            instance_id,
            counter: AtomicU64::new(counter),
            write_lock: InstanceLock::new(),
        }
    }

    /// Current `(instance_id, counter)` pair, without bumping.
    #[must_use]
    pub fn current(&self) -> (InstanceId, Counter) {
        (self.instance_id.clone(), self.counter.load(Ordering::SeqCst))
    }

    /// Atomically increments the counter and returns the new pair.
    ///
    /// Serialized against other bumps: callers race for an internal guard
    /// rather than relying on the atomic alone, so that "bump, then
    /// persist the RMC row under that counter" sequences observed by two
    /// callers never interleave.
    pub fn bump(&self) -> (InstanceId, Counter) {
        let _guard = self.write_lock.lock();
        let new_counter = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        (self.instance_id.clone(), new_counter)
    }

    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }
}

/// Tiny wrapper module so the writer-lock type used by [`InstanceRegistry`]
/// is named for what it does rather than imported as a bare `parking_lot::Mutex<()>`.
mod parking_lot_compat {
    use parking_lot::{Mutex, MutexGuard};

    pub struct InstanceLock(Mutex<()>);

    impl InstanceLock {
        pub fn new() -> Self {
            Self(Mutex::new(()))
        }

        pub fn lock(&self) -> MutexGuard<'_, ()> {
            self.0.lock()
        }
    }
}
