//! Per-requester cooldown tracking.
//!
//! Entries expire lazily: an expired entry is treated as absent and physically
//! removed on whichever access touches it next; there is no background sweep.
//! The window is fixed, measured from the last *successful* dispense — a
//! blocked request never extends it.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
enum Entry {
    /// Admission granted, submission not yet terminal. Present so two
    /// concurrent requests from one requester cannot both pass the
    /// blocked-check before either records a result.
    InFlight,
    /// A successful dispense happened; blocked until the stored instant.
    Expires(Instant),
}

#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoning panic cannot leave the map inconsistent (every write is
        // a single insert/remove), so recover instead of propagating.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// True iff a live (non-expired) entry exists for `id`.
    pub fn is_blocked(&self, id: &str) -> bool {
        let mut entries = self.lock();
        match entries.get(id) {
            Some(Entry::InFlight) => true,
            Some(Entry::Expires(expiry)) => {
                if *expiry > Instant::now() {
                    true
                } else {
                    entries.remove(id);
                    false
                }
            }
            None => false,
        }
    }

    /// Time until the entry for `id` expires; zero when absent or expired.
    pub fn remaining(&self, id: &str) -> Duration {
        let mut entries = self.lock();
        match entries.get(id) {
            Some(Entry::Expires(expiry)) => {
                let now = Instant::now();
                if *expiry > now {
                    *expiry - now
                } else {
                    entries.remove(id);
                    Duration::ZERO
                }
            }
            _ => Duration::ZERO,
        }
    }

    /// Insert or overwrite the entry for `id` with expiry = now + cooldown.
    pub fn mark_used(&self, id: &str, cooldown: Duration) {
        self.lock()
            .insert(id.to_string(), Entry::Expires(Instant::now() + cooldown));
    }

    /// Atomic admission decision: refuse when `id` is blocked or already has
    /// an admission in flight, returning the remaining wait; otherwise store
    /// an in-flight marker and hand back the guard that resolves it.
    ///
    /// The guard must be [`AdmissionGuard::commit`]ted on a successful
    /// dispense; dropping it uncommitted (any failure path) releases the
    /// marker so the requester may retry immediately.
    pub fn try_admit(&self, id: &str, cooldown: Duration) -> Result<AdmissionGuard<'_>, Duration> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(id) {
            Some(Entry::InFlight) => return Err(cooldown),
            Some(Entry::Expires(expiry)) if *expiry > now => return Err(*expiry - now),
            _ => {}
        }
        entries.insert(id.to_string(), Entry::InFlight);
        Ok(AdmissionGuard { limiter: self, id: id.to_string(), committed: false })
    }

    /// Number of live entries (evicts expired ones as a side effect).
    pub fn active(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| match entry {
            Entry::InFlight => true,
            Entry::Expires(expiry) => *expiry > now,
        });
        entries.len()
    }
}

/// Admission token for one requester, held across the chain submission.
#[derive(Debug)]
pub struct AdmissionGuard<'a> {
    limiter: &'a RateLimiter,
    id: String,
    committed: bool,
}

impl AdmissionGuard<'_> {
    /// Record the successful dispense: the in-flight marker becomes a real
    /// cooldown entry expiring `cooldown` from now.
    pub fn commit(mut self, cooldown: Duration) {
        self.limiter.mark_used(&self.id, cooldown);
        self.committed = true;
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let mut entries = self.limiter.lock();
            if matches!(entries.get(&self.id), Some(Entry::InFlight)) {
                entries.remove(&self.id);
            }
        }
    }
}
