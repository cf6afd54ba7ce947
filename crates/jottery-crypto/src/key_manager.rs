//! In-memory master key lifecycle.
//!
//! States: uninitialized → unlocked → locked → unlocked …, with a terminal
//! wiped state after a full-store delete. The key is the single piece of
//! process-wide mutable state; consumers must call [`KeyManager::master_key`]
//! per operation and never cache the result across operations.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use jottery_core::{Error, Result};

use crate::kdf::DerivedKey;

#[derive(Debug)]
enum KeyState {
    Uninitialized,
    Unlocked(DerivedKey),
    Locked,
    Wiped,
}

struct Inner {
    state: KeyState,
    last_activity: Instant,
    auto_lock: Option<Duration>,
}

/// Holds the master key in volatile memory and enforces auto-lock.
///
/// Clones share state; the manager is the only component allowed to own
/// the raw key.
#[derive(Clone)]
pub struct KeyManager {
    inner: Arc<Mutex<Inner>>,
}

impl KeyManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: KeyState::Uninitialized,
                last_activity: Instant::now(),
                auto_lock: None,
            })),
        }
    }

    fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned mutex means a panic mid-transition; treating the key
        // as still present would be worse than continuing.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a freshly derived key (successful unlock or init).
    ///
    /// Fails on a wiped manager: a wiped store must be re-created, not
    /// re-unlocked.
    pub fn install(&self, key: DerivedKey) -> Result<()> {
        let mut inner = self.lock_inner();
        if matches!(inner.state, KeyState::Wiped) {
            return Err(Error::Locked);
        }
        inner.state = KeyState::Unlocked(key);
        inner.last_activity = Instant::now();
        Ok(())
    }

    /// Get a copy of the master key, applying auto-lock lazily.
    ///
    /// Returns `Locked` from every state that has no key.
    pub fn master_key(&self) -> Result<DerivedKey> {
        let mut inner = self.lock_inner();
        if let Some(timeout) = inner.auto_lock {
            if inner.last_activity.elapsed() > timeout
                && matches!(inner.state, KeyState::Unlocked(_))
            {
                inner.state = KeyState::Locked;
            }
        }
        match &inner.state {
            KeyState::Unlocked(key) => Ok(key.clone()),
            _ => Err(Error::Locked),
        }
    }

    /// Zeroize the key and transition to locked.
    pub fn lock(&self) {
        let mut inner = self.lock_inner();
        if !matches!(inner.state, KeyState::Wiped) {
            // Dropping the Unlocked variant zeroizes the key bytes.
            inner.state = KeyState::Locked;
        }
    }

    /// Terminal transition after a full-store wipe.
    pub fn wipe(&self) {
        let mut inner = self.lock_inner();
        inner.state = KeyState::Wiped;
    }

    pub fn is_locked(&self) -> bool {
        self.master_key().is_err()
    }

    /// Reset the auto-lock timer. Called by the shell on user activity.
    pub fn register_activity(&self) {
        let mut inner = self.lock_inner();
        inner.last_activity = Instant::now();
    }

    /// Set the auto-lock timeout in minutes; 0 disables auto-lock.
    pub fn set_timeout(&self, minutes: u64) {
        let mut inner = self.lock_inner();
        inner.auto_lock = if minutes == 0 {
            None
        } else {
            Some(Duration::from_secs(minutes * 60))
        };
    }

    /// Whether the inactivity deadline has passed while a key is present.
    pub fn should_lock(&self) -> bool {
        let inner = self.lock_inner();
        match (inner.auto_lock, &inner.state) {
            (Some(timeout), KeyState::Unlocked(_)) => inner.last_activity.elapsed() > timeout,
            _ => false,
        }
    }

    /// Time remaining until auto-lock, if enabled.
    pub fn time_until_lock(&self) -> Option<Duration> {
        let inner = self.lock_inner();
        inner
            .auto_lock
            .map(|timeout| timeout.saturating_sub(inner.last_activity.elapsed()))
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; 32])
    }

    #[test]
    fn test_starts_locked() {
        let manager = KeyManager::new();
        assert!(manager.is_locked());
        assert!(matches!(manager.master_key(), Err(Error::Locked)));
    }

    #[test]
    fn test_install_lock_cycle() {
        let manager = KeyManager::new();
        manager.install(key(1)).unwrap();
        assert!(!manager.is_locked());
        assert_eq!(manager.master_key().unwrap().as_bytes(), &[1u8; 32]);

        manager.lock();
        assert!(manager.is_locked());

        manager.install(key(2)).unwrap();
        assert_eq!(manager.master_key().unwrap().as_bytes(), &[2u8; 32]);
    }

    #[test]
    fn test_wipe_is_terminal() {
        let manager = KeyManager::new();
        manager.install(key(1)).unwrap();
        manager.wipe();
        assert!(manager.is_locked());
        assert!(manager.install(key(2)).is_err());
        assert!(manager.is_locked());
    }

    #[test]
    fn test_auto_lock_expires_on_access() {
        let manager = KeyManager::new();
        manager.install(key(1)).unwrap();
        {
            let mut inner = manager.inner.lock().unwrap();
            inner.auto_lock = Some(Duration::from_millis(30));
        }
        assert!(!manager.is_locked());
        thread::sleep(Duration::from_millis(60));
        assert!(manager.should_lock());
        assert!(matches!(manager.master_key(), Err(Error::Locked)));
    }

    #[test]
    fn test_activity_resets_deadline() {
        let manager = KeyManager::new();
        manager.install(key(1)).unwrap();
        {
            let mut inner = manager.inner.lock().unwrap();
            inner.auto_lock = Some(Duration::from_millis(80));
        }
        thread::sleep(Duration::from_millis(50));
        manager.register_activity();
        thread::sleep(Duration::from_millis(50));
        assert!(!manager.is_locked());
        thread::sleep(Duration::from_millis(100));
        assert!(manager.is_locked());
    }

    #[test]
    fn test_zero_timeout_disables_auto_lock() {
        let manager = KeyManager::new();
        manager.install(key(1)).unwrap();
        manager.set_timeout(0);
        thread::sleep(Duration::from_millis(30));
        assert!(!manager.should_lock());
        assert!(!manager.is_locked());
    }

    #[test]
    fn test_time_until_lock() {
        let manager = KeyManager::new();
        manager.set_timeout(1);
        manager.install(key(1)).unwrap();
        let remaining = manager.time_until_lock().unwrap();
        assert!(remaining <= Duration::from_secs(60));
        assert!(remaining > Duration::from_secs(55));
    }
}
