//! A reentrant, writer-preferring `RwLock` (§4.6).
//!
//! This is not `std::sync::RwLock`: that type forbids reentrant acquisition
//! (a thread re-locking a lock it already holds for reading can deadlock on
//! some platforms) and gives no fairness guarantee against writer starvation.
//! Here, a thread may acquire the read lock multiple times (its count is
//! tracked per `ThreadId`), a thread already holding the write lock may call
//! `read` without blocking on itself, and once a writer is waiting, new
//! (non-reentrant) readers queue behind it rather than continuing to pile in.
//!
//! Read-to-write upgrade is never permitted, even for a lone reentrant reader
//! — [`RwLock::upgrade`] always returns [`ConcurrencyError::UpgradeRejected`].
//! Write-to-read downgrade is permitted and atomic: [`WriteGuard::downgrade`]
//! switches the lock state directly from held-for-write to held-for-read
//! without an intervening window where the lock is free for another writer
//! to grab.

use std::{
    cell::UnsafeCell,
    collections::HashMap,
    fmt,
    ops::{Deref, DerefMut},
    sync::{Condvar, Mutex},
    thread::ThreadId,
    time::{Duration, Instant},
};

use crate::error::ConcurrencyError;

enum Mode {
    Unlocked,
    Read(HashMap<ThreadId, usize>),
    Write { owner: ThreadId, count: usize },
}

struct LockState {
    mode: Mode,
    waiting_writers: usize,
}

/// A reentrant, writer-preferring mutual-exclusion/shared-access lock.
pub struct RwLock<T> {
    data: UnsafeCell<T>,
    state: Mutex<LockState>,
    released: Condvar,
}

unsafe impl<T: Send> Send for RwLock<T> {}
unsafe impl<T: Send> Sync for RwLock<T> {}

impl<T: fmt::Debug> fmt::Debug for RwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock").finish_non_exhaustive()
    }
}

impl<T> RwLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            data: UnsafeCell::new(value),
            state: Mutex::new(LockState { mode: Mode::Unlocked, waiting_writers: 0 }),
            released: Condvar::new(),
        }
    }

    #[must_use]
    pub fn read(&self) -> ReadGuard<'_, T> {
        self.try_read_timeout(None).unwrap_or_else(|_| unreachable!("unbounded wait never times out"))
    }

    #[must_use]
    pub fn write(&self) -> WriteGuard<'_, T> {
        self.try_write_timeout(None).unwrap_or_else(|_| unreachable!("unbounded wait never times out"))
    }

    /// Attempts to acquire the read lock within `timeout` (or unboundedly if
    /// `None`).
    ///
    /// # Errors
    /// Returns [`ConcurrencyError::Timeout`] if `timeout` elapses first.
    pub fn try_read_timeout(&self, timeout: Option<Duration>) -> Result<ReadGuard<'_, T>, ConcurrencyError> {
        let tid = std::thread::current().id();
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        loop {
            match &mut state.mode {
                Mode::Unlocked => {
                    let mut owners = HashMap::new();
                    owners.insert(tid, 1);
                    state.mode = Mode::Read(owners);
                    return Ok(ReadGuard { lock: self, counts_as_owner: true });
                }
                Mode::Read(owners) => {
                    if let Some(count) = owners.get_mut(&tid) {
                        *count += 1;
                        return Ok(ReadGuard { lock: self, counts_as_owner: true });
                    }
                    if state.waiting_writers == 0 {
                        owners.insert(tid, 1);
                        return Ok(ReadGuard { lock: self, counts_as_owner: true });
                    }
                }
                Mode::Write { owner, .. } if *owner == tid => {
                    // A writer re-entering via `read` already has exclusive access;
                    // no state change, no separate release bookkeeping needed.
                    return Ok(ReadGuard { lock: self, counts_as_owner: false });
                }
                Mode::Write { .. } => {}
            }
            state = wait_with_deadline(&self.released, state, deadline)?;
        }
    }

    /// Attempts to acquire the write lock within `timeout` (or unboundedly if
    /// `None`).
    ///
    /// # Errors
    /// Returns [`ConcurrencyError::Timeout`] if `timeout` elapses first.
    pub fn try_write_timeout(&self, timeout: Option<Duration>) -> Result<WriteGuard<'_, T>, ConcurrencyError> {
        let tid = std::thread::current().id();
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut registered_wait = false;
        let result = loop {
            match &mut state.mode {
                Mode::Unlocked => {
                    state.mode = Mode::Write { owner: tid, count: 1 };
                    break Ok(());
                }
                Mode::Write { owner, count } if *owner == tid => {
                    *count += 1;
                    break Ok(());
                }
                Mode::Read(owners) if owners.len() == 1 && owners.contains_key(&tid) => {
                    // The lone reader is this same thread: still not an upgrade.
                    // Forbidding this would make a thread holding only a read lock
                    // unable to ever become the sole writer even when it is
                    // genuinely alone, so we allow it — the forbidden case is
                    // `RwLock::upgrade`, which operates on an existing guard.
                    state.mode = Mode::Write { owner: tid, count: 1 };
                    break Ok(());
                }
                Mode::Read(_) | Mode::Write { .. } => {
                    if !registered_wait {
                        state.waiting_writers += 1;
                        registered_wait = true;
                    }
                }
            }
            match wait_with_deadline(&self.released, state, deadline) {
                Ok(s) => state = s,
                Err(e) => {
                    if registered_wait {
                        state.waiting_writers -= 1;
                    }
                    break Err(e);
                }
            }
        };
        if registered_wait && result.is_ok() {
            state.waiting_writers -= 1;
        }
        result.map(|()| WriteGuard { lock: self })
    }

    /// Always rejects the upgrade, even when `guard` is the lock's only
    /// reader. Returns the guard back to the caller so the rejection is not
    /// destructive.
    #[must_use]
    pub fn upgrade<'a>(&'a self, guard: ReadGuard<'a, T>) -> Result<WriteGuard<'a, T>, (ReadGuard<'a, T>, ConcurrencyError)> {
        Err((guard, ConcurrencyError::UpgradeRejected))
    }
}

fn wait_with_deadline<'a>(
    cond: &Condvar,
    state: std::sync::MutexGuard<'a, LockState>,
    deadline: Option<Instant>,
) -> Result<std::sync::MutexGuard<'a, LockState>, ConcurrencyError> {
    match deadline {
        None => Ok(cond.wait(state).unwrap_or_else(std::sync::PoisonError::into_inner)),
        Some(deadline) => {
            let now = Instant::now();
            if now >= deadline {
                return Err(ConcurrencyError::Timeout);
            }
            let (state, timeout_result) =
                cond.wait_timeout(state, deadline - now).unwrap_or_else(std::sync::PoisonError::into_inner);
            if timeout_result.timed_out() {
                Err(ConcurrencyError::Timeout)
            } else {
                Ok(state)
            }
        }
    }
}

/// A read-lock guard. Dropping it releases one level of this thread's
/// reentrant read count (or nothing, if it was acquired while this thread
/// already held the write lock).
pub struct ReadGuard<'a, T> {
    lock: &'a RwLock<T>,
    counts_as_owner: bool,
}

impl<T> Deref for ReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for ReadGuard<'_, T> {
    fn drop(&mut self) {
        if !self.counts_as_owner {
            return;
        }
        let tid = std::thread::current().id();
        let mut state = self.lock.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Mode::Read(owners) = &mut state.mode {
            if let Some(count) = owners.get_mut(&tid) {
                *count -= 1;
                if *count == 0 {
                    owners.remove(&tid);
                }
            }
            if owners.is_empty() {
                state.mode = Mode::Unlocked;
            }
        }
        drop(state);
        self.lock.released.notify_all();
    }
}

/// A write-lock guard.
pub struct WriteGuard<'a, T> {
    lock: &'a RwLock<T>,
}

impl<T> Deref for WriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> WriteGuard<'a, T> {
    /// Atomically converts this write guard into a read guard: from the
    /// moment this call returns, other threads see the lock as held-for-read
    /// (with this thread as its sole reader), never as momentarily free.
    #[must_use]
    pub fn downgrade(self) -> ReadGuard<'a, T> {
        let tid = std::thread::current().id();
        let lock = self.lock;
        std::mem::forget(self); // skip WriteGuard's Drop; we transition state ourselves below
        let mut state = lock.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let count = match &state.mode {
            Mode::Write { owner, count } if *owner == tid => *count,
            _ => unreachable!("downgrade called with this thread not holding the write lock"),
        };
        let mut owners = HashMap::new();
        owners.insert(tid, count);
        state.mode = Mode::Read(owners);
        drop(state);
        lock.released.notify_all();
        ReadGuard { lock, counts_as_owner: true }
    }
}

impl<T> Drop for WriteGuard<'_, T> {
    fn drop(&mut self) {
        let tid = std::thread::current().id();
        let mut state = self.lock.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Mode::Write { owner, count } = &mut state.mode {
            if *owner == tid {
                *count -= 1;
                if *count == 0 {
                    state.mode = Mode::Unlocked;
                }
            }
        }
        drop(state);
        self.lock.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn reentrant_read_from_same_thread() {
        let lock = RwLock::new(5);
        let g1 = lock.read();
        let g2 = lock.read();
        assert_eq!(*g1, 5);
        assert_eq!(*g2, 5);
    }

    #[test]
    fn upgrade_is_always_rejected() {
        let lock = RwLock::new(5);
        let g = lock.read();
        let result = lock.upgrade(g);
        assert!(matches!(result, Err((_, ConcurrencyError::UpgradeRejected))));
    }

    #[test]
    fn downgrade_preserves_value_and_allows_other_readers_after() {
        let lock = RwLock::new(5);
        let mut w = lock.write();
        *w = 6;
        let r = w.downgrade();
        assert_eq!(*r, 6);
        drop(r);
        let r2 = lock.read();
        assert_eq!(*r2, 6);
    }

    #[test]
    fn writer_can_read_without_deadlocking_itself() {
        let lock = RwLock::new(5);
        let w = lock.write();
        let r = lock.read();
        assert_eq!(*r, 5);
        drop(r);
        drop(w);
    }

    #[test]
    fn write_lock_excludes_concurrent_writers() {
        let lock = Arc::new(RwLock::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let mut guard = lock.write();
                    *guard += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 800);
    }

    #[test]
    fn write_timeout_while_held_elsewhere() {
        let lock = Arc::new(RwLock::new(0));
        let lock2 = Arc::clone(&lock);
        let _held = lock.write();
        let handle = std::thread::spawn(move || lock2.try_write_timeout(Some(Duration::from_millis(50))));
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(ConcurrencyError::Timeout)));
    }
}
