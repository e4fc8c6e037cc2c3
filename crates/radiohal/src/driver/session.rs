// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Process-wide ref-counted driver session (§3 "Driver session").
//!
//! The first acquirer runs the driver library's global `init`; the
//! last releaser runs `exit`. One `Session` per driver name, shared by
//! every `Device` opened against that driver.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct SessionState {
    refcount: usize,
}

/// A process-wide handle on one driver's `init`/`exit` pair.
///
/// `init_fn`/`exit_fn` are invoked under the table's lock, so two
/// threads racing to acquire the same driver never both observe
/// `refcount == 0 -> 1` and double-`init`.
pub struct Session {
    driver_name: &'static str,
    table: Arc<Mutex<HashMap<&'static str, SessionState>>>,
}

impl Session {
    /// Acquire the session for `driver_name`, running `init_fn` if
    /// this is the first acquisition. `init_fn` runs at most once
    /// between a 0->1 transition and the matching release back to 0.
    pub fn acquire(
        table: &Arc<Mutex<HashMap<&'static str, SessionState>>>,
        driver_name: &'static str,
        init_fn: impl FnOnce(),
    ) -> Self {
        let mut guard = table.lock();
        match guard.get_mut(driver_name) {
            Some(state) => state.refcount += 1,
            None => {
                init_fn();
                guard.insert(driver_name, SessionState { refcount: 1 });
            }
        }
        drop(guard);
        Session {
            driver_name,
            table: Arc::clone(table),
        }
    }

    /// Release the session, running `exit_fn` if this was the last
    /// reference.
    pub fn release(self, exit_fn: impl FnOnce()) {
        let mut guard = self.table.lock();
        if let Some(state) = guard.get_mut(self.driver_name) {
            state.refcount -= 1;
            if state.refcount == 0 {
                guard.remove(self.driver_name);
                drop(guard);
                exit_fn();
            }
        }
    }
}

/// Registry-wide table of active sessions, one per driver name.
#[derive(Default, Clone)]
pub struct SessionTable {
    inner: Arc<Mutex<HashMap<&'static str, SessionState>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, driver_name: &'static str, init_fn: impl FnOnce()) -> Session {
        Session::acquire(&self.inner, driver_name, init_fn)
    }

    #[cfg(test)]
    fn refcount(&self, driver_name: &str) -> usize {
        self.inner
            .lock()
            .get(driver_name)
            .map(|s| s.refcount)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn init_runs_once_across_concurrent_acquires() {
        let table = SessionTable::new();
        let init_calls = Arc::new(AtomicUsize::new(0));

        let sessions: Vec<Session> = (0..5)
            .map(|_| {
                let init_calls = Arc::clone(&init_calls);
                table.acquire("mock", move || {
                    init_calls.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        assert_eq!(init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.refcount("mock"), 5);

        let exit_calls = Arc::new(AtomicUsize::new(0));
        for session in sessions {
            let exit_calls = Arc::clone(&exit_calls);
            session.release(move || {
                exit_calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(exit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(table.refcount("mock"), 0);
    }

    #[test]
    fn reacquiring_after_full_release_inits_again() {
        let table = SessionTable::new();
        let init_calls = Arc::new(AtomicUsize::new(0));

        let make = |table: &SessionTable, init_calls: &Arc<AtomicUsize>| {
            let init_calls = Arc::clone(init_calls);
            table.acquire("mock", move || {
                init_calls.fetch_add(1, Ordering::SeqCst);
            })
        };

        let s1 = make(&table, &init_calls);
        s1.release(|| {});
        let s2 = make(&table, &init_calls);
        s2.release(|| {});

        assert_eq!(init_calls.load(Ordering::SeqCst), 2);
    }
}
