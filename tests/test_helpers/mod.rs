//! Environment guards and worker discovery shared by integration tests.

mod worker_locator;

pub use worker_locator::locate_pg_worker_path;

use std::env;
use std::ffi::OsString;
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Applies environment changes until dropped, then restores the old values.
///
/// Guards serialize on one process-wide mutex, so only one is alive at once.
pub struct EnvVarGuard {
    previous: Vec<(OsString, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets (`Some`) or removes (`None`) each variable for the guard lifetime.
    pub fn set_many(changes: &[(OsString, Option<OsString>)]) -> Self {
        let lock = ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let previous = changes
            .iter()
            .map(|(key, value)| {
                let old = env::var_os(key);
                write_var(key, value.as_ref());
                (key.clone(), old)
            })
            .collect();
        Self {
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.previous.drain(..).rev() {
            write_var(&key, value.as_ref());
        }
    }
}

fn write_var(key: &OsString, value: Option<&OsString>) {
    // SAFETY: every mutation happens under ENV_MUTEX.
    unsafe {
        match value {
            Some(present) => env::set_var(key, present),
            None => env::remove_var(key),
        }
    }
}
