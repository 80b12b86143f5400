use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock timeout for app: {0}")]
    Timeout(String),
}

struct Held {
    apps: Mutex<HashSet<String>>,
    released: Condvar,
}

/// Single-writer lock per app.
#[derive(Clone)]
pub struct LockManager {
    held: Arc<Held>,
    timeout: Duration,
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            held: Arc::new(Held {
                apps: Mutex::new(HashSet::new()),
                released: Condvar::new(),
            }),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn acquire(&self, app: &str) -> Result<AppLock, LockError> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut apps = self.held.apps.lock();

        while apps.contains(app) {
            let result = self.held.released.wait_until(&mut apps, deadline);
            if result.timed_out() && apps.contains(app) {
                return Err(LockError::Timeout(app.to_string()));
            }
        }

        apps.insert(app.to_string());
        let wait_time = start.elapsed();
        debug!("Acquired lock for {} after {:?}", app, wait_time);

        Ok(AppLock {
            held: Arc::clone(&self.held),
            app: app.to_string(),
            wait_time,
        })
    }

    pub fn is_locked(&self, app: &str) -> bool {
        self.held.apps.lock().contains(app)
    }
}

/// Held while one mutation sequence runs for `app`. Released on drop.
pub struct AppLock {
    held: Arc<Held>,
    app: String,
    wait_time: Duration,
}

impl AppLock {
    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn wait_time(&self) -> Duration {
        self.wait_time
    }
}

impl Drop for AppLock {
    fn drop(&mut self) {
        self.held.apps.lock().remove(&self.app);
        self.held.released.notify_all();
    }
}
