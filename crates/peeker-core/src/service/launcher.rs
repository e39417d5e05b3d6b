use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use super::{InspectionService, ShutdownSignal, Transport};
use crate::error::{Error, Result};
use crate::memory::ReadMemory;

/// Runs one [`InspectionService`] on a background thread.
///
/// Starting is idempotent: only the first [`start`](Peeker::start) spawns a
/// thread, later calls return `false` and leave it untouched. A stopped
/// launcher stays stopped.
#[derive(Debug, Default)]
pub struct Peeker {
    started: AtomicBool,
    shutdown: Arc<ShutdownSignal>,
    handle: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Peeker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the service built by `factory`.
    ///
    /// The service is constructed on the new thread, so neither the memory
    /// source nor the transport has to be `Send`.
    pub fn start<R, T, F>(&self, factory: F) -> bool
    where
        R: ReadMemory + 'static,
        T: Transport + 'static,
        F: FnOnce() -> InspectionService<R, T> + Send + 'static,
    {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Inspection service already started");
            return false;
        }

        let shutdown = Arc::clone(&self.shutdown);
        let spawned = thread::Builder::new()
            .name("peeker".to_string())
            .spawn(move || factory().run(&shutdown));

        match spawned {
            Ok(handle) => {
                *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
                true
            }
            Err(e) => {
                error!("Failed to spawn inspection service: {}", e);
                self.started.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Signal shared with the service loop
    pub fn shutdown_signal(&self) -> Arc<ShutdownSignal> {
        Arc::clone(&self.shutdown)
    }

    /// Wait for the service thread to finish and return its result.
    ///
    /// Returns `Ok(())` immediately when nothing is running.
    pub fn join(&self) -> Result<()> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match handle {
            Some(handle) => handle.join().map_err(|_| Error::ServicePanicked)?,
            None => Ok(()),
        }
    }

    /// Trigger shutdown and join the service thread.
    pub fn stop(&self) -> Result<()> {
        self.shutdown.trigger();
        self.join()
    }
}

impl Drop for Peeker {
    fn drop(&mut self) {
        if self.is_started() {
            let _ = self.stop();
        }
    }
}
