use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

/// Stop flag for the service loop.
///
/// The flag lives under the mutex the condvar waits on, so a trigger can
/// never slip in between a waiter's check and its sleep. Once set it stays set.
#[derive(Default)]
pub struct ShutdownSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter. Triggering twice is harmless.
    pub fn trigger(&self) {
        let mut stopped = self.flag();
        if !*stopped {
            *stopped = true;
            debug!("Shutdown requested");
        }
        self.wake.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        *self.flag()
    }

    /// Sleep for `duration` or until triggered.
    ///
    /// Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        let stopped = self.flag();
        if *stopped {
            return true;
        }
        match self.wake.wait_timeout_while(stopped, duration, |s| !*s) {
            Ok((stopped, _)) => *stopped,
            // A panicking holder cannot leave the flag half-written
            Err(poisoned) => *poisoned.into_inner().0,
        }
    }

    fn flag(&self) -> MutexGuard<'_, bool> {
        self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignal")
            .field("stopped", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger_is_sticky() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());

        signal.trigger();
        signal.trigger();
        assert!(signal.is_shutdown());
        assert!(signal.wait(Duration::ZERO));
    }

    #[test]
    fn test_untriggered_wait_sleeps_full_duration() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();

        assert!(!signal.wait(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_trigger_wakes_every_waiter() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = Arc::clone(&signal);
                thread::spawn(move || {
                    let start = Instant::now();
                    (signal.wait(Duration::from_secs(10)), start.elapsed())
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        for waiter in waiters {
            let (stopped, elapsed) = waiter.join().unwrap();
            assert!(stopped);
            assert!(elapsed < Duration::from_secs(5));
        }
    }

    #[test]
    fn test_survives_poisoned_lock() {
        let signal = Arc::new(ShutdownSignal::new());
        let poisoner = Arc::clone(&signal);
        let _ = thread::spawn(move || {
            let _guard = poisoner.stopped.lock().unwrap();
            panic!("poison the flag");
        })
        .join();

        assert!(!signal.is_shutdown());
        signal.trigger();
        assert!(signal.wait(Duration::from_secs(10)));
    }

    #[test]
    fn test_debug_shows_state() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        assert_eq!(format!("{:?}", signal), "ShutdownSignal { stopped: true }");
    }
}
