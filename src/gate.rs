//! Admission control for outbound requests.
//!
//! An [`AdmissionGate`] is a fixed-size pool of permits. Each in-flight
//! request holds one [`Permit`], so the number of requests in flight can
//! never exceed the capacity of the gate.

use tokio::sync::{Semaphore, SemaphorePermit};

use crate::{ErrorKind, Result};

/// Default number of concurrent requests per pool, 8.
pub const DEFAULT_POOL_SIZE: usize = 8;

/// A counting permit pool bounding concurrent access to a transport.
///
/// Waiters are suspended, never rejected, until a permit becomes available.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Semaphore,
    capacity: usize,
}

/// RAII guard for a single admission.
///
/// The permit is handed back to its gate when this value is dropped, which
/// covers early returns, errors, panics and cancelled futures alike.
#[derive(Debug)]
#[must_use = "the permit is released as soon as it is dropped"]
pub struct Permit<'a> {
    _permit: SemaphorePermit<'a>,
}

impl AdmissionGate {
    /// Creates a gate with room for `capacity` concurrent holders.
    ///
    /// A capacity of zero is normalized to [`DEFAULT_POOL_SIZE`].
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_POOL_SIZE
        } else {
            capacity
        };

        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Waits until a permit is available and takes it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::GateClosed`] if the underlying semaphore was
    /// closed. Gates never close themselves, so this does not happen in
    /// practice.
    pub async fn acquire(&self) -> Result<Permit<'_>> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ErrorKind::GateClosed)?;
        log::trace!(
            "Admitted request, {} of {} permits left",
            self.semaphore.available_permits(),
            self.capacity
        );
        Ok(Permit { _permit: permit })
    }

    /// Total number of permits
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of permits which are currently not held
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Permit<'_> {
    /// Hands the permit back to its gate.
    ///
    /// Same as dropping it.
    pub fn release(self) {
        log::trace!("Released permit");
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_zero_capacity_uses_default() {
        let gate = AdmissionGate::new(0);
        assert_eq!(gate.capacity(), DEFAULT_POOL_SIZE);
        assert_eq!(gate.available(), DEFAULT_POOL_SIZE);
    }

    #[tokio::test]
    async fn test_permit_released_on_drop_and_release() {
        let gate = AdmissionGate::new(2);

        let first = gate.acquire().await.unwrap();
        let second = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);

        drop(first);
        assert_eq!(gate.available(), 1);
        second.release();
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test]
    async fn test_waiter_blocks_until_release() {
        let gate = Arc::new(AdmissionGate::new(1));
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_permit_released_on_panic() {
        let gate = Arc::new(AdmissionGate::new(1));

        let task = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                panic!("request handler exploded");
            })
        };

        assert!(task.await.unwrap_err().is_panic());
        assert_eq!(gate.available(), 1);
    }
}
