use std::time::Duration;

use async_trait::async_trait;

/// Failure reported by a [`Calculator`] implementation.
///
/// Domain errors travel back to the caller as reply payload text; they are
/// never a connection fault.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct CalcError(pub String);

/// The computation performed per request. External collaborator of the
/// protocol layer: the dispatcher only knows how to route commands to it.
#[async_trait]
pub trait Calculator: Send + Sync {
    async fn increment(&self, n: i64) -> Result<i64, CalcError>;
}

/// Toy calculator that sleeps for a configurable delay before returning the
/// successor, so that concurrent requests observably overlap.
pub struct SlowCalculator {
    delay: Duration,
}

impl SlowCalculator {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SlowCalculator {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl Calculator for SlowCalculator {
    async fn increment(&self, n: i64) -> Result<i64, CalcError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        n.checked_add(1)
            .ok_or_else(|| CalcError(format!("increment overflows for {}", n)))
    }
}
