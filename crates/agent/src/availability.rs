use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cleanerio_core::DispatchError;

/// Source of the next bookable cleaning slot.
#[async_trait]
pub trait AvailabilitySource: Send + Sync {
    async fn next_slot(&self, cancel: &CancellationToken) -> Result<String, DispatchError>;
}

/// Always offers the configured slot.
#[derive(Clone, Debug)]
pub struct FixedAvailability {
    slot: String,
}

impl FixedAvailability {
    pub fn new(slot: impl Into<String>) -> Self {
        Self { slot: slot.into() }
    }
}

#[async_trait]
impl AvailabilitySource for FixedAvailability {
    async fn next_slot(&self, cancel: &CancellationToken) -> Result<String, DispatchError> {
        if cancel.is_cancelled() {
            return Err(DispatchError::Cancelled);
        }
        Ok(self.slot.clone())
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::{AvailabilitySource, FixedAvailability};

    #[tokio::test]
    async fn fixed_availability_returns_configured_slot() {
        let source = FixedAvailability::new("2025-01-01 00:00");
        let slot = source.next_slot(&CancellationToken::new()).await.expect("slot");
        assert_eq!(slot, "2025-01-01 00:00");
    }
}
