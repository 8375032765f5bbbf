use bytes::Bytes;
use tracing::info;

use crate::backend::EventLog;
use crate::error::DependencyError;
use crate::reading::TrafficReading;

/// Appends readings to the durable log as bare JSON payloads.
///
/// No envelope, schema version or idempotency key is added; consumers
/// deserialize the payload straight into a [`TrafficReading`].
pub struct Publisher<L> {
    log: L,
}

impl<L: EventLog> Publisher<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    #[tracing::instrument(skip_all, fields(location_id = %reading.location_id))]
    pub async fn publish(&self, reading: &TrafficReading) -> Result<(), DependencyError> {
        let payload = serde_json::to_vec(reading).map_err(DependencyError::Encode)?;
        self.log.append(Bytes::from(payload)).await?;
        info!("Published reading to event log");
        Ok(())
    }
}
