//! Field rules applied to readings before they are stored or analysed.

use crate::error::ValidationError;
use crate::reading::TrafficReading;

/// Checks the rules shared by both paths, in order, returning the first violation:
///
/// 1. `location_id` is non-empty
/// 2. `vehicle_count >= 0`
/// 3. `average_speed >= 0`
/// 4. a non-empty `congestion_level` is one of `low|medium|high|severe`
///
/// This is the re-validation the consumer runs on fetched payloads; it does
/// not look at the timestamp.
pub fn validate(reading: &TrafficReading) -> Result<(), ValidationError> {
    validate_measurements(reading)?;
    reading.congestion()?;

    Ok(())
}

/// Location, vehicle count and average speed, in that order.
fn validate_measurements(reading: &TrafficReading) -> Result<(), ValidationError> {
    if reading.location_id.is_empty() {
        return Err(ValidationError::MissingLocation);
    }

    if reading.vehicle_count < 0 {
        return Err(ValidationError::NegativeVehicleCount(reading.vehicle_count));
    }

    // NaN fails this check too
    if !(reading.average_speed >= 0.0) {
        return Err(ValidationError::NegativeAverageSpeed(reading.average_speed));
    }

    Ok(())
}

/// Rules for readings arriving through the ingestion path.
///
/// Same rules as [`validate`] with a required timestamp checked between the
/// average speed and the congestion level, followed by the optional speed
/// bounds and occupancy percentage.
pub fn validate_inbound(reading: &TrafficReading) -> Result<(), ValidationError> {
    validate_measurements(reading)?;

    if reading.timestamp_is_unset() {
        return Err(ValidationError::MissingTimestamp);
    }

    reading.congestion()?;

    for (field, value) in [("max_speed", reading.max_speed), ("min_speed", reading.min_speed)] {
        if let Some(value) = value {
            if !(value >= 0.0) {
                return Err(ValidationError::NegativeSpeedBound { field, value });
            }
        }
    }

    if let Some(occupancy) = reading.occupancy {
        if !(0.0..=100.0).contains(&occupancy) {
            return Err(ValidationError::OccupancyOutOfRange(occupancy));
        }
    }

    Ok(())
}
