use crate::models::Snapshot;
use crate::sensor::SensorRecord;

/// Output seam between the poll loop and whatever renders the sensors.
/// Implementations receive every successful snapshot together with its
/// projected records; the records are recomputed per snapshot, so nothing
/// may be cached across calls besides connection state.
pub trait SensorCollector {
    fn publish(&mut self, snapshot: &Snapshot, records: &[SensorRecord]);
}
