//! What the receiver reports to the host application.

use std::net::SocketAddr;

use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

use crate::{
    frame::DecodeError,
    types::{
        DeviceId,
        RawRegisters,
    },
    units::WindMeasurement,
};

/// Queue size of the event channel handed to the host.
pub const EVENT_QUEUE_SIZE: usize = 64;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Event {
    /// A decoded wind report.
    Measurement {
        device_id: DeviceId,
        #[serde(flatten)]
        measurement: WindMeasurement,
        raw: RawRegisters,
        timestamp: DateTime<Utc>,
    },

    /// A keep-alive text packet.
    Heartbeat {
        device_id: DeviceId,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A device announced itself with a registration packet.
    Registration {
        device_id: DeviceId,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A device crossed the online/offline edge. Never re-emitted while
    /// the device stays on the same side.
    DeviceStatusChanged {
        device_id: DeviceId,
        online: bool,
        timestamp: DateTime<Utc>,
    },

    /// A packet was dropped. Diagnostic only; the sender may not even be a
    /// sensor.
    DecodeError {
        sender: SocketAddr,
        reason: DecodeError,
        bytes_hex: String,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::{
        event::Event,
        types::RawRegisters,
        units::WindMeasurement,
    };

    #[test]
    fn it_serializes_a_measurement_with_flattened_values() {
        let raw = RawRegisters {
            speed: 52,
            level: 3,
            angle: 1800,
            code: 0x08,
        };
        let event = Event::Measurement {
            device_id: "10.0.0.1:5000".parse().unwrap(),
            measurement: WindMeasurement::from_registers(&raw),
            raw,
            timestamp: Utc::now(),
        };

        let json: serde_json::Value =
            serde_json::to_value(&event).unwrap();
        let measurement = &json["measurement"];

        assert_eq!(measurement["device_id"], "10.0.0.1:5000");
        assert_eq!(measurement["speed_ms"], 5.2);
        assert_eq!(measurement["cardinal"], "S");
        assert_eq!(measurement["raw"]["angle"], 1800);
    }
}
