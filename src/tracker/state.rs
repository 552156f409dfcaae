use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

use crate::{
    types::{
        DeviceId,
        PacketKind,
        RawRegisters,
    },
    units::WindMeasurement,
};

/// A converted measurement together with the raw registers it came from.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Reading {
    pub measurement: WindMeasurement,
    pub raw: RawRegisters,
}

/// Last-known state of one device.
///
/// Owned by the tracker: created on the first successful decode from a new
/// device and updated in place afterwards, never removed. A device that
/// goes silent keeps its last reading for display while offline.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceState {
    pub device_id: DeviceId,

    /// Kind of the packet that last moved `last_seen` forward.
    pub kind: PacketKind,

    /// Latest reading; `None` for devices that only ever sent text.
    pub reading: Option<Reading>,

    pub last_seen: DateTime<Utc>,
    pub online: bool,
    pub offline_since: Option<DateTime<Utc>>,
}

impl DeviceState {
    pub fn new(
        device_id: DeviceId,
        kind: PacketKind,
        reading: Option<Reading>,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            device_id,
            kind,
            reading,
            last_seen: time,
            online: true,
            offline_since: None,
        }
    }

    /// Apply a packet.
    ///
    /// Measurement data and `last_seen` only move forward: a reordered
    /// datagram with an older timestamp proves the device is alive but
    /// must not overwrite newer data. Returns true when the device was
    /// offline and is online now.
    pub fn apply(
        &mut self,
        kind: PacketKind,
        reading: Option<Reading>,
        time: DateTime<Utc>,
    ) -> bool {
        if time >= self.last_seen {
            self.last_seen = time;
            self.kind = kind;
            if reading.is_some() {
                self.reading = reading;
            }
        }

        let came_online = !self.online;
        self.online = true;
        self.offline_since = None;
        came_online
    }
}
