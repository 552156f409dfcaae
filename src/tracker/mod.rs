//! The device registry and its liveness sweep.

pub mod state;

use std::{
    collections::{
        BTreeMap,
        btree_map,
    },
    fmt::Write as _,
    sync::{
        Arc,
        Mutex,
    },
    time::Duration,
};

use chrono::{
    DateTime,
    Utc,
};
use tokio::{
    sync::mpsc,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    event::Event,
    tracker::state::{
        DeviceState,
        Reading,
    },
    types::{
        DeviceId,
        PacketKind,
    },
};

/// Tracks every device that ever sent a valid packet.
///
/// Cheap to clone; all clones share one registry. The receive loop, the
/// liveness monitor and status queries all go through this handle, and the
/// inner lock serializes them. The lock is never held across an await.
///
/// Entries are never removed: a silent device flips offline but keeps its
/// last reading.
#[derive(Clone, Debug, Default)]
pub struct Tracker {
    devices: Arc<Mutex<BTreeMap<DeviceId, DeviceState>>>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully decoded packet.
    ///
    /// Creates the entry on first contact, otherwise applies the packet
    /// under the per-device monotonicity rule (see [`DeviceState::apply`]).
    /// Returns true when this flipped the device online — first sighting
    /// included — so the caller can emit exactly one status-change event
    /// per transition.
    pub fn upsert(
        &self,
        device_id: DeviceId,
        kind: PacketKind,
        reading: Option<Reading>,
        time: DateTime<Utc>,
    ) -> bool {
        let mut devices = self.devices.lock().expect("tracker lock poisoned");

        match devices.entry(device_id) {
            btree_map::Entry::Occupied(mut occupied) => occupied.get_mut().apply(kind, reading, time),
            btree_map::Entry::Vacant(vacant) => {
                vacant.insert(DeviceState::new(device_id, kind, reading, time));
                true
            }
        }
    }

    /// Flip one device offline. Idempotent; true only on the edge.
    pub fn mark_offline(&self, device_id: DeviceId, at: DateTime<Utc>) -> bool {
        let mut devices = self.devices.lock().expect("tracker lock poisoned");

        let Some(device) = devices.get_mut(&device_id)
        else {
            return false;
        };

        if device.online {
            device.online = false;
            device.offline_since = Some(at);
            true
        }
        else {
            false
        }
    }

    /// Flip every device that has been silent for longer than `threshold`
    /// offline, returning the ids that transitioned.
    pub fn sweep(&self, now: DateTime<Utc>, threshold: Duration) -> Vec<DeviceId> {
        let threshold =
            chrono::Duration::from_std(threshold).expect("offline threshold out of range");
        let mut devices = self.devices.lock().expect("tracker lock poisoned");

        let mut transitioned = Vec::new();
        for (device_id, device) in devices.iter_mut() {
            if device.online && now - device.last_seen > threshold {
                device.online = false;
                device.offline_since = Some(now);
                transitioned.push(*device_id);
            }
        }

        transitioned
    }

    /// Consistent view of every device, ordered by id.
    pub fn snapshot(&self) -> Vec<DeviceState> {
        self.devices
            .lock()
            .expect("tracker lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<DeviceState> {
        self.devices
            .lock()
            .expect("tracker lock poisoned")
            .get(device_id)
            .cloned()
    }
}

/// Render the status summary, one line per device.
pub fn format_status_report(devices: &[DeviceState], now: DateTime<Utc>) -> String {
    if devices.is_empty() {
        return "no devices have reported yet".to_owned();
    }

    let mut report = String::new();
    for device in devices {
        let status = if device.online {
            "online".to_owned()
        }
        else {
            format!("offline for {}s", (now - device.last_seen).num_seconds())
        };
        let _ = writeln!(report, "{}: {status} ({})", device.device_id, device.kind);
    }

    report
}

/// Periodic sweep flipping silent devices offline.
///
/// Transition-triggered: each device produces one offline event per
/// silence, and the receive path reports the way back online. Neither
/// level is ever re-emitted.
#[derive(Debug)]
pub struct LivenessMonitor {
    tracker: Tracker,
    events: mpsc::Sender<Event>,
    offline_threshold: Duration,
    sweep_interval: Duration,
    shutdown: CancellationToken,
}

impl LivenessMonitor {
    pub fn new(tracker: Tracker, events: mpsc::Sender<Event>, config: &Config) -> Self {
        Self {
            tracker,
            events,
            offline_threshold: config.offline_threshold,
            sweep_interval: config.sweep_interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Provide a [`CancellationToken`] with which the monitor can be shut
    /// down.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => self.sweep_once().await,
            }
        }
    }

    async fn sweep_once(&self) {
        let now = Utc::now();

        for device_id in self.tracker.sweep(now, self.offline_threshold) {
            tracing::info!(%device_id, "device went offline");

            let event = Event::DeviceStatusChanged {
                device_id,
                online: false,
                timestamp: now,
            };
            if self.events.send(event).await.is_err() {
                // sink dropped; nobody left to notify
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{
        DateTime,
        Utc,
    };
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use crate::{
        config::Config,
        event::Event,
        tracker::{
            LivenessMonitor,
            Tracker,
            format_status_report,
            state::Reading,
        },
        types::{
            DeviceId,
            PacketKind,
            RawRegisters,
        },
        units::WindMeasurement,
    };

    fn device(address: &str) -> DeviceId {
        address.parse().unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(seconds, 0).unwrap()
    }

    #[test]
    fn it_keeps_last_seen_monotonic_under_reordering() {
        let tracker = Tracker::new();
        let id = device("10.0.0.1:5000");

        for seconds in [10, 5, 20] {
            let raw = RawRegisters {
                speed: seconds as u16,
                level: 0,
                angle: 0,
                code: 0,
            };
            tracker.upsert(
                id,
                PacketKind::Measurement,
                Some(Reading {
                    measurement: WindMeasurement::from_registers(&raw),
                    raw,
                }),
                at(seconds),
            );
        }

        let state = tracker.get(&id).unwrap();
        assert_eq!(state.last_seen, at(20));
        // the reordered t=5 reading was rejected, t=20 won
        assert_eq!(state.reading.unwrap().raw.speed, 20);
    }

    #[test]
    fn it_reports_the_online_edge_exactly_once() {
        let tracker = Tracker::new();
        let id = device("10.0.0.1:5000");

        assert!(tracker.upsert(id, PacketKind::Heartbeat, None, at(0)));
        assert!(!tracker.upsert(id, PacketKind::Heartbeat, None, at(1)));

        assert!(tracker.mark_offline(id, at(100)));
        assert!(!tracker.mark_offline(id, at(101)));

        assert!(tracker.upsert(id, PacketKind::Heartbeat, None, at(102)));
    }

    #[test]
    fn it_sweeps_silent_devices_offline_exactly_once() {
        let tracker = Tracker::new();
        let id = device("10.0.0.1:5000");
        let threshold = Duration::from_secs(60);

        tracker.upsert(id, PacketKind::Heartbeat, None, at(0));

        assert_eq!(tracker.sweep(at(60), threshold), vec![]);
        assert_eq!(tracker.sweep(at(61), threshold), vec![id]);
        assert_eq!(tracker.sweep(at(120), threshold), vec![]);

        let state = tracker.get(&id).unwrap();
        assert!(!state.online);
        assert_eq!(state.offline_since, Some(at(61)));
    }

    #[test]
    fn it_orders_snapshots_by_device_id() {
        let tracker = Tracker::new();

        for address in ["10.0.0.9:5000", "10.0.0.1:5000", "10.0.0.5:5000"] {
            tracker.upsert(device(address), PacketKind::Heartbeat, None, at(0));
        }

        let ids: Vec<_> = tracker
            .snapshot()
            .iter()
            .map(|state| state.device_id.to_string())
            .collect();
        assert_eq!(ids, ["10.0.0.1:5000", "10.0.0.5:5000", "10.0.0.9:5000"]);
    }

    #[test]
    fn it_formats_a_status_report() {
        let tracker = Tracker::new();
        let now = Utc::now();

        assert_eq!(
            format_status_report(&tracker.snapshot(), now),
            "no devices have reported yet"
        );

        tracker.upsert(
            device("10.0.0.1:5000"),
            PacketKind::Heartbeat,
            None,
            now - chrono::Duration::seconds(90),
        );
        tracker.sweep(now, Duration::from_secs(60));

        let report = format_status_report(&tracker.snapshot(), now);
        assert!(report.contains("10.0.0.1:5000"));
        assert!(report.contains("offline for 90s"));
    }

    #[tokio::test]
    async fn it_emits_one_offline_event_per_silence() {
        let tracker = Tracker::new();
        let id = device("10.0.0.1:5000");
        tracker.upsert(
            id,
            PacketKind::Heartbeat,
            None,
            Utc::now() - chrono::Duration::seconds(120),
        );

        let config = Config {
            sweep_interval: Duration::from_millis(10),
            ..Config::default()
        };
        let (sender, mut events) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let monitor = LivenessMonitor::new(tracker, sender, &config)
            .with_shutdown(shutdown.clone());
        let task = tokio::spawn(monitor.run());

        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            Event::DeviceStatusChanged {
                device_id, online, ..
            } => {
                assert_eq!(device_id, id);
                assert!(!online);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        // still offline, still silent: no re-emission
        assert!(
            tokio::time::timeout(Duration::from_millis(100), events.recv())
                .await
                .is_err()
        );

        shutdown.cancel();
        task.await.unwrap();
    }
}
