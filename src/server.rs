//! The UDP receive loop.

use std::net::SocketAddr;

use chrono::{
    DateTime,
    Utc,
};
use tokio::{
    net::UdpSocket,
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    event::Event,
    frame::{
        self,
        Frame,
    },
    tracker::{
        Tracker,
        state::Reading,
    },
    types::{
        DeviceId,
        PacketKind,
    },
    units::WindMeasurement,
};

/// How many offending bytes a `decode-error` event carries.
const DIAGNOSTIC_PREFIX: usize = 32;

/// Fatal startup error: the receive socket could not be bound.
///
/// Kept separate from per-packet decode failures, which are recovered; a
/// bind failure aborts startup.
#[derive(Debug, thiserror::Error)]
#[error("failed to bind UDP socket on port {port}")]
pub struct BindError {
    pub port: u16,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, thiserror::Error)]
#[error("udp server error")]
pub enum Error {
    Io(#[from] std::io::Error),
}

/// The receive loop: one datagram in, one decode attempt, events out.
///
/// Successful decodes update the [`Tracker`] and emit events; failures
/// emit a diagnostic event and nothing else. One bad packet never affects
/// the next.
#[derive(Debug)]
pub struct UdpServer {
    socket: UdpSocket,
    config: Config,
    tracker: Tracker,
    events: mpsc::Sender<Event>,
    shutdown: CancellationToken,
}

impl UdpServer {
    /// Bind the receive socket on all interfaces.
    pub async fn bind(
        config: Config,
        tracker: Tracker,
        events: mpsc::Sender<Event>,
    ) -> Result<Self, BindError> {
        let port = config.udp_port;
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| BindError { port, source })?;

        tracing::info!(port, "listening for sensor datagrams");

        Ok(Self {
            socket,
            config,
            tracker,
            events,
            shutdown: CancellationToken::new(),
        })
    }

    /// Provide a [`CancellationToken`] with which the server can be shut
    /// down. An in-flight datagram is finished first.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The bound address; useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams until shut down.
    pub async fn serve(self) -> Result<(), Error> {
        // one reused buffer, one byte above the cap so an over-cap datagram
        // still shows up as oversized rather than silently truncated
        let mut buffer = vec![0u8; self.config.decoder.max_packet_size + 1];

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                result = self.socket.recv_from(&mut buffer) => {
                    let (length, sender) = result?;
                    self.handle_datagram(&buffer[..length], sender, Utc::now()).await;
                }
            }
        }

        Ok(())
    }

    async fn handle_datagram(&self, data: &[u8], sender: SocketAddr, time: DateTime<Utc>) {
        let device_id = DeviceId::from(sender);

        match frame::decode(data, &self.config.decoder) {
            Ok(Frame::WindReading { registers }) => {
                let measurement = WindMeasurement::from_registers(&registers);

                tracing::debug!(
                    %device_id,
                    speed_ms = measurement.speed_ms,
                    direction_degrees = measurement.direction_degrees,
                    "wind report"
                );

                let came_online = self.tracker.upsert(
                    device_id,
                    PacketKind::Measurement,
                    Some(Reading {
                        measurement,
                        raw: registers,
                    }),
                    time,
                );
                self.emit_status_change(device_id, came_online, time).await;
                self.emit(Event::Measurement {
                    device_id,
                    measurement,
                    raw: registers,
                    timestamp: time,
                })
                .await;
            }
            Ok(Frame::Heartbeat { text }) => {
                tracing::debug!(%device_id, "heartbeat");

                let came_online =
                    self.tracker
                        .upsert(device_id, PacketKind::Heartbeat, None, time);
                self.emit_status_change(device_id, came_online, time).await;
                self.emit(Event::Heartbeat {
                    device_id,
                    text,
                    timestamp: time,
                })
                .await;
            }
            Ok(Frame::Registration { text }) => {
                tracing::info!(%device_id, text, "device registration");

                let came_online =
                    self.tracker
                        .upsert(device_id, PacketKind::Registration, None, time);
                self.emit_status_change(device_id, came_online, time).await;
                self.emit(Event::Registration {
                    device_id,
                    text,
                    timestamp: time,
                })
                .await;
            }
            Err(reason) => {
                tracing::debug!(%sender, %reason, length = data.len(), "dropping packet");

                self.emit(Event::DecodeError {
                    sender,
                    bytes_hex: hex::encode(&data[..data.len().min(DIAGNOSTIC_PREFIX)]),
                    reason,
                    timestamp: time,
                })
                .await;
            }
        }
    }

    async fn emit_status_change(&self, device_id: DeviceId, came_online: bool, time: DateTime<Utc>) {
        if came_online {
            tracing::info!(%device_id, "device online");

            self.emit(Event::DeviceStatusChanged {
                device_id,
                online: true,
                timestamp: time,
            })
            .await;
        }
    }

    async fn emit(&self, event: Event) {
        // the host dropping its receiver is not something the receive loop
        // can act on
        let _ = self.events.send(event).await;
    }
}
