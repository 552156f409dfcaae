use std::{
    fmt::{
        Debug,
        Display,
    },
    net::SocketAddr,
    str::FromStr,
};

use serde::Serialize;

/// Identity of a sensor device.
///
/// Neither wire format carries a unique identity field (the report frame's
/// address byte is a sentinel shared by all devices), so a device is
/// identified by the source address of its datagrams. This is stable for the
/// lifetime of a connection, which is what the registry needs: one physical
/// sensor maps to exactly one entry.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    address: SocketAddr,
}

impl DeviceId {
    pub const fn from_socket_addr(address: SocketAddr) -> Self {
        Self { address }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.address
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl Debug for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DeviceId({self})")
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let address = s.parse().map_err(|_| {
            DeviceIdFromStrError {
                input: s.to_owned(),
            }
        })?;
        Ok(Self { address })
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid device id: {input}")]
pub struct DeviceIdFromStrError {
    pub input: String,
}

impl From<SocketAddr> for DeviceId {
    fn from(value: SocketAddr) -> Self {
        Self::from_socket_addr(value)
    }
}

impl Serialize for DeviceId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.address)
    }
}

/// The four 16 bit registers carried by every wind report, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RawRegisters {
    pub speed: u16,
    pub level: u16,
    pub angle: u16,
    pub code: u16,
}

/// What kind of packet a device sent last.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PacketKind {
    Measurement,
    Heartbeat,
    Registration,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Measurement => "measurement",
            Self::Heartbeat => "heartbeat",
            Self::Registration => "registration",
        }
    }
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
