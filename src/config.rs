use std::time::Duration;

use crate::frame::modbus::{
    ChecksumKind,
    RegisterOrder,
};

pub const DEFAULT_UDP_PORT: u16 = 8888;
pub const DEFAULT_OFFLINE_THRESHOLD: Duration = Duration::from_secs(60);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_DEVICE_ADDRESS: u8 = 0x80;
pub const DEFAULT_MAX_PACKET_SIZE: usize = 2048;

/// Resolved runtime settings for the receiver.
#[derive(Clone, Debug)]
pub struct Config {
    /// UDP port the receive socket binds on all interfaces.
    pub udp_port: u16,

    /// Silence after which a device is flipped offline.
    pub offline_threshold: Duration,

    /// How often the liveness sweep runs.
    pub sweep_interval: Duration,

    pub decoder: DecoderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            udp_port: DEFAULT_UDP_PORT,
            offline_threshold: DEFAULT_OFFLINE_THRESHOLD,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            decoder: DecoderConfig::default(),
        }
    }
}

/// Settings consumed by the frame decoder.
#[derive(Clone, Copy, Debug)]
pub struct DecoderConfig {
    /// Expected address byte of the binary report frame.
    pub device_address: u8,

    /// Datagrams longer than this are dropped as oversized. The default sits
    /// comfortably above any single sensor datagram and below reassembly
    /// territory.
    pub max_packet_size: usize,

    pub checksum: ChecksumKind,
    pub register_order: RegisterOrder,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            device_address: DEFAULT_DEVICE_ADDRESS,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            checksum: ChecksumKind::Crc16Modbus,
            register_order: RegisterOrder::Big,
        }
    }
}
