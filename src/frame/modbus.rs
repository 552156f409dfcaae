//! The binary report frame.
//!
//! `[addr][0x03][len][payload; len][checksum; 2]` — a ModBus RTU read
//! response as the sensors emit it over UDP. `len` is always 8: four 16 bit
//! registers in the order speed, level, angle, code.

use byteorder::{
    BigEndian,
    ByteOrder,
    LittleEndian,
};
use crc::{
    CRC_16_MODBUS,
    Crc,
};

use crate::{
    config::DecoderConfig,
    frame::DecodeError,
    types::RawRegisters,
};

/// Function code of a register read response.
pub const FUNCTION_READ_REGISTERS: u8 = 0x03;

/// Payload length of a wind report: four 16 bit registers.
pub const REGISTER_PAYLOAD_LENGTH: u8 = 8;

const HEADER_LENGTH: usize = 3;
const CHECKSUM_LENGTH: usize = 2;
const PAYLOAD_END: usize = HEADER_LENGTH + REGISTER_PAYLOAD_LENGTH as usize;

/// Header + payload + checksum.
pub const FRAME_LENGTH: usize = PAYLOAD_END + CHECKSUM_LENGTH;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Checksum algorithm of the report frame trailer.
///
/// The sensor documentation doesn't pin this down and hardware revisions
/// disagree, so it stays selectable and can be validated against captured
/// device traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ChecksumKind {
    /// CRC-16/MODBUS over header and payload, little-endian trailer (the
    /// RTU convention).
    Crc16Modbus,

    /// Arithmetic sum of the header and payload bytes, big-endian trailer.
    Sum16,
}

impl ChecksumKind {
    fn compute(&self, data: &[u8]) -> u16 {
        match self {
            Self::Crc16Modbus => CRC16.checksum(data),
            Self::Sum16 => {
                data.iter()
                    .fold(0u16, |sum, byte| sum.wrapping_add(u16::from(*byte)))
            }
        }
    }

    fn read_trailer(&self, trailer: &[u8]) -> u16 {
        match self {
            Self::Crc16Modbus => LittleEndian::read_u16(trailer),
            Self::Sum16 => BigEndian::read_u16(trailer),
        }
    }

    fn write_trailer(&self, trailer: &mut [u8], value: u16) {
        match self {
            Self::Crc16Modbus => LittleEndian::write_u16(trailer, value),
            Self::Sum16 => BigEndian::write_u16(trailer, value),
        }
    }
}

/// Byte order of the register values in the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum RegisterOrder {
    Big,
    Little,
}

impl RegisterOrder {
    fn read_u16(&self, data: &[u8]) -> u16 {
        match self {
            Self::Big => BigEndian::read_u16(data),
            Self::Little => LittleEndian::read_u16(data),
        }
    }

    fn write_u16(&self, data: &mut [u8], value: u16) {
        match self {
            Self::Big => BigEndian::write_u16(data, value),
            Self::Little => LittleEndian::write_u16(data, value),
        }
    }
}

/// Whether this packet is a report frame addressed to us.
///
/// A packet that claims the frame is decoded as one: a checksum failure is
/// reported, not handed to the next classifier.
pub fn claims(data: &[u8], config: &DecoderConfig) -> bool {
    data.len() >= FRAME_LENGTH
        && data[0] == config.device_address
        && data[1] == FUNCTION_READ_REGISTERS
        && data[2] == REGISTER_PAYLOAD_LENGTH
}

/// Parse a claimed report frame.
pub fn parse(data: &[u8], config: &DecoderConfig) -> Result<RawRegisters, DecodeError> {
    debug_assert!(claims(data, config));

    let computed = config.checksum.compute(&data[..PAYLOAD_END]);
    let expected = config
        .checksum
        .read_trailer(&data[PAYLOAD_END..PAYLOAD_END + CHECKSUM_LENGTH]);
    if computed != expected {
        return Err(DecodeError::ChecksumMismatch { expected, computed });
    }

    Ok(read_registers(
        &data[HEADER_LENGTH..PAYLOAD_END],
        config.register_order,
    ))
}

pub(crate) fn read_registers(payload: &[u8], order: RegisterOrder) -> RawRegisters {
    RawRegisters {
        speed: order.read_u16(&payload[0..2]),
        level: order.read_u16(&payload[2..4]),
        angle: order.read_u16(&payload[4..6]),
        code: order.read_u16(&payload[6..8]),
    }
}

pub(crate) fn write_registers(payload: &mut [u8], registers: &RawRegisters, order: RegisterOrder) {
    order.write_u16(&mut payload[0..2], registers.speed);
    order.write_u16(&mut payload[2..4], registers.level);
    order.write_u16(&mut payload[4..6], registers.angle);
    order.write_u16(&mut payload[6..8], registers.code);
}

/// Build a report frame; the inverse of [`parse`]. The `simulate` command
/// and the round-trip tests use it.
pub fn encode(registers: &RawRegisters, config: &DecoderConfig) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LENGTH];
    frame[0] = config.device_address;
    frame[1] = FUNCTION_READ_REGISTERS;
    frame[2] = REGISTER_PAYLOAD_LENGTH;
    write_registers(
        &mut frame[HEADER_LENGTH..PAYLOAD_END],
        registers,
        config.register_order,
    );

    let checksum = config.checksum.compute(&frame[..PAYLOAD_END]);
    config
        .checksum
        .write_trailer(&mut frame[PAYLOAD_END..], checksum);

    frame
}
