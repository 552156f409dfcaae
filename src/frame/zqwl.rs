//! The vendor transparent-transmission frame.
//!
//! ZQWL-style serial servers forward the sensor's register payload in a
//! fixed 17 byte datagram: a 6 byte header whose final byte is the
//! remaining byte count (`0x0b` = 3 echo bytes + 8 register bytes), three
//! bytes echoing the serial-side report header, and the four registers.
//! There is no checksum.

use crate::{
    frame::modbus::{
        self,
        FUNCTION_READ_REGISTERS,
        REGISTER_PAYLOAD_LENGTH,
        RegisterOrder,
    },
    types::RawRegisters,
};

pub const FRAME_LENGTH: usize = 17;
pub const HEADER: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0b];

const REGISTER_OFFSET: usize = FRAME_LENGTH - REGISTER_PAYLOAD_LENGTH as usize;

/// Parse a vendor frame.
///
/// `None` when the length or header doesn't match; the caller falls
/// through to the next classifier.
pub fn parse(data: &[u8], order: RegisterOrder) -> Option<RawRegisters> {
    if data.len() != FRAME_LENGTH || data[..HEADER.len()] != HEADER {
        return None;
    }

    Some(modbus::read_registers(&data[REGISTER_OFFSET..], order))
}

/// Build a vendor frame; the inverse of [`parse`].
pub fn encode(registers: &RawRegisters, device_address: u8, order: RegisterOrder) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LENGTH];
    frame[..HEADER.len()].copy_from_slice(&HEADER);
    frame[6] = device_address;
    frame[7] = FUNCTION_READ_REGISTERS;
    frame[8] = REGISTER_PAYLOAD_LENGTH;
    modbus::write_registers(&mut frame[REGISTER_OFFSET..], registers, order);
    frame
}
