//! Packet classification and decoding.
//!
//! One datagram is one message; there is no reassembly. Classification
//! tries the binary report frame, then the vendor frame, then text, in
//! that order. The first classifier that claims a packet decides its fate:
//! a report frame with a bad checksum is reported as such, it does not get
//! a second chance as text.

pub mod modbus;
pub mod text;
pub mod zqwl;

use serde::Serialize;

use crate::{
    config::DecoderConfig,
    types::RawRegisters,
};

/// A successfully decoded packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A binary report carrying the four wind registers.
    WindReading { registers: RawRegisters },

    /// A keep-alive text packet.
    Heartbeat { text: String },

    /// Any other textual packet; devices send these when (re)connecting.
    Registration { text: String },
}

/// Why a packet could not be decoded.
///
/// Every variant is recovered locally: the packet is dropped, a
/// `decode-error` event is emitted, and the receive loop continues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeError {
    #[error("empty packet")]
    EmptyPacket,

    #[error("packet of {length} bytes exceeds the {max} byte cap")]
    Oversized { length: usize, max: usize },

    #[error("report checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("vendor frame header mismatch")]
    HeaderMismatch,

    #[error("text packet in no supported encoding")]
    UndecodableText,

    #[error("unknown packet format")]
    UnknownFormat,
}

/// Classify and decode one datagram.
///
/// Never panics on malformed input; every failure comes back as a
/// [`DecodeError`].
pub fn decode(data: &[u8], config: &DecoderConfig) -> Result<Frame, DecodeError> {
    if data.is_empty() {
        return Err(DecodeError::EmptyPacket);
    }
    if data.len() > config.max_packet_size {
        return Err(DecodeError::Oversized {
            length: data.len(),
            max: config.max_packet_size,
        });
    }

    if modbus::claims(data, config) {
        let registers = modbus::parse(data, config)?;
        return Ok(Frame::WindReading { registers });
    }

    // The vendor frame shares its length range with short text packets, so
    // a header mismatch falls through to the text classifier first.
    let vendor_near_miss = data.len() == zqwl::FRAME_LENGTH;
    if vendor_near_miss {
        if let Some(registers) = zqwl::parse(data, config.register_order) {
            return Ok(Frame::WindReading { registers });
        }
    }

    match text::classify(data) {
        Ok(frame) => Ok(frame),
        Err(_) if vendor_near_miss => Err(DecodeError::HeaderMismatch),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        config::DecoderConfig,
        frame::{
            DecodeError,
            Frame,
            decode,
            modbus::{
                self,
                ChecksumKind,
                RegisterOrder,
            },
            zqwl,
        },
        types::RawRegisters,
    };

    const REGISTERS: RawRegisters = RawRegisters {
        speed: 52,
        level: 3,
        angle: 1800,
        code: 0x08,
    };

    #[test]
    fn it_rejects_empty_and_tiny_packets_without_panicking() {
        let config = DecoderConfig::default();

        assert_eq!(decode(&[], &config), Err(DecodeError::EmptyPacket));
        assert!(decode(&[0x80], &config).is_err());
    }

    #[test]
    fn it_rejects_oversized_packets_before_classifying() {
        let config = DecoderConfig::default();
        let data = vec![0u8; config.max_packet_size + 1];

        assert_eq!(
            decode(&data, &config),
            Err(DecodeError::Oversized {
                length: config.max_packet_size + 1,
                max: config.max_packet_size,
            })
        );
    }

    #[test]
    fn it_round_trips_a_report_frame_in_every_wire_variant() {
        for checksum in [ChecksumKind::Crc16Modbus, ChecksumKind::Sum16] {
            for register_order in [RegisterOrder::Big, RegisterOrder::Little] {
                let config = DecoderConfig {
                    checksum,
                    register_order,
                    ..DecoderConfig::default()
                };
                let frame = modbus::encode(&REGISTERS, &config);

                assert_eq!(
                    decode(&frame, &config),
                    Ok(Frame::WindReading {
                        registers: REGISTERS
                    }),
                    "{checksum:?} / {register_order:?}",
                );
            }
        }
    }

    #[test]
    fn it_reports_a_corrupted_checksum_instead_of_a_reading() {
        let config = DecoderConfig::default();
        let mut frame = modbus::encode(&REGISTERS, &config);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;

        assert!(matches!(
            decode(&frame, &config),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn it_reports_a_corrupted_payload_as_a_checksum_mismatch() {
        let config = DecoderConfig::default();
        let mut frame = modbus::encode(&REGISTERS, &config);
        frame[5] ^= 0xff;

        assert!(matches!(
            decode(&frame, &config),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn it_decodes_a_vendor_frame() {
        let config = DecoderConfig::default();
        let frame = zqwl::encode(&REGISTERS, config.device_address, config.register_order);

        assert_eq!(frame.len(), zqwl::FRAME_LENGTH);
        assert_eq!(
            decode(&frame, &config),
            Ok(Frame::WindReading {
                registers: REGISTERS
            })
        );
    }

    #[test]
    fn it_reports_a_header_mismatch_for_a_vendor_length_near_miss() {
        let config = DecoderConfig::default();
        let mut frame = zqwl::encode(&REGISTERS, config.device_address, config.register_order);
        frame[5] = 0x0c;

        assert_eq!(decode(&frame, &config), Err(DecodeError::HeaderMismatch));
    }

    #[test]
    fn it_never_decodes_a_truncated_vendor_frame_as_a_reading() {
        let config = DecoderConfig::default();
        let frame = zqwl::encode(&REGISTERS, config.device_address, config.register_order);

        assert!(!matches!(
            decode(&frame[..16], &config),
            Ok(Frame::WindReading { .. })
        ));
    }

    #[test]
    fn it_classifies_heartbeats_and_registrations() {
        let config = DecoderConfig::default();

        assert_eq!(
            decode(b"keep-alive #42", &config),
            Ok(Frame::Heartbeat {
                text: "keep-alive #42".to_owned()
            })
        );
        assert_eq!(
            decode(b"device_info model=WS-1", &config),
            Ok(Frame::Registration {
                text: "device_info model=WS-1".to_owned()
            })
        );
    }

    #[test]
    fn it_decodes_a_gbk_heartbeat() {
        // "心跳 heartbeat" in GBK; the lead bytes are invalid UTF-8
        let data = [
            0xd0, 0xc4, 0xcc, 0xf8, b' ', b'h', b'e', b'a', b'r', b't', b'b', b'e', b'a', b't',
        ];

        assert_eq!(
            decode(&data, &DecoderConfig::default()),
            Ok(Frame::Heartbeat {
                text: "心跳 heartbeat".to_owned()
            })
        );
    }

    #[test]
    fn it_rejects_bytes_no_supported_encoding_accepts() {
        assert_eq!(
            decode(&[0xff, 0xff], &DecoderConfig::default()),
            Err(DecodeError::UndecodableText)
        );
    }

    #[test]
    fn it_does_not_mistake_binary_garbage_for_text() {
        // valid UTF-8, but control characters are not sensor text
        assert_eq!(
            decode(&[0x00, 0x01, 0x02], &DecoderConfig::default()),
            Err(DecodeError::UnknownFormat)
        );
    }
}
