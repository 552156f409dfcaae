//! Text packets: heartbeats and registrations.
//!
//! Field devices ship with firmware that speaks either UTF-8 or a legacy
//! Chinese encoding, so decoding tries a fixed priority list instead of
//! assuming one charset.

use encoding_rs::GBK;

use crate::frame::{
    DecodeError,
    Frame,
};

/// Markers that identify a keep-alive packet, matched case-insensitively.
pub const HEARTBEAT_MARKERS: [&str; 6] = [
    "heartbeat",
    "ping",
    "alive",
    "keep-alive",
    "heart_beat",
    "keepalive",
];

/// Decode bytes under the first encoding that accepts them strictly.
///
/// Priority: UTF-8, then GBK. The WHATWG registry resolves the `gb2312`
/// label to the same GBK decoder, and strict UTF-8 accepts all 7 bit
/// ASCII, so these two attempts cover the whole supported set. A decode
/// that would substitute replacement characters counts as failure.
///
/// UTF-8 first matters: strict UTF-8 rejects almost every GBK multi-byte
/// sequence, so the order cannot misread GBK as UTF-8 garbage.
pub fn detect_and_decode(data: &[u8]) -> Option<String> {
    if let Ok(text) = str::from_utf8(data) {
        return Some(text.to_owned());
    }

    let (text, had_errors) = GBK.decode_without_bom_handling(data);
    (!had_errors).then(|| text.into_owned())
}

/// Classify a packet that matched neither binary format.
pub fn classify(data: &[u8]) -> Result<Frame, DecodeError> {
    let text = detect_and_decode(data).ok_or(DecodeError::UndecodableText)?;

    if !is_plausible_text(&text) {
        // GBK will happily decode most binary byte pairs; don't let garbage
        // masquerade as a registration
        return Err(DecodeError::UnknownFormat);
    }

    let lower = text.to_lowercase();
    if HEARTBEAT_MARKERS.iter().any(|marker| lower.contains(marker)) {
        Ok(Frame::Heartbeat { text })
    }
    else {
        Ok(Frame::Registration { text })
    }
}

/// A lone character is line noise, not a message.
const MIN_TEXT_CHARS: usize = 2;

fn is_plausible_text(text: &str) -> bool {
    text.trim().chars().count() >= MIN_TEXT_CHARS
        && text
            .chars()
            .all(|c| !c.is_control() || matches!(c, '\r' | '\n' | '\t'))
}
