use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::frame::PcmFrame;
use crate::error::Result;

/// Float samples to signed 16-bit PCM.
///
/// Samples are clamped to [-1.0, 1.0]. Negative values scale by 32768 and
/// non-negative ones by 32767, so both ends map exactly onto the i16 range.
/// Receivers decode with this asymmetric scale; keep it.
pub fn encode(samples: &[f32]) -> PcmFrame {
    PcmFrame::new(samples.iter().map(|&s| encode_sample(s)).collect())
}

#[inline]
pub fn encode_sample(sample: f32) -> i16 {
    // NaN falls through clamp and saturates to 0 in the cast.
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0).round() as i16
    } else {
        (s * 32767.0).round() as i16
    }
}

/// Text-safe payload for the JSON envelope: base64 of the little-endian bytes.
pub fn to_base64(frame: &PcmFrame) -> String {
    STANDARD.encode(frame.to_le_bytes())
}

pub fn bytes_to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn bytes_from_base64(text: &str) -> Result<Vec<u8>> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    Ok(STANDARD.decode(text)?)
}
