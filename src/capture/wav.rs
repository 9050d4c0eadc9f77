//! RIFF/WAVE container synthesis.
//!
//! The capture path stores raw payload bytes exactly as received and wraps
//! them in a 44-byte canonical header at finalize time. No resampling, no
//! format conversion.

pub const WAV_HEADER_LEN: usize = 44;
pub const CONTENT_TYPE_WAV: &str = "audio/wav";

/// WAV `fmt ` format code for linear PCM.
pub const FORMAT_CODE_PCM: u16 = 1;
/// WAV `fmt ` format code for G.711 mu-law.
pub const FORMAT_CODE_MULAW: u16 = 7;

/// Each role is persisted as its own mono channel.
const NUM_CHANNELS: u16 = 1;

/// Audio parameters detected from the first chunk of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate_hz: u32,
    pub bits_per_sample: u16,
    pub format_code: u16,
}

/// Build the canonical 44-byte little-endian WAV header for `payload_len`
/// bytes of audio in the given format.
pub fn wav_header(payload_len: u32, format: StreamFormat) -> [u8; WAV_HEADER_LEN] {
    // Widen before multiplying: a wire-legal sample rate near u32::MAX must
    // truncate into the 32-bit field, not overflow.
    let byte_rate = (u64::from(format.sample_rate_hz)
        * u64::from(NUM_CHANNELS)
        * u64::from(format.bits_per_sample)
        / 8) as u32;
    let block_align = (u32::from(NUM_CHANNELS) * u32::from(format.bits_per_sample) / 8) as u16;

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&(payload_len + 36).to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&format.format_code.to_le_bytes());
    header[22..24].copy_from_slice(&NUM_CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&format.sample_rate_hz.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&format.bits_per_sample.to_le_bytes());
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&payload_len.to_le_bytes());
    header
}

/// Concatenate header and raw payload into a complete WAV file image.
pub fn wav_file(format: StreamFormat, payload: &[u8]) -> Vec<u8> {
    let mut file = Vec::with_capacity(WAV_HEADER_LEN + payload.len());
    file.extend_from_slice(&wav_header(payload.len() as u32, format));
    file.extend_from_slice(payload);
    file
}
