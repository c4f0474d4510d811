//! In-memory WAV encoding for upload.

use anyhow::{Context, Result};
use std::io::Cursor;

/// Target sample rate for everything downstream of capture.
pub const SAMPLE_RATE: u32 = 16_000;

/// WAV MIME type sent with the upload.
pub const MIME_TYPE: &str = "audio/wav";

/// Encode mono f32 samples as a 16-bit PCM WAV file in memory.
///
/// Samples are clamped to [-1, 1] before conversion so out-of-range values
/// saturate instead of wrapping.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer.write_sample(value).context("failed to write WAV sample")?;
        }
        writer.finalize().context("failed to finalize WAV data")?;
    }

    Ok(cursor.into_inner())
}
