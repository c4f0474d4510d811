//! High-pass filtering of captured speech before encoding.
//!
//! A 4th-order Butterworth high-pass at 100 Hz knocks out mains hum, desk
//! thumps and HVAC rumble without touching the voice band. It is realized as
//! two cascaded biquad sections (RBJ audio-EQ cookbook coefficients).

use std::f64::consts::PI;

/// Cutoff frequency of the high-pass, in Hz.
pub const CUTOFF_HZ: f64 = 100.0;

/// Recordings at or below this many samples skip filtering entirely; the
/// filter transient would dominate such a short clip.
pub const MIN_SAMPLES_FOR_FILTER: usize = 800;

/// Section Q values for a 4th-order Butterworth response split into two
/// second-order stages.
const BUTTERWORTH_4_Q: [f64; 2] = [0.541_196_1, 1.306_563_0];

/// Second-order IIR section in transposed direct form II.
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// High-pass section from the RBJ cookbook, normalized so a0 = 1.
    fn high_pass(sample_rate: f64, cutoff: f64, q: f64) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

/// Apply the high-pass in place when the clip is long enough to benefit.
///
/// Clips of [`MIN_SAMPLES_FOR_FILTER`] samples or fewer are returned
/// untouched. Output is clamped to [-1, 1] so the later i16 conversion
/// cannot wrap.
#[must_use]
pub fn maybe_high_pass(mut samples: Vec<f32>, sample_rate: u32) -> Vec<f32> {
    if samples.len() <= MIN_SAMPLES_FOR_FILTER {
        tracing::debug!(samples = samples.len(), "clip too short, skipping high-pass");
        return samples;
    }

    let rate = f64::from(sample_rate);
    let mut sections = [
        Biquad::high_pass(rate, CUTOFF_HZ, BUTTERWORTH_4_Q[0]),
        Biquad::high_pass(rate, CUTOFF_HZ, BUTTERWORTH_4_Q[1]),
    ];

    for sample in &mut samples {
        let mut x = f64::from(*sample);
        for section in &mut sections {
            x = section.process(x);
        }
        #[allow(clippy::cast_possible_truncation)]
        {
            *sample = (x as f32).clamp(-1.0, 1.0);
        }
    }

    samples
}
