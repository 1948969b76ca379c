//! Short-time chroma features.
//!
//! Each frame is Hann-windowed, transformed, and its power spectrum folded
//! onto the 12 A-indexed pitch classes. Frames are max-normalized so loud
//! passages do not dominate the clip summary.

use crate::key::ChromaVector;
use rustfft::{FftPlanner, num_complex::Complex};
use serde::Deserialize;
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("no samples to analyze")]
    EmptyInput,
    #[error("invalid chroma settings: {0}")]
    InvalidConfig(String),
}

/// STFT settings for chroma extraction.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChromaConfig {
    /// FFT window length in samples.
    pub n_fft: usize,
    /// Hop between consecutive frames in samples.
    pub hop_length: usize,
    /// Lowest frequency (Hz) folded into the chroma bins.
    pub min_freq: f64,
    /// Highest frequency (Hz) folded into the chroma bins.
    pub max_freq: f64,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            n_fft: 4096,
            hop_length: 2048,
            min_freq: 65.0,
            max_freq: 2000.0,
        }
    }
}

impl ChromaConfig {
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.n_fft < 2 {
            return Err(FeatureError::InvalidConfig(format!(
                "n_fft must be at least 2, got {}",
                self.n_fft
            )));
        }
        if self.hop_length == 0 {
            return Err(FeatureError::InvalidConfig("hop_length cannot be zero".into()));
        }
        if !(self.min_freq > 0.0 && self.min_freq < self.max_freq) {
            return Err(FeatureError::InvalidConfig(format!(
                "frequency range {}..{} Hz is empty",
                self.min_freq, self.max_freq
            )));
        }
        Ok(())
    }
}

/// Pitch class (A = 0) nearest to `freq` in 12-TET with A4 = 440 Hz.
pub fn pitch_class_of(freq: f64) -> usize {
    let semitones_from_a = 12.0 * (freq / 440.0).log2();
    (semitones_from_a.round() as i64).rem_euclid(12) as usize
}

/// Compute a chroma matrix (one 12-bin vector per frame).
///
/// Frames start every `hop_length` samples until one reaches the end of the
/// input; a final partial window (or input shorter than one window) is
/// zero-padded.
pub fn chroma_stft(
    samples: &[f32],
    sample_rate: u32,
    config: &ChromaConfig,
) -> Result<Vec<ChromaVector>, FeatureError> {
    config.validate()?;
    if samples.is_empty() {
        return Err(FeatureError::EmptyInput);
    }
    if sample_rate == 0 {
        return Err(FeatureError::InvalidConfig("sample rate is zero".into()));
    }

    let n_fft = config.n_fft;
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(n_fft);

    let window: Vec<f64> = (0..n_fft)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (n_fft - 1) as f64).cos()))
        .collect();

    let bin_to_pitch_class: Vec<Option<usize>> = (0..n_fft / 2 + 1)
        .map(|bin| {
            let freq = bin as f64 * sample_rate as f64 / n_fft as f64;
            (freq >= config.min_freq && freq <= config.max_freq).then(|| pitch_class_of(freq))
        })
        .collect();

    let num_frames = samples.len().saturating_sub(n_fft).div_ceil(config.hop_length) + 1;
    let mut frames = Vec::with_capacity(num_frames);
    let mut buffer = vec![Complex::new(0.0f64, 0.0); n_fft];

    for frame_idx in 0..num_frames {
        let start = frame_idx * config.hop_length;
        // Only reachable when hop_length exceeds n_fft
        if start >= samples.len() {
            break;
        }
        let end = (start + n_fft).min(samples.len());
        let frame = &samples[start..end];

        for (i, slot) in buffer.iter_mut().enumerate() {
            let s = frame.get(i).copied().unwrap_or(0.0) as f64;
            *slot = Complex::new(s * window[i], 0.0);
        }
        fft.process(&mut buffer);

        let mut chroma = [0.0f64; 12];
        for (bin, pc) in bin_to_pitch_class.iter().enumerate() {
            if let Some(pc) = pc {
                chroma[*pc] += buffer[bin].norm_sqr();
            }
        }

        let peak = chroma.iter().copied().fold(0.0f64, f64::max);
        if peak > 0.0 {
            for v in chroma.iter_mut() {
                *v /= peak;
            }
        }
        frames.push(chroma);
    }

    log::trace!(
        "chroma_stft: {} samples @ {} Hz -> {} frames",
        samples.len(),
        sample_rate,
        frames.len()
    );
    Ok(frames)
}

/// Sum a chroma matrix across frames.
pub fn aggregate(frames: &[ChromaVector]) -> ChromaVector {
    frames.iter().fold([0.0; 12], |mut acc, frame| {
        for (a, v) in acc.iter_mut().zip(frame) {
            *a += v;
        }
        acc
    })
}
