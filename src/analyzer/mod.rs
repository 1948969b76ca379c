pub mod chroma;
pub mod decode;

use crate::key::{self, ChromaVector, DetectedKey, KeyError, KeyMethod, PitchClass};
use chroma::ChromaConfig;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Decode error: {0}")]
    Decode(#[from] decode::DecodeError),
    #[error("Feature extraction error: {0}")]
    Feature(#[from] chroma::FeatureError),
    #[error("Key estimation error: {0}")]
    Key(#[from] KeyError),
}

/// Settings shared by every file in a run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisSettings {
    pub method: KeyMethod,
    pub chroma: ChromaConfig,
}

/// Everything learned about one file.
#[derive(Debug, Clone)]
pub struct TrackKey {
    pub detected: DetectedKey,
    pub label: PitchClass,
    pub chroma: ChromaVector,
    pub duration_secs: f64,
}

/// Decode → chroma → estimate → canonicalize.
pub fn analyze_file(path: &Path, settings: &AnalysisSettings) -> Result<TrackKey, AnalyzeError> {
    log::debug!(
        "Analyzing: {}",
        path.file_name().and_then(|f| f.to_str()).unwrap_or("?")
    );

    let audio = decode::decode_to_mono(path)?;
    let frames = chroma::chroma_stft(&audio.samples, audio.sample_rate, &settings.chroma)?;
    let summary = chroma::aggregate(&frames);

    let detected = key::estimate_with(&summary, settings.method)?;
    let label = detected.canonical()?;

    Ok(TrackKey {
        detected,
        label,
        chroma: summary,
        duration_secs: audio.duration_secs(),
    })
}

/// Canonical key label for a file, or `None` when no key could be determined.
/// The failure is logged with the offending path.
pub fn canonical_key(path: &Path, settings: &AnalysisSettings) -> Option<PitchClass> {
    match analyze_file(path, settings) {
        Ok(track) => {
            log::debug!(
                "{}: {} -> {}",
                path.display(),
                track.detected,
                track.label
            );
            Some(track.label)
        }
        Err(e) => {
            log::warn!("Error detecting key for {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn write_tone(path: &Path, freqs: &[f64], sample_rate: u32, secs: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (sample_rate as f64 * secs) as usize;
        for i in 0..n {
            let t = i as f64 / sample_rate as f64;
            let v = if freqs.is_empty() {
                0.0
            } else {
                freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f64>() / freqs.len() as f64
            };
            writer.write_sample((v * 12000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_analyze_tone_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a440.wav");
        write_tone(&path, &[440.0], 22050, 1.5);

        let track = analyze_file(&path, &AnalysisSettings::default()).unwrap();
        assert_eq!(track.detected.tonic, PitchClass::A);
        assert_eq!(track.label, track.detected.canonical().unwrap());
        assert!((track.duration_secs - 1.5).abs() < 0.01);
    }

    #[test]
    fn test_silent_file_has_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silence.wav");
        write_tone(&path, &[], 22050, 0.5);

        let err = analyze_file(&path, &AnalysisSettings::default()).unwrap_err();
        assert!(matches!(err, AnalyzeError::Key(KeyError::SilentChroma)));
        assert_eq!(canonical_key(&path, &AnalysisSettings::default()), None);
    }

    #[test]
    fn test_corrupt_file_has_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wav");
        std::fs::write(&path, b"definitely not a wave file").unwrap();

        assert!(matches!(
            analyze_file(&path, &AnalysisSettings::default()),
            Err(AnalyzeError::Decode(_))
        ));
        assert_eq!(canonical_key(&path, &AnalysisSettings::default()), None);
    }
}
