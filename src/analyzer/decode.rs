use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("No decodable audio track")]
    NoTrack,
    #[error("symphonia decode error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("FLAC decode error: {0}")]
    Flac(#[from] claxon::Error),
    #[error("Decoded stream contains no samples")]
    Empty,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mono PCM at the file's native sample rate.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl MonoAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Decode an audio file to mono, using claxon for FLAC and symphonia
/// for everything else. Channels are averaged.
pub fn decode_to_mono(path: &Path) -> Result<MonoAudio, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let audio = if ext == "flac" {
        decode_flac(path)?
    } else {
        decode_with_symphonia(path, &ext)?
    };

    if audio.samples.is_empty() {
        return Err(DecodeError::Empty);
    }

    log::debug!(
        "Decoded {}: {} samples @ {} Hz ({:.1}s)",
        path.display(),
        audio.samples.len(),
        audio.sample_rate,
        audio.duration_secs()
    );
    Ok(audio)
}

fn decode_flac(path: &Path) -> Result<MonoAudio, DecodeError> {
    let mut reader = claxon::FlacReader::open(path)?;
    let info = reader.streaminfo();
    let channels = info.channels.max(1) as usize;
    let bits = info.bits_per_sample.clamp(1, 32);
    let scale = 1.0 / (1u64 << (bits - 1)) as f32;

    let mut samples = Vec::with_capacity(info.samples.unwrap_or(0) as usize);
    let mut acc = 0.0f32;
    let mut filled = 0;
    for sample in reader.samples() {
        acc += sample? as f32 * scale;
        filled += 1;
        if filled == channels {
            samples.push(acc / channels as f32);
            acc = 0.0;
            filled = 0;
        }
    }

    Ok(MonoAudio {
        samples,
        sample_rate: info.sample_rate,
    })
}

fn decode_with_symphonia(path: &Path, ext: &str) -> Result<MonoAudio, DecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if !ext.is_empty() {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frame: drop it and keep going
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping bad packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend(
            buf.samples()
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    Ok(MonoAudio {
        samples,
        sample_rate,
    })
}
