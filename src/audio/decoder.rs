//! Audio decoding with symphonia and resampling with rubato

use super::traits::AudioLoader;
use crate::error::InferenceError;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 4096;

/// Decodes any format symphonia understands into mono f32 at the requested rate
#[derive(Debug, Clone, Copy, Default)]
pub struct SymphoniaLoader;

impl SymphoniaLoader {
    pub fn new() -> Self {
        Self
    }
}

impl AudioLoader for SymphoniaLoader {
    fn load(&self, path: &Path, sample_rate: u32) -> Result<Vec<f32>, InferenceError> {
        if !path.exists() {
            return Err(InferenceError::AudioNotFound(path.to_path_buf()));
        }

        log::debug!("Loading audio: {:?} at {} Hz", path, sample_rate);

        let (samples, native_rate) = decode_to_mono(path).map_err(|message| {
            InferenceError::Decode {
                path: path.to_path_buf(),
                message,
            }
        })?;

        let samples = if native_rate == sample_rate {
            samples
        } else {
            log::debug!("Resampling from {} Hz to {} Hz", native_rate, sample_rate);
            resample_mono(&samples, native_rate, sample_rate).map_err(|message| {
                InferenceError::Decode {
                    path: path.to_path_buf(),
                    message,
                }
            })?
        };

        log::debug!(
            "Loaded {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f64 / sample_rate as f64
        );
        Ok(samples)
    }
}

/// Decode an audio file to mono f32 samples at its native sample rate
pub fn decode_to_mono(path: &Path) -> Result<(Vec<f32>, u32), String> {
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Failed to open audio file {:?}: {}", path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(ext.to_str().unwrap_or(""));
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| format!("Failed to probe audio format: {}", e))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| "No audio track found".to_string())?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| "No sample rate in audio track".to_string())?;

    let dec_opts = DecoderOptions::default();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &dec_opts)
        .map_err(|e| format!("Failed to create audio decoder: {}", e))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {:?}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Error decoding packet: {:?}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        let channels = spec.channels.count();
        if channels > 1 {
            for chunk in samples.chunks(channels) {
                let mono: f32 = chunk.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if all_samples.is_empty() {
        return Err("No audio samples decoded".to_string());
    }

    Ok((all_samples, sample_rate))
}

/// Sinc-resample a mono signal. Output length is `len * to / from`, rounded.
pub fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, String> {
    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        return Err(format!("Invalid resample rates {} -> {}", from_rate, to_rate));
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| format!("Failed to create resampler: {}", e))?;

    let expected_len = (samples.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected_len + delay + RESAMPLE_CHUNK);

    let mut position = 0;
    while position + RESAMPLE_CHUNK <= samples.len() {
        let input: [&[f32]; 1] = [&samples[position..position + RESAMPLE_CHUNK]];
        let frames = resampler
            .process(&input[..], None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        output.extend_from_slice(&frames[0]);
        position += RESAMPLE_CHUNK;
    }

    if position < samples.len() {
        let tail: [&[f32]; 1] = [&samples[position..]];
        let frames = resampler
            .process_partial(Some(&tail[..]), None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        output.extend_from_slice(&frames[0]);
    }

    // Flush the filter until the delayed tail has been emitted
    while output.len() < expected_len + delay {
        let frames = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    let mut resampled: Vec<f32> = output.into_iter().skip(delay).collect();
    resampled.truncate(expected_len);
    Ok(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_not_found() {
        let result = SymphoniaLoader::new().load(Path::new("/nonexistent/file.wav"), 16000);
        assert!(matches!(result, Err(InferenceError::AudioNotFound(_))));
    }

    #[test]
    fn test_resample_length() {
        let samples: Vec<f32> = (0..44100)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
            .collect();
        let resampled = resample_mono(&samples, 44100, 16000).unwrap();
        assert_eq!(resampled.len(), 16000);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        assert_eq!(resample_mono(&samples, 16000, 16000).unwrap(), samples);
    }
}
