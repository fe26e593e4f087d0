//! Mel spectrogram front end for the embedding models
//!
//! 96 mel bands, 512-sample frames, 256-sample hop, log10(1 + 10000 x)
//! compression. Input is expected at the model's sample rate (16 kHz for
//! both MusiCNN and Discogs-EffNet); resampling happens in the audio loader.

use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

pub const N_BANDS: usize = 96;
pub const FRAME_SIZE: usize = 512;
pub const HOP_SIZE: usize = 256;

/// Reusable mel analysis state (window, FFT plan, filterbank)
pub struct MelFrontEnd {
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    filterbank: Vec<Vec<f32>>,
}

impl MelFrontEnd {
    pub fn new(sample_rate: u32) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            window: hann_window(FRAME_SIZE),
            fft: planner.plan_fft_forward(FRAME_SIZE),
            filterbank: create_mel_filterbank(N_BANDS, FRAME_SIZE, sample_rate as f32),
        }
    }

    /// Frames x bands spectrogram. Errors if shorter than one frame.
    pub fn compute(&self, samples: &[f32]) -> Result<Vec<Vec<f32>>, String> {
        if samples.is_empty() {
            return Err("Empty input samples".to_string());
        }
        if samples.len() < FRAME_SIZE {
            return Err("Audio too short for mel spectrogram".to_string());
        }

        let n_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;
        let mut frames = Vec::with_capacity(n_frames);
        let mut windowed = self.fft.make_input_vec();
        let mut spectrum = vec![0.0f32; FRAME_SIZE / 2 + 1];

        for frame_idx in 0..n_frames {
            let start = frame_idx * HOP_SIZE;
            for (i, w) in windowed.iter_mut().enumerate() {
                *w = samples[start + i] * self.window[i];
            }

            self.power_spectrum(&mut windowed, &mut spectrum)?;

            let bands: Vec<f32> = self
                .filterbank
                .iter()
                .map(|filter| {
                    let energy: f32 = filter.iter().zip(&spectrum).map(|(c, s)| c * s).sum();
                    (1.0 + 10000.0 * energy.max(0.0)).log10()
                })
                .collect();
            frames.push(bands);
        }

        Ok(frames)
    }

    /// |X(k)|^2 / N for k in 0..=N/2. Overwrites `frame`.
    fn power_spectrum(&self, frame: &mut [f32], power: &mut [f32]) -> Result<(), String> {
        let n = frame.len() as f32;
        let mut bins = self.fft.make_output_vec();
        self.fft
            .process(frame, &mut bins)
            .map_err(|e| format!("FFT failed: {:?}", e))?;
        for (p, c) in power.iter_mut().zip(&bins) {
            *p = c.norm_sqr() / n;
        }
        Ok(())
    }
}

/// Split frames into `patch_size` patches with 50% overlap.
///
/// Short inputs are zero-padded to one patch; the tail is always covered.
pub fn extract_patches(frames: &[Vec<f32>], patch_size: usize) -> Vec<Vec<Vec<f32>>> {
    if frames.is_empty() || patch_size == 0 {
        return Vec::new();
    }

    if frames.len() < patch_size {
        let n_bands = frames[0].len();
        let mut padded = frames.to_vec();
        padded.resize(patch_size, vec![0.0; n_bands]);
        return vec![padded];
    }

    let hop = (patch_size / 2).max(1);
    let mut patches = Vec::new();
    let mut start = 0;

    while start + patch_size <= frames.len() {
        patches.push(frames[start..start + patch_size].to_vec());
        start += hop;
    }

    let last_covered = start - hop + patch_size;
    if last_covered < frames.len() {
        let last_start = frames.len() - patch_size;
        patches.push(frames[last_start..].to_vec());
    }

    patches
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

fn create_mel_filterbank(n_bands: usize, frame_size: usize, sample_rate: f32) -> Vec<Vec<f32>> {
    let n_bins = frame_size / 2 + 1;
    let mel_min = hz_to_mel(0.0);
    let mel_max = hz_to_mel(sample_rate / 2.0);

    let n_points = n_bands + 2;
    let bin_points: Vec<f32> = (0..n_points)
        .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
        .map(mel_to_hz)
        .map(|hz| hz * frame_size as f32 / sample_rate)
        .collect();

    (0..n_bands)
        .map(|band| {
            let left = bin_points[band];
            let center = bin_points[band + 1];
            let right = bin_points[band + 2];
            (0..n_bins)
                .map(|bin| {
                    let bin_f = bin as f32;
                    if bin_f >= left && bin_f <= center && center > left {
                        (bin_f - left) / (center - left)
                    } else if bin_f > center && bin_f <= right && right > center {
                        (right - bin_f) / (right - center)
                    } else {
                        0.0
                    }
                })
                .collect()
        })
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mel_hz_roundtrip() {
        let back = mel_to_hz(hz_to_mel(1000.0));
        assert!((back - 1000.0).abs() < 0.1);
    }

    #[test]
    fn test_spectrogram_shape() {
        let sr = 16000;
        let samples: Vec<f32> = (0..sr * 2)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr as f32).sin() * 0.5)
            .collect();

        let frames = MelFrontEnd::new(sr as u32).compute(&samples).unwrap();
        assert_eq!(frames.len(), (samples.len() - FRAME_SIZE) / HOP_SIZE + 1);
        assert_eq!(frames[0].len(), N_BANDS);
    }

    #[test]
    fn test_power_spectrum_peaks_at_tone_bin() {
        let front_end = MelFrontEnd::new(16000);
        // bin 32 of a 512-point frame at 16 kHz is 1000 Hz
        let mut frame: Vec<f32> = (0..FRAME_SIZE)
            .map(|i| (2.0 * std::f32::consts::PI * 32.0 * i as f32 / FRAME_SIZE as f32).sin())
            .collect();
        let mut power = vec![0.0f32; FRAME_SIZE / 2 + 1];
        front_end.power_spectrum(&mut frame, &mut power).unwrap();

        let peak = power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 32);
        // amplitude N/2 at the tone bin
        assert!((power[32] - 128.0).abs() < 0.1);
        assert!(power[0] < 1e-3);
    }

    #[test]
    fn test_too_short_input_fails() {
        assert!(MelFrontEnd::new(16000).compute(&[0.0; 100]).is_err());
    }

    #[test]
    fn test_patches_overlap_and_cover_tail() {
        let frames: Vec<Vec<f32>> = (0..10).map(|i| vec![i as f32]).collect();
        let patches = extract_patches(&frames, 4);
        // starts 0, 2, 4, 6 then the tail already ends at 10
        assert_eq!(patches.len(), 4);
        assert_eq!(patches[3][3], vec![9.0]);

        let patches = extract_patches(&frames[..9], 4);
        assert_eq!(patches.len(), 4);
        assert_eq!(patches.last().unwrap()[3], vec![8.0]);
    }

    #[test]
    fn test_short_input_is_padded() {
        let frames = vec![vec![1.0, 1.0]; 3];
        let patches = extract_patches(&frames, 5);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].len(), 5);
        assert_eq!(patches[0][4], vec![0.0, 0.0]);
    }
}
