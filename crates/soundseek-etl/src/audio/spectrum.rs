//! Short-time Fourier transform and per-frame spectral shape features.

use std::f32::consts::PI;

use rustfft::{num_complex::Complex, FftPlanner};

/// FFT window length in samples.
pub const N_FFT: usize = 2048;

/// Hop between successive frames in samples.
pub const HOP_LENGTH: usize = 512;

/// Fraction of spectral magnitude below the rolloff frequency.
pub const ROLLOFF_PERCENT: f64 = 0.85;

/// Magnitude spectrogram: one row of `n_fft / 2 + 1` bins per frame.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    sample_rate: u32,
    n_fft: usize,
    hop_length: usize,
    frames: Vec<Vec<f32>>,
}

impl Spectrogram {
    /// STFT with the default window and hop.
    pub fn compute(samples: &[f32], sample_rate: u32) -> Self {
        Self::with_params(samples, sample_rate, N_FFT, HOP_LENGTH)
    }

    /// Centred STFT: the signal is zero padded by `n_fft / 2` on both sides
    /// and every frame is weighted by a periodic Hann window.
    #[allow(clippy::cast_precision_loss)]
    pub fn with_params(samples: &[f32], sample_rate: u32, n_fft: usize, hop_length: usize) -> Self {
        let hop_length = hop_length.max(1);
        if samples.is_empty() || n_fft == 0 {
            return Self {
                sample_rate,
                n_fft,
                hop_length,
                frames: Vec::new(),
            };
        }

        let pad = n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let window: Vec<f32> = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n_fft as f32).cos())
            .collect();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let n_bins = n_fft / 2 + 1;
        let n_frames = 1 + (padded.len() - n_fft) / hop_length;

        let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
        let mut frames = Vec::with_capacity(n_frames);
        for t in 0..n_frames {
            let start = t * hop_length;
            for ((slot, &s), &w) in buffer
                .iter_mut()
                .zip(&padded[start..start + n_fft])
                .zip(&window)
            {
                *slot = Complex::new(s * w, 0.0);
            }
            fft.process(&mut buffer);
            frames.push(buffer[..n_bins].iter().map(|c| c.norm()).collect());
        }

        Self {
            sample_rate,
            n_fft,
            hop_length,
            frames,
        }
    }

    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub const fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub const fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn n_bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn frames(&self) -> &[Vec<f32>] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames per second.
    pub fn frame_rate(&self) -> f64 {
        f64::from(self.sample_rate) / f64_from_usize(self.hop_length)
    }

    /// Centre frequency of every bin in Hz.
    pub fn bin_frequencies(&self) -> Vec<f64> {
        let step = f64::from(self.sample_rate) / f64_from_usize(self.n_fft);
        (0..self.n_bins()).map(|k| f64_from_usize(k) * step).collect()
    }

    /// Squared magnitudes, frame by frame.
    pub fn power(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.frames
            .iter()
            .map(|frame| frame.iter().map(|&m| f64::from(m) * f64::from(m)).collect())
    }
}

#[allow(clippy::cast_precision_loss)]
pub(crate) const fn f64_from_usize(n: usize) -> f64 {
    n as f64
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64_from_usize(count)
    }
}

fn frame_centroid(frame: &[f32], freqs: &[f64]) -> Option<f64> {
    let total: f64 = frame.iter().map(|&m| f64::from(m)).sum();
    if total <= 0.0 {
        return None;
    }
    let weighted: f64 = frame
        .iter()
        .zip(freqs)
        .map(|(&m, &f)| f64::from(m) * f)
        .sum();
    Some(weighted / total)
}

/// Mean spectral centroid in Hz.
pub fn spectral_centroid(spec: &Spectrogram) -> f64 {
    let freqs = spec.bin_frequencies();
    mean(
        spec.frames()
            .iter()
            .map(|frame| frame_centroid(frame, &freqs).unwrap_or(0.0)),
    )
}

/// Mean spectral bandwidth (magnitude-weighted deviation around the centroid) in Hz.
pub fn spectral_bandwidth(spec: &Spectrogram) -> f64 {
    let freqs = spec.bin_frequencies();
    mean(spec.frames().iter().map(|frame| {
        let Some(centroid) = frame_centroid(frame, &freqs) else {
            return 0.0;
        };
        let total: f64 = frame.iter().map(|&m| f64::from(m)).sum();
        let variance: f64 = frame
            .iter()
            .zip(&freqs)
            .map(|(&m, &f)| f64::from(m) * (f - centroid).powi(2))
            .sum::<f64>()
            / total;
        variance.sqrt()
    }))
}

/// Mean rolloff frequency in Hz for `roll_percent` of the magnitude.
pub fn spectral_rolloff(spec: &Spectrogram, roll_percent: f64) -> f64 {
    let freqs = spec.bin_frequencies();
    mean(spec.frames().iter().map(|frame| {
        let total: f64 = frame.iter().map(|&m| f64::from(m)).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let threshold = roll_percent * total;
        let mut cumulative = 0.0;
        for (&m, &f) in frame.iter().zip(&freqs) {
            cumulative += f64::from(m);
            if cumulative >= threshold {
                return f;
            }
        }
        freqs.last().copied().unwrap_or(0.0)
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sine(freq: f32, secs: f32, rate: u32) -> Vec<f32> {
        let n = (secs * rate as f32) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_frame_count_is_centred() {
        let spec = Spectrogram::compute(&vec![0.0; 22050], 22050);
        assert_eq!(spec.frames().len(), 1 + 22050 / HOP_LENGTH);
        assert_eq!(spec.frames()[0].len(), N_FFT / 2 + 1);
    }

    #[test]
    fn test_empty_signal_has_no_frames() {
        let spec = Spectrogram::compute(&[], 22050);
        assert!(spec.is_empty());
        assert_eq!(spectral_centroid(&spec), 0.0);
        assert_eq!(spectral_rolloff(&spec, ROLLOFF_PERCENT), 0.0);
    }

    #[test]
    fn test_bin_frequencies() {
        let spec = Spectrogram::compute(&[0.0; 16], 22050);
        let freqs = spec.bin_frequencies();
        assert_eq!(freqs.len(), 1025);
        assert_eq!(freqs[0], 0.0);
        assert!((freqs[1024] - 11025.0).abs() < 1e-9);
    }

    #[test]
    fn test_sine_centroid_near_tone() {
        let spec = Spectrogram::compute(&sine(1000.0, 1.0, 22050), 22050);
        let centroid = spectral_centroid(&spec);
        assert!((centroid - 1000.0).abs() < 50.0, "centroid {centroid}");
    }

    #[test]
    fn test_sine_bandwidth_is_narrow() {
        let spec = Spectrogram::compute(&sine(1000.0, 1.0, 22050), 22050);
        let bandwidth = spectral_bandwidth(&spec);
        assert!(bandwidth > 0.0 && bandwidth < 300.0, "bandwidth {bandwidth}");
    }

    #[test]
    fn test_sine_rolloff_above_tone() {
        let spec = Spectrogram::compute(&sine(1000.0, 1.0, 22050), 22050);
        let rolloff = spectral_rolloff(&spec, ROLLOFF_PERCENT);
        assert!(rolloff >= 990.0 && rolloff < 1100.0, "rolloff {rolloff}");
    }

    #[test]
    fn test_silence_features_are_zero() {
        let spec = Spectrogram::compute(&vec![0.0; 4096], 22050);
        assert_eq!(spectral_centroid(&spec), 0.0);
        assert_eq!(spectral_bandwidth(&spec), 0.0);
        assert_eq!(spectral_rolloff(&spec, ROLLOFF_PERCENT), 0.0);
    }
}
