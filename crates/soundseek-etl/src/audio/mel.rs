//! Mel filterbank, log-power mel spectrogram and MFCCs.

use std::f64::consts::PI;

use super::spectrum::{f64_from_usize, Spectrogram};

/// Number of mel bands.
pub const N_MELS: usize = 128;

/// Power floor before conversion to decibels.
pub const AMIN: f64 = 1e-10;

/// Dynamic range kept below the loudest mel bin, in dB.
pub const TOP_DB: f64 = 80.0;

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filters with Slaney area normalisation.
#[derive(Debug, Clone)]
pub struct MelFilterbank {
    weights: Vec<Vec<f64>>,
}

impl MelFilterbank {
    /// Filters spanning 0 Hz to Nyquist.
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize) -> Self {
        let n_bins = n_fft / 2 + 1;
        let nyquist = f64::from(sample_rate) / 2.0;
        let fft_freqs: Vec<f64> = (0..n_bins)
            .map(|k| f64_from_usize(k) * f64::from(sample_rate) / f64_from_usize(n_fft))
            .collect();

        let max_mel = hz_to_mel(nyquist);
        let edges: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * f64_from_usize(i) / f64_from_usize(n_mels + 1)))
            .collect();

        let weights = edges
            .windows(3)
            .map(|w| {
                let (lower, centre, upper) = (w[0], w[1], w[2]);
                let enorm = 2.0 / (upper - lower);
                fft_freqs
                    .iter()
                    .map(|&f| {
                        let rising = (f - lower) / (centre - lower);
                        let falling = (upper - f) / (upper - centre);
                        rising.min(falling).max(0.0) * enorm
                    })
                    .collect()
            })
            .collect();

        Self { weights }
    }

    pub fn for_spectrogram(spec: &Spectrogram) -> Self {
        Self::new(spec.sample_rate(), spec.n_fft(), N_MELS)
    }

    pub fn n_mels(&self) -> usize {
        self.weights.len()
    }

    /// Project one power spectrum frame onto the mel bands.
    pub fn apply(&self, power: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .map(|band| band.iter().zip(power).map(|(w, p)| w * p).sum())
            .collect()
    }
}

/// Log-power mel spectrogram (frames x bands) in dB relative to 1.0,
/// clipped to [`TOP_DB`] below its maximum.
pub fn mel_spectrogram_db(spec: &Spectrogram, filterbank: &MelFilterbank) -> Vec<Vec<f64>> {
    let mut db: Vec<Vec<f64>> = spec
        .power()
        .map(|frame| {
            filterbank
                .apply(&frame)
                .into_iter()
                .map(|p| 10.0 * p.max(AMIN).log10())
                .collect()
        })
        .collect();

    let peak = db
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let floor = peak - TOP_DB;
    for value in db.iter_mut().flatten() {
        *value = value.max(floor);
    }
    db
}

/// Orthonormal DCT-II of `input`, keeping the first `n_out` coefficients.
pub fn dct_ortho(input: &[f64], n_out: usize) -> Vec<f64> {
    let n = f64_from_usize(input.len());
    (0..n_out)
        .map(|k| {
            let kf = f64_from_usize(k);
            let sum: f64 = input
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (PI * kf * (2.0 * f64_from_usize(i) + 1.0) / (2.0 * n)).cos())
                .sum();
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            sum * scale
        })
        .collect()
}

/// Mean of each of the first `N` MFCCs over all frames.
pub fn mfcc_means<const N: usize>(mel_db: &[Vec<f64>]) -> [f64; N] {
    let mut means = [0.0; N];
    if mel_db.is_empty() {
        return means;
    }
    for frame in mel_db {
        for (acc, c) in means.iter_mut().zip(dct_ortho(frame, N)) {
            *acc += c;
        }
    }
    let count = f64_from_usize(mel_db.len());
    for value in &mut means {
        *value /= count;
    }
    means
}
