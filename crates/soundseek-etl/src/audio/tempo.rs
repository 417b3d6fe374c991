//! Global tempo estimate from onset-strength autocorrelation.

use super::spectrum::f64_from_usize;

pub const MIN_BPM: f64 = 30.0;
pub const MAX_BPM: f64 = 320.0;

/// Centre of the log-normal tempo prior.
pub const PRIOR_BPM: f64 = 120.0;

/// Width of the tempo prior in octaves.
const PRIOR_STD_OCTAVES: f64 = 1.0;

/// Length of the autocorrelation window in seconds.
const AC_WINDOW_SECS: f64 = 8.0;

/// Onset strength per frame: mean positive dB increase over the previous
/// frame across all mel bands. The first frame is zero.
pub fn onset_strength(mel_db: &[Vec<f64>]) -> Vec<f64> {
    let mut envelope = Vec::with_capacity(mel_db.len());
    if mel_db.is_empty() {
        return envelope;
    }
    envelope.push(0.0);
    for pair in mel_db.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let bands = cur.len().max(1);
        let rise: f64 = cur
            .iter()
            .zip(prev)
            .map(|(c, p)| (c - p).max(0.0))
            .sum();
        envelope.push(rise / f64_from_usize(bands));
    }
    envelope
}

/// Autocorrelation of `signal` for lags `0..max_lag`.
fn autocorrelation(signal: &[f64], max_lag: usize) -> Vec<f64> {
    (0..max_lag.min(signal.len()))
        .map(|lag| {
            signal[lag..]
                .iter()
                .zip(signal)
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Estimate tempo in BPM from a mel spectrogram in dB.
///
/// Returns 0 when the onset envelope is flat or too short to cover the
/// slowest tempo.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn estimate_tempo(mel_db: &[Vec<f64>], frame_rate: f64) -> f64 {
    if frame_rate <= 0.0 {
        return 0.0;
    }
    let envelope = onset_strength(mel_db);
    let largest_lag = (60.0 * frame_rate / MIN_BPM).floor() as usize;
    if envelope.len() <= largest_lag {
        return 0.0;
    }
    let window = (AC_WINDOW_SECS * frame_rate).round() as usize;
    let ac = autocorrelation(&envelope, window + 1);

    let Some(&energy) = ac.first() else {
        return 0.0;
    };
    if energy <= 0.0 {
        return 0.0;
    }

    let min_lag = ((60.0 * frame_rate / MAX_BPM).ceil() as usize).max(1);
    let max_lag = largest_lag.min(ac.len().saturating_sub(1));
    if min_lag > max_lag {
        return 0.0;
    }

    let mut best: Option<(f64, f64)> = None;
    for (lag, &value) in ac.iter().enumerate().take(max_lag + 1).skip(min_lag) {
        let bpm = 60.0 * frame_rate / f64_from_usize(lag);
        let strength = (1.0 + 1e6 * (value / energy).max(0.0)).ln();
        let prior = -0.5 * ((bpm.log2() - PRIOR_BPM.log2()) / PRIOR_STD_OCTAVES).powi(2);
        let score = strength + prior;
        match best {
            Some((top, _)) if top >= score => {}
            _ => best = Some((score, bpm)),
        }
    }

    best.map_or(0.0, |(_, bpm)| bpm)
}
