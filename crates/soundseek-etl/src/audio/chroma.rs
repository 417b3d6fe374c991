//! Pitch-class profile and key estimate.

use super::spectrum::{f64_from_usize, Spectrogram};

/// Pitch class names, starting at C.
pub const PITCH_CLASSES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Bins below this frequency carry no pitch.
const MIN_PITCH_HZ: f64 = 20.0;

/// Pitch class of a frequency: nearest MIDI note modulo 12 (0 = C).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pitch_class(freq_hz: f64) -> Option<usize> {
    if freq_hz < MIN_PITCH_HZ {
        return None;
    }
    let midi = (12.0 * (freq_hz / 440.0).log2() + 69.0).round();
    Some(midi.rem_euclid(12.0) as usize)
}

/// Per-frame chroma: power summed per pitch class, each frame scaled so its
/// largest class is 1. Silent frames stay zero.
pub fn chroma(spec: &Spectrogram) -> Vec<[f64; 12]> {
    let classes: Vec<Option<usize>> = spec
        .bin_frequencies()
        .into_iter()
        .map(pitch_class)
        .collect();

    spec.power()
        .map(|frame| {
            let mut bins = [0.0f64; 12];
            for (power, class) in frame.iter().zip(&classes) {
                if let Some(c) = class {
                    bins[*c] += power;
                }
            }
            let peak = bins.iter().copied().fold(0.0, f64::max);
            if peak > 0.0 {
                for value in &mut bins {
                    *value /= peak;
                }
            }
            bins
        })
        .collect()
}

/// Mean chroma vector over all frames.
pub fn mean_chroma(frames: &[[f64; 12]]) -> [f64; 12] {
    let mut mean = [0.0; 12];
    if frames.is_empty() {
        return mean;
    }
    for frame in frames {
        for (acc, v) in mean.iter_mut().zip(frame) {
            *acc += v;
        }
    }
    let count = f64_from_usize(frames.len());
    for value in &mut mean {
        *value /= count;
    }
    mean
}

/// Name of the strongest pitch class. Ties resolve to the lowest class, so
/// silence reads as `C`.
pub fn estimate_key(spec: &Spectrogram) -> &'static str {
    let mean = mean_chroma(&chroma(spec));
    let mut best = 0;
    for (i, &value) in mean.iter().enumerate() {
        if value > mean[best] {
            best = i;
        }
    }
    PITCH_CLASSES[best]
}
