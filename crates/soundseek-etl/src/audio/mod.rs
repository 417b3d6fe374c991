pub mod chroma;
pub mod decoder;
pub mod mel;
pub mod spectrum;
pub mod tempo;

pub use chroma::{estimate_key, PITCH_CLASSES};
pub use decoder::{decode_audio, DecodedAudio};
pub use mel::{mel_spectrogram_db, mfcc_means, MelFilterbank};
pub use spectrum::{
    spectral_bandwidth, spectral_centroid, spectral_rolloff, Spectrogram, ROLLOFF_PERCENT,
};
pub use tempo::estimate_tempo;
