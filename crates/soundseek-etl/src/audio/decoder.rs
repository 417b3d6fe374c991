use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio as mono PCM samples at a specific sample rate.
#[derive(Debug)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub duration_secs: f64,
}

/// Decode an audio file to mono PCM at `target_sample_rate`.
///
/// Channels are averaged; the result is linearly resampled when the
/// source rate differs. Corrupt packets are skipped.
pub fn decode_audio(path: &Path, target_sample_rate: u32) -> Result<DecodedAudio> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Failed to probe audio format: {}", path.display()))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .context("No default audio track found")?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut source_rate = codec_params.sample_rate;
    let mut channels = codec_params.channels.map(|c| c.count());
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e).context("Failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let audio_buf = match decoder.decode(&packet) {
            Ok(buf) => buf,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet in {}: {}", path.display(), msg);
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode packet"),
        };

        let spec = *audio_buf.spec();
        let frames = audio_buf.capacity();
        if source_rate.is_none() {
            source_rate = Some(spec.rate);
        }
        let n_channels = *channels.get_or_insert(spec.channels.count());

        let too_small = match &sample_buf {
            Some(buf) => buf.capacity() < frames * n_channels,
            None => true,
        };
        if too_small {
            sample_buf = Some(SampleBuffer::<f32>::new(frames as u64, spec));
        }
        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(audio_buf);
            downmix_into(buf.samples(), n_channels, &mut mono);
        }
    }

    let source_rate = source_rate.context("Audio stream has no sample rate")?;
    let samples = resample_linear(&mono, source_rate, target_sample_rate);

    #[allow(clippy::cast_precision_loss)]
    let duration_secs = samples.len() as f64 / f64::from(target_sample_rate);

    Ok(DecodedAudio {
        samples,
        sample_rate: target_sample_rate,
        duration_secs,
    })
}

/// Average interleaved channels into `out`.
#[allow(clippy::cast_precision_loss)]
fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

/// Linear-interpolation resampler.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = (samples.len() as f64 / ratio) as usize;

    (0..output_len)
        .filter_map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            match (samples.get(idx), samples.get(idx + 1)) {
                (Some(&a), Some(&b)) => Some(a.mul_add(1.0 - frac, b * frac)),
                (Some(&a), None) => Some(a),
                _ => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn write_sine_wav(path: &Path, freq: f32, secs: f32, rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let n = (secs * rate as f32) as usize;
        for i in 0..n {
            let v = (2.0 * PI * freq * i as f32 / rate as f32).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample((v * f32::from(i16::MAX)) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_resample_identity() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(resample_linear(&samples, 44100, 44100), samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        let resampled = resample_linear(&samples, 44100, 22050);
        assert_eq!(resampled, vec![1.0, 3.0]);
    }

    #[test]
    fn test_resample_upsample_interpolates() {
        let samples = vec![0.0, 1.0];
        let resampled = resample_linear(&samples, 22050, 44100);
        assert_eq!(resampled.len(), 4);
        assert!((resampled[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_downmix_averages_channels() {
        let mut out = Vec::new();
        downmix_into(&[1.0, 0.0, 0.5, 0.5], 2, &mut out);
        assert_eq!(out, vec![0.5, 0.5]);
    }

    #[test]
    fn test_decode_mono_wav() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        write_sine_wav(&path, 440.0, 1.0, 22050, 1);

        let decoded = decode_audio(&path, 22050).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.samples.len(), 22050);
        assert!((decoded.duration_secs - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stereo_wav_resampled() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stereo.wav");
        write_sine_wav(&path, 220.0, 2.0, 44100, 2);

        let decoded = decode_audio(&path, 22050).unwrap();
        assert!((decoded.duration_secs - 2.0).abs() < 0.01);
        let peak = decoded.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.4 && peak < 0.6, "peak {peak}");
    }

    #[test]
    fn test_decode_missing_file_fails() {
        assert!(decode_audio(Path::new("/nonexistent/file.wav"), 22050).is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();
        assert!(decode_audio(&path, 22050).is_err());
    }
}
