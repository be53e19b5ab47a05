//! Container decoding into interleaved `f32` PCM.
//!
//! Two paths mirror the normalizer contract: the canonical raw PCM
//! container is read directly with `hound`, everything else goes through
//! the `symphonia` probe. Both are bounded to the analysis clip length so
//! an oversized upload cannot balloon memory.

use std::fs::File;
use std::path::Path;

use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
    io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};

use crate::audio::MAX_CLIP_SECONDS;
use crate::error::ClassifyError;

/// Raw decoded audio in interleaved `f32` samples.
#[derive(Debug)]
pub(crate) struct DecodedAudio {
    pub(crate) samples: Vec<f32>,
    pub(crate) sample_rate: u32,
    pub(crate) channels: u16,
}

/// Decode the canonical raw PCM container directly, without a demuxer probe.
///
/// Any parse failure is `CorruptAudio`: the caller declared the canonical
/// container, so bytes that do not honor it are invalid data rather than an
/// unsupported format.
pub(crate) fn decode_canonical_container(path: &Path) -> Result<DecodedAudio, ClassifyError> {
    let mut reader = hound::WavReader::open(path).map_err(|err| ClassifyError::CorruptAudio {
        reason: format!("invalid PCM container: {err}"),
    })?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate.max(1);
    let channels = spec.channels.max(1);
    let limit = source_sample_limit(sample_rate, channels);

    let mut samples = Vec::new();
    match spec.sample_format {
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>().take(limit) {
                samples.push(sample.map_err(truncated_samples)?);
            }
        }
        hound::SampleFormat::Int => {
            let scale = 1.0_f32 / (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            for sample in reader.samples::<i32>().take(limit) {
                samples.push(sample.map_err(truncated_samples)? as f32 * scale);
            }
        }
    }

    if samples.is_empty() {
        return Err(ClassifyError::CorruptAudio {
            reason: "container holds no samples".into(),
        });
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Demux and decode a compressed container through the probe, guided by the
/// declared extension.
pub(crate) fn decode_compressed_container(
    path: &Path,
    extension: &str,
) -> Result<DecodedAudio, ClassifyError> {
    let file = File::open(path).map_err(|err| ClassifyError::UnsupportedFormat {
        reason: format!("failed to open spooled upload: {err}"),
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());
    let mut hint = Hint::new();
    if !extension.is_empty() {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| ClassifyError::UnsupportedFormat {
            reason: format!("container probe failed: {err}"),
        })?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| ClassifyError::UnsupportedFormat {
            reason: "container holds no audio track".into(),
        })?;
    let codec_params = &track.codec_params;
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| ClassifyError::UnsupportedFormat {
            reason: "audio track declares no sample rate".into(),
        })?;
    let channels = codec_params
        .channels
        .ok_or_else(|| ClassifyError::UnsupportedFormat {
            reason: "audio track declares no channel layout".into(),
        })?
        .count() as u16;
    let limit = source_sample_limit(sample_rate, channels);

    let mut decoder = symphonia::default::get_codecs()
        .make(codec_params, &DecoderOptions::default())
        .map_err(|err| ClassifyError::UnsupportedFormat {
            reason: format!("no decoder for audio track: {err}"),
        })?;

    let mut samples = Vec::new();
    loop {
        if samples.len() >= limit {
            samples.truncate(limit);
            break;
        }
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // The demuxer reports end-of-stream as an IO error.
            Err(Error::IoError(_)) => break,
            Err(err) => {
                return Err(ClassifyError::CorruptAudio {
                    reason: format!("demux failed mid-stream: {err}"),
                });
            }
        };
        let audio_buf = match decoder.decode(&packet) {
            Ok(audio_buf) => audio_buf,
            // Skip undecodable packets; an all-bad stream fails below.
            Err(Error::DecodeError(_)) => continue,
            Err(err) => {
                return Err(ClassifyError::CorruptAudio {
                    reason: format!("decode failed mid-stream: {err}"),
                });
            }
        };
        let spec = *audio_buf.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(audio_buf.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(audio_buf);
        samples.extend_from_slice(sample_buf.samples());
    }

    if samples.is_empty() {
        return Err(ClassifyError::CorruptAudio {
            reason: "no decodable samples in container".into(),
        });
    }
    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

fn truncated_samples(err: hound::Error) -> ClassifyError {
    ClassifyError::CorruptAudio {
        reason: format!("truncated or invalid sample data: {err}"),
    }
}

fn source_sample_limit(sample_rate: u32, channels: u16) -> usize {
    let frames = (MAX_CLIP_SECONDS * sample_rate as f32).ceil().max(1.0) as usize;
    frames.saturating_mul(channels.max(1) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(path: &Path, spec: WavSpec, frames: usize, value: f32) {
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * spec.channels as usize {
            match spec.sample_format {
                SampleFormat::Float => writer.write_sample(value).unwrap(),
                SampleFormat::Int => writer
                    .write_sample((value * i16::MAX as f32) as i16)
                    .unwrap(),
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn canonical_decode_reads_int_samples_scaled() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("int.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        write_wav(&path, spec, 100, 0.5);

        let decoded = decode_canonical_container(&path).unwrap();
        assert_eq!(decoded.sample_rate, 22_050);
        assert_eq!(decoded.channels, 1);
        assert!(decoded.samples.iter().all(|s| (s - 0.5).abs() < 1e-2));
    }

    #[test]
    fn canonical_decode_bounds_oversized_clips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("long.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        write_wav(&path, spec, 8_000 * 9, 0.1);

        let decoded = decode_canonical_container(&path).unwrap();
        assert_eq!(decoded.samples.len(), (8_000.0 * MAX_CLIP_SECONDS) as usize);
    }

    #[test]
    fn canonical_decode_flags_garbage_as_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"RIFFgarbage").unwrap();
        let err = decode_canonical_container(&path).unwrap_err();
        assert!(matches!(err, ClassifyError::CorruptAudio { .. }));
    }

    #[test]
    fn compressed_decode_flags_unknown_bytes_as_unsupported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.ogg");
        std::fs::write(&path, b"not an ogg stream at all").unwrap();
        let err = decode_compressed_container(&path, "ogg").unwrap_err();
        assert!(matches!(err, ClassifyError::UnsupportedFormat { .. }));
    }
}
