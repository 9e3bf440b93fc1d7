//! WAV file source for offline and loopback runs.

use livecap_bus::{AudioBusSender, CHUNK_SAMPLES};
use std::path::Path;

use crate::stream::resample_linear;
use crate::SAMPLE_RATE;

/// Read a WAV file and return mono f32 samples at the pipeline rate.
pub fn read_wav_mono_f32_16k(path: &Path) -> crate::Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| crate::AudioError::StreamError(format!("failed to open wav: {e}")))?;
    let spec = reader.spec();

    let channels = spec.channels.max(1) as usize;
    let sample_rate = spec.sample_rate;

    let mono: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let raw: Vec<i16> = reader
                .samples::<i16>()
                .collect::<Result<_, _>>()
                .map_err(|e| crate::AudioError::StreamError(format!("bad wav sample: {e}")))?;
            raw.chunks(channels)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|s| *s as i32).sum();
                    (sum as f32 / channels as f32) / i16::MAX as f32
                })
                .collect()
        }
        hound::SampleFormat::Float => {
            let raw: Vec<f32> = reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| crate::AudioError::StreamError(format!("bad wav sample: {e}")))?;
            raw.chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        }
    };

    Ok(resample_linear(&mono, sample_rate, SAMPLE_RATE).into_owned())
}

/// Push an entire WAV file onto the bus in pipeline-sized chunks.
///
/// Timestamps are derived from sample position, so the pipeline sees the
/// same stream it would have seen live, just faster than real time. The
/// returned count is the number of chunks pushed.
pub fn pump_wav_file(path: &Path, sender: &AudioBusSender) -> crate::Result<usize> {
    let samples = read_wav_mono_f32_16k(path)?;
    let mut pushed = 0usize;
    let mut offset = 0usize;

    while offset < samples.len() {
        let end = (offset + CHUNK_SAMPLES).min(samples.len());
        let start_ms = offset as u64 * 1000 / SAMPLE_RATE as u64;
        sender.send(start_ms, SAMPLE_RATE, samples[offset..end].to_vec());
        offset = end;
        pushed += 1;
    }

    tracing::debug!(path = %path.display(), chunks = pushed, "wav file pumped");
    Ok(pushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livecap_bus::{AudioBus, AudioBusConfig};

    fn write_test_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_read_and_pump_wav() {
        let dir = std::env::temp_dir().join(format!("livecap-wav-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");

        // 1 second of a quiet constant at 16kHz mono.
        let samples = vec![1000i16; SAMPLE_RATE as usize];
        write_test_wav(&path, &samples, SAMPLE_RATE, 1);

        let decoded = read_wav_mono_f32_16k(&path).unwrap();
        assert_eq!(decoded.len(), SAMPLE_RATE as usize);
        assert!((decoded[0] - 1000.0 / i16::MAX as f32).abs() < 1e-4);

        let mut bus = AudioBus::with_config(AudioBusConfig {
            capacity_ms: 60_000,
            chunk_size_ms: 50,
        });
        let mut rx = bus.take_receiver().unwrap();
        let pushed = pump_wav_file(&path, &bus.sender()).unwrap();
        assert_eq!(pushed, SAMPLE_RATE as usize / CHUNK_SAMPLES);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.start_ms, 0);
        let second = rx.try_recv().unwrap();
        assert_eq!(second.start_ms, 50);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
