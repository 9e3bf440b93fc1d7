//! Microphone capture via cpal.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream};
use crossbeam_channel::{Receiver, Sender};
use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::SAMPLE_RATE;

/// Live microphone input, delivering mono 16kHz f32 frames over a
/// crossbeam channel. The cpal callback does the mono mix and resample so
/// consumers only ever see the pipeline format.
pub struct MicSource {
    _stream: Stream,
    receiver: Option<Receiver<Vec<f32>>>,
    failed: Arc<AtomicBool>,
}

impl MicSource {
    /// Open the named input device, or the host default when `device_id`
    /// is None.
    pub fn open(device_id: Option<&str>) -> crate::Result<Self> {
        let host = cpal::default_host();
        let device = get_device(&host, device_id)?;
        let name = device.name().unwrap_or_else(|_| "<unknown>".into());
        tracing::info!(device = %name, "opening microphone input");

        let (tx, rx) = crossbeam_channel::unbounded::<Vec<f32>>();
        let failed = Arc::new(AtomicBool::new(false));
        let stream = build_stream(device, tx, failed.clone())?;

        Ok(Self {
            _stream: stream,
            receiver: Some(rx),
            failed,
        })
    }

    /// Take the frame receiver out of this source (can only be called once).
    ///
    /// The receiver supports blocking `recv()`/`recv_timeout()` for
    /// efficient single-consumer use without polling.
    pub fn take_receiver(&mut self) -> Option<Receiver<Vec<f32>>> {
        self.receiver.take()
    }

    /// True once the device reported a stream error; the frame channel
    /// will produce no further data and the stream should be treated as
    /// terminated by `DeviceDisconnected`.
    pub fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

fn get_device(host: &cpal::Host, device_id: Option<&str>) -> crate::Result<Device> {
    match device_id {
        Some(id) => host
            .input_devices()?
            .find(|d| d.name().ok().as_deref() == Some(id))
            .ok_or_else(|| crate::AudioError::DeviceNotFound(id.to_string())),
        None => host
            .default_input_device()
            .ok_or_else(|| crate::AudioError::DeviceNotFound("default".to_string())),
    }
}

fn build_stream(
    device: Device,
    tx: Sender<Vec<f32>>,
    failed: Arc<AtomicBool>,
) -> crate::Result<Stream> {
    let config = device.default_input_config().map_err(|e| {
        crate::AudioError::StreamError(format!("failed to get default config: {e}"))
    })?;

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    let on_error = {
        let failed = failed.clone();
        move |err| {
            tracing::error!("audio stream error: {}", err);
            failed.store(true, Ordering::Relaxed);
        }
    };

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_input_stream(
            &config.into(),
            move |data: &[f32], _| {
                let samples = process_audio(data, channels, sample_rate);
                let _ = tx.send(samples.into_owned());
            },
            on_error,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config.into(),
            move |data: &[i16], _| {
                let float: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                let samples = process_audio(&float, channels, sample_rate);
                let _ = tx.send(samples.into_owned());
            },
            on_error,
            None,
        )?,
        format => {
            return Err(crate::AudioError::StreamError(format!(
                "unsupported sample format: {format:?}"
            )));
        }
    };

    stream
        .play()
        .map_err(|e| crate::AudioError::StreamError(format!("failed to start stream: {e}")))?;

    Ok(stream)
}

/// Mix interleaved frames down to mono and resample to the pipeline rate.
pub(crate) fn process_audio<'a>(
    data: &'a [f32],
    channels: usize,
    sample_rate: u32,
) -> Cow<'a, [f32]> {
    if channels <= 1 {
        return resample_linear(data, sample_rate, SAMPLE_RATE);
    }

    let mut mono = Vec::with_capacity(data.len() / channels);
    for frame in data.chunks(channels) {
        let sum: f32 = frame.iter().sum();
        mono.push(sum / channels as f32);
    }
    Cow::Owned(resample_linear(&mono, sample_rate, SAMPLE_RATE).into_owned())
}

/// Resample audio using linear interpolation.
pub(crate) fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Cow<'_, [f32]> {
    if from_rate == to_rate {
        return Cow::Borrowed(samples);
    }
    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio) as usize;
    let mut output = Vec::with_capacity(new_len);
    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = src_idx.fract() as f32;
        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };
        output.push(sample);
    }
    Cow::Owned(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        let out = resample_linear(&samples, 16000, 16000);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.as_ref(), samples.as_slice());
    }

    #[test]
    fn test_resample_halves_length() {
        let samples = vec![0.0f32; 3200];
        let out = resample_linear(&samples, 32000, 16000);
        assert_eq!(out.len(), 1600);
    }

    #[test]
    fn test_stereo_mixdown() {
        // L = 0.4, R = 0.0 should mix to 0.2.
        let data = vec![0.4f32, 0.0, 0.4, 0.0];
        let mono = process_audio(&data, 2, SAMPLE_RATE);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.2).abs() < 1e-6);
    }
}
