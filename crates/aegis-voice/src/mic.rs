//! Microphone capture using CPAL: one fixed-length mono segment per `record` call.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use aegis_core::ports::{AudioInput, AudioSegment};
use aegis_core::AegisResult;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, StreamConfig};
use tracing::{info, warn};

use crate::error::{VoiceError, VoiceResult};

/// Default input device. The device is re-acquired per recording, so a headset plugged
/// in after startup is picked up.
#[derive(Debug)]
pub struct CpalMicrophone {
    device_name: String,
}

impl CpalMicrophone {
    /// Probe for a default input device. `Err` means voice input must run in mock mode.
    pub fn open() -> VoiceResult<Self> {
        let device = default_input()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let config = device.default_input_config()?;
        info!(
            target: "aegis::voice",
            device = %name,
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            "microphone initialized"
        );
        Ok(Self { device_name: name })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    fn record_segment(&self, duration: Duration) -> VoiceResult<AudioSegment> {
        let device = default_input()?;
        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let samples = Arc::new(Mutex::new(Vec::with_capacity(
            (config.sample_rate.0 as f64 * duration.as_secs_f64()) as usize,
        )));

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, Arc::clone(&samples), |s| s),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, Arc::clone(&samples), |s| {
                f32::from(s) / 32_768.0
            }),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, Arc::clone(&samples), |s| {
                (f32::from(s) - 32_768.0) / 32_768.0
            }),
            other => {
                return Err(VoiceError::AudioDevice(format!(
                    "unsupported input sample format {other:?}"
                )))
            }
        }?;
        stream.play()?;
        std::thread::sleep(duration);
        drop(stream);

        let samples = std::mem::take(&mut *samples.lock().unwrap_or_else(PoisonError::into_inner));
        Ok(AudioSegment {
            samples,
            sample_rate: config.sample_rate.0,
        })
    }
}

impl AudioInput for CpalMicrophone {
    fn record(&self, duration: Duration) -> AegisResult<AudioSegment> {
        Ok(self.record_segment(duration)?)
    }
}

fn default_input() -> VoiceResult<Device> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| VoiceError::AudioDevice("No input device available".to_string()))
}

/// Input stream that down-mixes every frame to mono and appends it to `sink`.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: Arc<Mutex<Vec<f32>>>,
    to_f32: fn(T) -> f32,
) -> VoiceResult<cpal::Stream>
where
    T: SizedSample + 'static,
{
    let channels = usize::from(config.channels.max(1));
    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let mut buf = sink.lock().unwrap_or_else(PoisonError::into_inner);
            buf.extend(data.chunks(channels).map(|frame| {
                frame.iter().map(|&s| to_f32(s)).sum::<f32>() / frame.len() as f32
            }));
        },
        move |err| {
            warn!(target: "aegis::voice", "Audio stream error: {}", err);
        },
        None,
    )?;
    Ok(stream)
}
