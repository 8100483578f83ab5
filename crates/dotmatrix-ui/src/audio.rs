use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Interleaved stereo samples queued by the emulation loop and drained by
/// the device callback.
pub type SampleQueue = Arc<Mutex<VecDeque<i16>>>;

/// Open the default output device and stream samples from `queue`.
///
/// Returns the active stream and the device sample rate so the emulation
/// core can be told to resample at that rate.
pub fn start_stream(queue: SampleQueue) -> Option<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host.default_output_device()?;
    let supported = match device.default_output_config() {
        Ok(c) => c,
        Err(e) => {
            log::warn!("no supported audio output config: {e}");
            return None;
        }
    };
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let rate = config.sample_rate.0;
    let channels = config.channels as usize;
    let err_fn = |err| log::error!("audio stream error: {err}");

    let stream = match sample_format {
        cpal::SampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _| {
                    let mut q = queue.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let left = q.pop_front().unwrap_or(0);
                        let right = q.pop_front().unwrap_or(0);
                        frame[0] = left;
                        if channels > 1 {
                            frame[1] = right;
                        }
                    }
                },
                err_fn,
                None,
            )
            .ok()?,
        cpal::SampleFormat::U16 => device
            .build_output_stream(
                &config,
                move |data: &mut [u16], _| {
                    let mut q = queue.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let left = q.pop_front().unwrap_or(0);
                        let right = q.pop_front().unwrap_or(0);
                        frame[0] = (left as i32 + 32768) as u16;
                        if channels > 1 {
                            frame[1] = (right as i32 + 32768) as u16;
                        }
                    }
                },
                err_fn,
                None,
            )
            .ok()?,
        cpal::SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _| {
                    let mut q = queue.lock().unwrap();
                    for frame in data.chunks_mut(channels) {
                        let left = q.pop_front().unwrap_or(0) as f32 / 32768.0;
                        let right = q.pop_front().unwrap_or(0) as f32 / 32768.0;
                        frame[0] = left;
                        if channels > 1 {
                            frame[1] = right;
                        }
                    }
                },
                err_fn,
                None,
            )
            .ok()?,
        other => {
            log::warn!("unsupported audio sample format {other:?}");
            return None;
        }
    };

    stream.play().ok()?;
    Some((stream, rate))
}
