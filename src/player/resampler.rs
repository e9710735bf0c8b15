//! Audio resampler using rubato for high-quality sample rate conversion.
//!
//! This module handles converting audio from the source sample rate (e.g., 44.1kHz)
//! to the output device sample rate (e.g., 48kHz) to prevent pitch/speed issues.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

/// Frames per resampling block. Larger = more efficient but more latency.
const CHUNK_SIZE: usize = 1024;

/// Audio resampler wrapper.
pub struct Resampler {
    resampler: Option<FftFixedIn<f32>>,
    input_rate: u32,
    output_rate: u32,
    channels: usize,
    /// Per-channel input accumulated until a full block is available
    input_buffer: Vec<Vec<f32>>,
}

impl Resampler {
    /// Create a new resampler.
    ///
    /// If the rates match, or rubato cannot be set up for them, samples pass
    /// through unchanged.
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Self {
        let channels = usize::from(channels.max(1));

        let resampler = if input_rate == output_rate {
            None
        } else {
            match FftFixedIn::<f32>::new(
                input_rate as usize,
                output_rate as usize,
                CHUNK_SIZE,
                2, // Sub-chunks
                channels,
            ) {
                Ok(resampler) => {
                    tracing::info!(
                        "Resampler: {}Hz → {}Hz ({} channels)",
                        input_rate,
                        output_rate,
                        channels
                    );
                    Some(resampler)
                }
                Err(e) => {
                    tracing::warn!(
                        input_rate,
                        output_rate,
                        error = %e,
                        "resampler unavailable, playing at source rate"
                    );
                    None
                }
            }
        };

        Self {
            resampler,
            input_rate,
            output_rate,
            channels,
            input_buffer: vec![Vec::new(); channels],
        }
    }

    pub fn needs_resampling(&self) -> bool {
        self.resampler.is_some()
    }

    /// Output rate over input rate.
    pub fn ratio(&self) -> f64 {
        f64::from(self.output_rate) / f64::from(self.input_rate)
    }

    /// Process interleaved samples, returning resampled interleaved output.
    ///
    /// Output lags input by up to one block.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return input.to_vec();
        };

        for (i, sample) in input.iter().enumerate() {
            self.input_buffer[i % self.channels].push(*sample);
        }

        let mut output = Vec::new();
        while self.input_buffer[0].len() >= CHUNK_SIZE {
            let block: Vec<Vec<f32>> = self
                .input_buffer
                .iter_mut()
                .map(|ch| ch.drain(..CHUNK_SIZE).collect())
                .collect();

            match resampler.process(&block, None) {
                Ok(resampled) => interleave_into(&resampled, usize::MAX, &mut output),
                Err(e) => tracing::warn!("Resampling error: {}", e),
            }
        }

        output
    }

    /// Flush the partial block left at end of stream.
    pub fn flush(&mut self) -> Vec<f32> {
        let Some(ref mut resampler) = self.resampler else {
            return Vec::new();
        };

        let remaining = self.input_buffer[0].len();
        if remaining == 0 {
            return Vec::new();
        }

        for ch in &mut self.input_buffer {
            ch.resize(CHUNK_SIZE, 0.0);
        }
        let block = std::mem::replace(&mut self.input_buffer, vec![Vec::new(); self.channels]);

        let mut output = Vec::new();
        match resampler.process(&block, None) {
            Ok(resampled) => {
                // Only take the non-padded portion
                let expected = (remaining as f64 * f64::from(self.output_rate)
                    / f64::from(self.input_rate))
                .ceil() as usize;
                interleave_into(&resampled, expected, &mut output);
            }
            Err(e) => tracing::warn!("Resampling flush error: {}", e),
        }
        output
    }

    /// Reset the resampler state (call after seek).
    pub fn reset(&mut self) {
        for ch in &mut self.input_buffer {
            ch.clear();
        }
        if let Some(ref mut resampler) = self.resampler {
            resampler.reset();
        }
    }
}

fn interleave_into(planes: &[Vec<f32>], max_frames: usize, out: &mut Vec<f32>) {
    let Some(first) = planes.first() else {
        return;
    };
    for frame in 0..first.len().min(max_frames) {
        out.extend(planes.iter().map(|plane| plane[frame]));
    }
}

/// Convert interleaved samples between channel counts.
///
/// Downmixing to mono averages the channels; otherwise output channel `c`
/// takes input channel `c % from`.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    let (from, to) = (from.max(1), to.max(1));
    if from == to {
        return samples.to_vec();
    }
    let mut out = Vec::with_capacity(samples.len() / from * to);
    for frame in samples.chunks_exact(from) {
        if to == 1 {
            out.push(frame.iter().sum::<f32>() / from as f32);
        } else {
            out.extend((0..to).map(|c| frame[c % from]));
        }
    }
    out
}
