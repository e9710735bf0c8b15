//! Frequency analysis of the playing signal.
//!
//! The transport writes mono PCM into a [`SignalTap`]; a [`SpectrumAnalyser`]
//! turns the most recent `fft_size` samples into `fft_size / 2` byte
//! magnitudes. The mapping follows a browser analyser node: Blackman window,
//! magnitude normalised by the FFT size, exponential time smoothing, then
//! decibels linearly mapped from `min_db..max_db` onto `0..=255`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use crate::config::VisualizerConfig;

const MIN_FFT_SIZE: usize = 32;
const MAX_FFT_SIZE: usize = 32_768;

/// Ring of the most recent mono samples of one signal source.
///
/// Cloning shares the ring. The tap also carries the "analyser attached"
/// flag for its source, see [`SignalTap::claim_analyser`].
#[derive(Debug, Clone)]
pub struct SignalTap {
    inner: Arc<TapInner>,
}

#[derive(Debug)]
struct TapInner {
    ring: Mutex<VecDeque<f32>>,
    capacity: usize,
    analyser_attached: AtomicBool,
}

impl SignalTap {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(TapInner {
                ring: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                analyser_attached: AtomicBool::new(false),
            }),
        }
    }

    /// Append mono samples, discarding the oldest beyond capacity.
    pub fn push(&self, samples: &[f32]) {
        let cap = self.inner.capacity;
        let samples = &samples[samples.len().saturating_sub(cap)..];
        let mut ring = self.inner.ring.lock();
        let overflow = (ring.len() + samples.len()).saturating_sub(cap);
        ring.drain(..overflow);
        ring.extend(samples.iter().copied());
    }

    /// Downmix interleaved frames to mono and append them.
    pub fn push_interleaved(&self, samples: &[f32], channels: usize) {
        let channels = channels.max(1);
        let mono: Vec<f32> = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();
        self.push(&mono);
    }

    /// Fill `out` with the most recent samples, oldest first. Missing history
    /// is zero-filled at the front.
    pub fn latest(&self, out: &mut [f32]) {
        let ring = self.inner.ring.lock();
        let available = ring.len().min(out.len());
        let pad = out.len() - available;
        out[..pad].fill(0.0);
        for (dst, src) in out[pad..].iter_mut().zip(ring.range(ring.len() - available..)) {
            *dst = *src;
        }
    }

    pub fn clear(&self) {
        self.inner.ring.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.ring.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark this source as analysed. Returns `false` if it already was.
    pub(crate) fn claim_analyser(&self) -> bool {
        !self.inner.analyser_attached.swap(true, Ordering::AcqRel)
    }
}

/// FFT-based byte spectrum.
pub struct SpectrumAnalyser {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    /// Blackman window
    window: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Previous smoothed magnitudes
    smoothed: Vec<f32>,
    /// Smoothing factor (0.0 = instant, 1.0 = frozen)
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl SpectrumAnalyser {
    /// `fft_size` is rounded up to a power of two in `32..=32768`.
    pub fn new(settings: &VisualizerConfig) -> Self {
        let fft_size = settings
            .fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window = (0..fft_size)
            .map(|i| {
                let x = std::f32::consts::TAU * i as f32 / fft_size as f32;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        let (min_db, max_db) = if settings.min_db < settings.max_db {
            (settings.min_db, settings.max_db)
        } else {
            tracing::warn!(
                min_db = settings.min_db,
                max_db = settings.max_db,
                "invalid dB range, using -100..-30"
            );
            (-100.0, -30.0)
        };

        Self {
            input: fft.make_input_vec(),
            output: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            fft_size,
            window,
            smoothed: vec![0.0; fft_size / 2],
            smoothing: settings.smoothing.clamp(0.0, 0.99),
            min_db,
            max_db,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Analyse one frame of `fft_size` samples into `bin_count` bytes.
    ///
    /// Shorter frames are zero-padded at the front, longer ones use their
    /// tail. `out` is filled up to `min(out.len(), bin_count)`.
    pub fn byte_frequency_data(&mut self, frame: &[f32], out: &mut [u8]) {
        let n = self.fft_size;
        let frame = &frame[frame.len().saturating_sub(n)..];
        let pad = n - frame.len();
        self.input[..pad].fill(0.0);
        for ((dst, src), w) in self.input[pad..]
            .iter_mut()
            .zip(frame)
            .zip(&self.window[pad..])
        {
            *dst = src * w;
        }

        if let Err(e) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
        {
            tracing::warn!("FFT failed: {}", e);
            out.fill(0);
            return;
        }

        let range = self.max_db - self.min_db;
        for (k, byte) in out.iter_mut().take(self.bin_count()).enumerate() {
            let magnitude = self.output[k].norm() / n as f32;
            let smoothed = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = smoothed;

            let db = 20.0 * smoothed.log10();
            let scaled = 255.0 / range * (db - self.min_db);
            *byte = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }
    }

    /// Forget smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(fft_size: usize, smoothing: f32) -> VisualizerConfig {
        VisualizerConfig {
            fft_size,
            smoothing,
            ..VisualizerConfig::default()
        }
    }

    fn sine(bin: usize, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (std::f32::consts::TAU * bin as f32 * i as f32 / n as f32).sin())
            .collect()
    }

    #[test]
    fn test_default_resolution_is_128_bins() {
        let analyser = SpectrumAnalyser::new(&VisualizerConfig::default());
        assert_eq!(analyser.fft_size(), 256);
        assert_eq!(analyser.bin_count(), 128);
    }

    #[test]
    fn test_fft_size_is_sanitised() {
        assert_eq!(SpectrumAnalyser::new(&settings(300, 0.8)).fft_size(), 512);
        assert_eq!(SpectrumAnalyser::new(&settings(1, 0.8)).fft_size(), 32);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let mut analyser = SpectrumAnalyser::new(&settings(256, 0.0));
        let mut out = vec![7u8; 128];
        analyser.byte_frequency_data(&[0.0; 256], &mut out);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_sine_peaks_at_its_bin() {
        let mut analyser = SpectrumAnalyser::new(&settings(256, 0.0));
        let mut out = vec![0u8; 128];
        analyser.byte_frequency_data(&sine(8, 256), &mut out);

        assert_eq!(out[8], 255);
        assert!(out[60] < 16, "far bin leaked: {}", out[60]);
        let peak = out.iter().enumerate().max_by_key(|(_, b)| **b).map(|(i, _)| i);
        assert!(matches!(peak, Some(6..=10)));
    }

    #[test]
    fn test_smoothing_ramps_up() {
        let mut analyser = SpectrumAnalyser::new(&settings(256, 0.8));
        let frame = sine(20, 256);
        let mut first = vec![0u8; 128];
        let mut later = vec![0u8; 128];

        analyser.byte_frequency_data(&frame, &mut first);
        for _ in 0..20 {
            analyser.byte_frequency_data(&frame, &mut later);
        }
        assert!(later[20] >= first[20]);

        analyser.reset();
        let mut again = vec![0u8; 128];
        analyser.byte_frequency_data(&frame, &mut again);
        assert_eq!(again, first);
    }

    #[test]
    fn test_tap_keeps_most_recent() {
        let tap = SignalTap::new(4);
        tap.push(&[1.0, 2.0, 3.0]);
        tap.push(&[4.0, 5.0]);
        assert_eq!(tap.len(), 4);

        let mut out = [0.0; 6];
        tap.latest(&mut out);
        assert_eq!(out, [0.0, 0.0, 2.0, 3.0, 4.0, 5.0]);

        let mut short = [0.0; 2];
        tap.latest(&mut short);
        assert_eq!(short, [4.0, 5.0]);
    }

    #[test]
    fn test_tap_push_longer_than_capacity() {
        let tap = SignalTap::new(3);
        tap.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut out = [0.0; 3];
        tap.latest(&mut out);
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_tap_downmix() {
        let tap = SignalTap::new(8);
        tap.push_interleaved(&[1.0, 0.0, 0.5, 0.5], 2);
        let mut out = [0.0; 2];
        tap.latest(&mut out);
        assert_eq!(out, [0.5, 0.5]);

        tap.clear();
        assert!(tap.is_empty());
    }

    #[test]
    fn test_claim_analyser_once() {
        let tap = SignalTap::new(8);
        let shared = tap.clone();
        assert!(tap.claim_analyser());
        assert!(!shared.claim_analyser());
    }
}
