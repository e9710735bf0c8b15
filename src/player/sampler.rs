//! Periodic frequency snapshots of the playing signal.
//!
//! A [`FrequencySampler`] owns the one analyser attached to a [`SignalTap`].
//! It can be read as a lazy stream of snapshots, or drive a render callback
//! on a background task at the configured cadence until [`stop`] is called.
//!
//! [`stop`]: FrequencySampler::stop

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use super::visualization::{SignalTap, SpectrumAnalyser};
use crate::config::VisualizerConfig;

/// Byte magnitudes of one analysis frame, lowest frequency first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencySnapshot {
    pub magnitudes: Vec<u8>,
}

impl FrequencySnapshot {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("An analyser is already attached to this signal source")]
    AlreadyAttached,
}

pub struct FrequencySampler {
    tap: SignalTap,
    analyser: Arc<Mutex<SpectrumAnalyser>>,
    cadence: Duration,
    render_loop: Option<RenderLoop>,
}

struct RenderLoop {
    /// `true` while renders are allowed. Closed under the lock by `stop`.
    gate: Arc<Mutex<bool>>,
    task: JoinHandle<()>,
}

impl FrequencySampler {
    /// Attach the analyser for `tap`. Fails if one was ever attached to the
    /// same source before.
    pub fn attach(tap: &SignalTap, settings: &VisualizerConfig) -> Result<Self, SamplerError> {
        if !tap.claim_analyser() {
            return Err(SamplerError::AlreadyAttached);
        }
        let analyser = SpectrumAnalyser::new(settings);
        debug!(bins = analyser.bin_count(), "analyser attached");

        Ok(Self {
            tap: tap.clone(),
            analyser: Arc::new(Mutex::new(analyser)),
            cadence: settings.cadence(),
            render_loop: None,
        })
    }

    pub fn bin_count(&self) -> usize {
        self.analyser.lock().bin_count()
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Analyse the current contents of the tap.
    pub fn capture(&self) -> FrequencySnapshot {
        capture(&self.tap, &self.analyser)
    }

    /// Infinite stream of snapshots, one per cadence tick. Nothing is
    /// computed until the stream is polled.
    pub fn snapshots(&self) -> impl Stream<Item = FrequencySnapshot> + Send + 'static {
        let tap = self.tap.clone();
        let analyser = Arc::clone(&self.analyser);
        let cadence = self.cadence;

        futures::stream::unfold(None::<Interval>, move |ticker| {
            let tap = tap.clone();
            let analyser = Arc::clone(&analyser);
            async move {
                let mut ticker = ticker.unwrap_or_else(|| ticker_for(cadence));
                ticker.tick().await;
                Some((capture(&tap, &analyser), Some(ticker)))
            }
        })
    }

    /// Call `render` with a fresh snapshot on every tick until [`stop`].
    /// A loop that is already running is stopped first.
    ///
    /// Must be called within a tokio runtime.
    ///
    /// [`stop`]: FrequencySampler::stop
    pub fn start<F>(&mut self, mut render: F)
    where
        F: FnMut(FrequencySnapshot) + Send + 'static,
    {
        self.stop();

        let gate = Arc::new(Mutex::new(true));
        let tap = self.tap.clone();
        let analyser = Arc::clone(&self.analyser);
        let cadence = self.cadence;
        let open = Arc::clone(&gate);

        let task = tokio::spawn(async move {
            let mut ticker = ticker_for(cadence);
            loop {
                ticker.tick().await;
                let snapshot = capture(&tap, &analyser);
                let open = open.lock();
                if !*open {
                    break;
                }
                render(snapshot);
            }
        });

        self.render_loop = Some(RenderLoop { gate, task });
        debug!(cadence_ms = cadence.as_millis() as u64, "render loop started");
    }

    /// Stop the render loop. No render callback runs after this returns.
    pub fn stop(&mut self) {
        if let Some(render_loop) = self.render_loop.take() {
            // Waits for a render in progress, then bars every later one.
            *render_loop.gate.lock() = false;
            render_loop.task.abort();
            debug!("render loop stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_some()
    }
}

impl Drop for FrequencySampler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn ticker_for(cadence: Duration) -> Interval {
    let mut ticker = tokio::time::interval(cadence);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn capture(tap: &SignalTap, analyser: &Mutex<SpectrumAnalyser>) -> FrequencySnapshot {
    let mut analyser = analyser.lock();
    let mut frame = vec![0.0; analyser.fft_size()];
    tap.latest(&mut frame);
    let mut magnitudes = vec![0u8; analyser.bin_count()];
    analyser.byte_frequency_data(&frame, &mut magnitudes);
    FrequencySnapshot { magnitudes }
}
