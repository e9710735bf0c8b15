//! Audio output using cpal, driven as a [`MediaTransport`].
//!
//! Two threads are involved besides the caller:
//! - the **decoder thread** owns the bound source, decodes and resamples it,
//!   feeds the [`SignalTap`] and reports [`TransportEvent`]s
//! - the **cpal callback** pulls decoded chunks and writes them to the device
//!
//! Every bind bumps a generation counter. Chunks and events carry the
//! generation they were produced for; the callback drops stale chunks and
//! the decoder thread only emits while its generation is current.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use super::decoder::AudioDecoder;
use super::resampler::{Resampler, remap_channels};
use super::transport::{MediaTransport, TransportError, TransportEvent, TransportListener};
use super::visualization::SignalTap;
use crate::loader::TransientResource;
use crate::model::Payload;

/// How often the position is reported while playing.
const TIME_UPDATE_INTERVAL: Duration = Duration::from_millis(250);
/// Samples of history kept for frequency analysis.
const TAP_CAPACITY: usize = 32_768;
/// Decoded chunks buffered ahead of the device.
const CHUNK_QUEUE: usize = 8;
/// Upper bound on waiting for the device to play out the queue at end of stream.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputStatus {
    Idle,
    Paused,
    Playing,
}

/// State shared by the caller, the decoder thread and the cpal callback.
#[derive(Debug)]
struct OutputState {
    status: OutputStatus,
    generation: u64,
    position: Duration,
    duration: Option<Duration>,
}

enum OutputCommand {
    Load {
        source: Payload,
        listener: TransportListener,
        generation: u64,
    },
    Play,
    Pause,
    Seek(Duration),
    Unbind,
    Shutdown,
}

/// A chunk of interleaved device-rate samples.
struct AudioChunk {
    samples: Vec<f32>,
    timestamp: Duration,
    generation: u64,
}

/// Audio output manager.
pub struct AudioOutput {
    state: Arc<RwLock<OutputState>>,
    commands: Sender<OutputCommand>,
    tap: SignalTap,
    bound: bool,
    _stream: Stream,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the default output device and start the decoder thread.
    pub fn new() -> Result<Self, TransportError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TransportError::AudioInit("No output device found".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_output_config()
            .map_err(|e| TransportError::AudioInit(e.to_string()))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();
        info!("Audio format: {}Hz, {} channels", sample_rate, channels);

        let config = StreamConfig {
            channels,
            sample_rate: supported_config.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let state = Arc::new(RwLock::new(OutputState {
            status: OutputStatus::Idle,
            generation: 0,
            position: Duration::ZERO,
            duration: None,
        }));
        let tap = SignalTap::new(TAP_CAPACITY);
        let (command_tx, command_rx) = bounded::<OutputCommand>(32);
        let (audio_tx, audio_rx) = bounded::<AudioChunk>(CHUNK_QUEUE);

        let stream = match supported_config.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, audio_rx, Arc::clone(&state)),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, audio_rx, Arc::clone(&state)),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, audio_rx, Arc::clone(&state)),
            format => {
                return Err(TransportError::AudioInit(format!(
                    "Unsupported sample format: {:?}",
                    format
                )));
            }
        }
        .map_err(|e| TransportError::AudioInit(e.to_string()))?;

        stream
            .play()
            .map_err(|e| TransportError::AudioInit(e.to_string()))?;

        let mut decoder_thread = DecoderThread {
            state: Arc::clone(&state),
            tap: tap.clone(),
            audio_tx,
            output_rate: sample_rate,
            output_channels: usize::from(channels),
            current: None,
        };
        let thread = thread::Builder::new()
            .name("audio-decoder".to_string())
            .spawn(move || decoder_thread.run(command_rx))
            .map_err(|e| TransportError::AudioInit(e.to_string()))?;

        Ok(Self {
            state,
            commands: command_tx,
            tap,
            bound: false,
            _stream: stream,
            thread: Some(thread),
        })
    }

    fn send(&self, command: OutputCommand) -> Result<(), TransportError> {
        self.commands
            .send(command)
            .map_err(|_| TransportError::ChannelClosed)
    }

    fn require_bound(&self) -> Result<(), TransportError> {
        if self.bound {
            Ok(())
        } else {
            Err(TransportError::NotBound)
        }
    }
}

impl MediaTransport for AudioOutput {
    fn bind(
        &mut self,
        source: &TransientResource,
        listener: TransportListener,
    ) -> Result<(), TransportError> {
        let generation = {
            let mut state = self.state.write();
            state.generation += 1;
            state.status = OutputStatus::Paused;
            state.position = Duration::ZERO;
            state.duration = None;
            state.generation
        };
        self.tap.clear();
        self.bound = true;
        debug!(resource = %source.id(), generation, "binding source");
        self.send(OutputCommand::Load {
            source: source.payload().clone(),
            listener,
            generation,
        })
    }

    fn unbind(&mut self) {
        {
            let mut state = self.state.write();
            state.generation += 1;
            state.status = OutputStatus::Idle;
            state.duration = None;
        }
        self.bound = false;
        if self.send(OutputCommand::Unbind).is_err() {
            warn!("audio thread gone while unbinding");
        }
    }

    fn play(&mut self) -> Result<(), TransportError> {
        self.require_bound()?;
        self.send(OutputCommand::Play)
    }

    fn pause(&mut self) -> Result<(), TransportError> {
        self.require_bound()?;
        self.send(OutputCommand::Pause)
    }

    fn is_paused(&self) -> bool {
        self.state.read().status != OutputStatus::Playing
    }

    fn seek(&mut self, position: Duration) -> Result<(), TransportError> {
        self.require_bound()?;
        self.send(OutputCommand::Seek(position))
    }

    fn current_time(&self) -> Duration {
        self.state.read().position
    }

    fn duration(&self) -> Option<Duration> {
        self.state.read().duration
    }

    fn signal(&self) -> SignalTap {
        self.tap.clone()
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.commands.send(OutputCommand::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("audio decoder thread panicked");
        }
    }
}

/// Build the output stream for any sample type cpal can convert f32 into.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    audio_rx: Receiver<AudioChunk>,
    state: Arc<RwLock<OutputState>>,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    // Partially consumed chunk carried between callbacks
    let mut pending: Option<(AudioChunk, usize)> = None;
    let silence = T::from_sample(0.0f32);

    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let (status, generation) = {
                let s = state.read();
                (s.status, s.generation)
            };

            if status != OutputStatus::Playing {
                data.fill(silence);
                return;
            }

            let mut output_pos = 0;
            while output_pos < data.len() {
                if pending.as_ref().is_none_or(|(c, _)| c.generation != generation) {
                    pending = None;
                    match audio_rx.try_recv() {
                        Ok(chunk) if chunk.generation == generation => {
                            state.write().position = chunk.timestamp;
                            pending = Some((chunk, 0));
                        }
                        // Stale chunk from a previous binding
                        Ok(_) => continue,
                        Err(_) => {
                            data[output_pos..].fill(silence);
                            return;
                        }
                    }
                }

                if let Some((chunk, chunk_pos)) = pending.as_mut() {
                    let to_copy = (chunk.samples.len() - *chunk_pos).min(data.len() - output_pos);
                    for (dst, src) in data[output_pos..output_pos + to_copy]
                        .iter_mut()
                        .zip(&chunk.samples[*chunk_pos..])
                    {
                        *dst = T::from_sample(*src);
                    }
                    *chunk_pos += to_copy;
                    output_pos += to_copy;

                    if *chunk_pos >= chunk.samples.len() {
                        pending = None;
                    }
                }
            }
        },
        |err| {
            error!("Audio stream error: {}", err);
        },
        None,
    )
}

/// The source currently bound on the decoder thread.
struct Bound {
    generation: u64,
    source: Payload,
    listener: TransportListener,
    /// `None` after end of stream or a decode failure
    decoder: Option<AudioDecoder>,
    resampler: Option<Resampler>,
    last_update: Instant,
}

struct DecoderThread {
    state: Arc<RwLock<OutputState>>,
    tap: SignalTap,
    audio_tx: Sender<AudioChunk>,
    output_rate: u32,
    output_channels: usize,
    current: Option<Bound>,
}

impl DecoderThread {
    fn run(&mut self, commands: Receiver<OutputCommand>) {
        loop {
            let playing = self.is_playing();

            // Block on commands when idle, poll when playing
            let command = if playing {
                commands.try_recv().ok()
            } else {
                match commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => break,
                }
            };

            if let Some(command) = command
                && !self.handle(command)
            {
                break;
            }

            if self.is_playing() {
                self.decode_step();
            }
        }
        debug!("audio decoder thread exiting");
    }

    fn is_playing(&self) -> bool {
        let state = self.state.read();
        state.status == OutputStatus::Playing
            && self
                .current
                .as_ref()
                .is_some_and(|b| b.generation == state.generation)
    }

    /// Emit for the current binding. The read lock is held while sending so
    /// a concurrent unbind cannot slip in between the check and the send.
    fn emit(&self, event: TransportEvent) {
        let Some(bound) = self.current.as_ref() else {
            return;
        };
        let state = self.state.read();
        if state.generation == bound.generation {
            bound.listener.emit(event);
        }
    }

    fn set_status(&self, status: OutputStatus) -> bool {
        let Some(bound) = self.current.as_ref() else {
            return false;
        };
        let mut state = self.state.write();
        if state.generation != bound.generation {
            return false;
        }
        state.status = status;
        true
    }

    /// Returns `false` on shutdown.
    fn handle(&mut self, command: OutputCommand) -> bool {
        match command {
            OutputCommand::Load {
                source,
                listener,
                generation,
            } => {
                self.current = Some(Bound {
                    generation,
                    source,
                    listener,
                    decoder: None,
                    resampler: None,
                    last_update: Instant::now(),
                });
                self.open();
            }
            OutputCommand::Play => {
                if self.current.as_ref().is_some_and(|b| b.decoder.is_none()) {
                    self.open();
                }
                if self.current.as_ref().is_some_and(|b| b.decoder.is_some())
                    && self.set_status(OutputStatus::Playing)
                {
                    self.emit(TransportEvent::Play);
                }
            }
            OutputCommand::Pause => {
                if self.set_status(OutputStatus::Paused) {
                    self.emit(TransportEvent::Pause);
                }
            }
            OutputCommand::Seek(position) => self.seek(position),
            OutputCommand::Unbind => {
                self.current = None;
            }
            OutputCommand::Shutdown => return false,
        }
        true
    }

    /// (Re)open the bound source from the start.
    fn open(&mut self) {
        let Some(bound) = self.current.as_mut() else {
            return;
        };
        match AudioDecoder::open(&bound.source) {
            Ok(decoder) => {
                let duration = decoder.duration();
                let resampler =
                    Resampler::new(decoder.sample_rate(), self.output_rate, decoder.channels());
                debug!(
                    source = %bound.source.name(),
                    resampling = resampler.needs_resampling(),
                    ratio = resampler.ratio(),
                    "source opened"
                );
                bound.resampler = Some(resampler);
                bound.decoder = Some(decoder);
                {
                    let mut state = self.state.write();
                    if state.generation == bound.generation {
                        state.duration = duration;
                        state.position = Duration::ZERO;
                    }
                }
                if let Some(duration) = duration {
                    self.emit(TransportEvent::DurationChanged(duration));
                }
            }
            Err(e) => {
                error!(source = %bound.source.name(), error = %e, "failed to open audio");
            }
        }
    }

    fn seek(&mut self, position: Duration) {
        if self.current.as_ref().is_some_and(|b| b.decoder.is_none()) {
            self.open();
        }
        let Some(bound) = self.current.as_mut() else {
            return;
        };
        let Some(decoder) = bound.decoder.as_mut() else {
            return;
        };
        if let Err(e) = decoder.seek(position) {
            warn!(error = %e, "seek failed");
            return;
        }
        if let Some(resampler) = bound.resampler.as_mut() {
            resampler.reset();
        }
        self.tap.clear();
        {
            let mut state = self.state.write();
            if state.generation == bound.generation {
                state.position = position;
            }
        }
        self.emit(TransportEvent::TimeUpdate(position));
    }

    fn decode_step(&mut self) {
        // Leave room for commands while the device catches up.
        if self.audio_tx.is_full() {
            thread::sleep(Duration::from_millis(5));
            return;
        }
        let Some(bound) = self.current.as_mut() else {
            return;
        };
        let Some(decoder) = bound.decoder.as_mut() else {
            return;
        };

        let channels = usize::from(decoder.channels());
        let mut samples = Vec::with_capacity(4096);
        match decoder.decode_next(|s| samples.extend_from_slice(s)) {
            Ok(Some(frame)) => {
                self.tap.push_interleaved(&samples, channels);
                let resampled = match bound.resampler.as_mut() {
                    Some(resampler) => resampler.process(&samples),
                    None => samples,
                };
                let chunk = AudioChunk {
                    samples: remap_channels(&resampled, channels, self.output_channels),
                    timestamp: frame.timestamp,
                    generation: bound.generation,
                };
                if self.audio_tx.try_send(chunk).is_err() {
                    debug!("output queue full, chunk dropped");
                }

                if bound.last_update.elapsed() >= TIME_UPDATE_INTERVAL {
                    bound.last_update = Instant::now();
                    let position = self.state.read().position;
                    self.emit(TransportEvent::TimeUpdate(position));
                }
            }
            Ok(None) => {
                info!(source = %bound.source.name(), "playback finished");
                self.finish();
            }
            Err(e) => {
                error!(source = %bound.source.name(), error = %e, "decode error");
                self.finish();
            }
        }
    }

    /// Let the device play out queued chunks before reporting the end.
    fn drain(&self) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while !self.audio_tx.is_empty() && self.is_playing() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn finish(&mut self) {
        if let Some(bound) = self.current.as_mut() {
            let channels = bound.decoder.as_ref().map(|d| usize::from(d.channels()));
            bound.decoder = None;
            if let (Some(resampler), Some(channels)) = (bound.resampler.as_mut(), channels) {
                let tail = resampler.flush();
                if !tail.is_empty() {
                    let chunk = AudioChunk {
                        samples: remap_channels(&tail, channels, self.output_channels),
                        timestamp: self.state.read().position,
                        generation: bound.generation,
                    };
                    let _ = self.audio_tx.try_send(chunk);
                }
                resampler.reset();
            }
        }
        self.drain();
        if self.set_status(OutputStatus::Paused) {
            self.emit(TransportEvent::Pause);
            self.emit(TransportEvent::Ended);
        }
    }
}
