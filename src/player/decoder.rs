//! Audio decoder using symphonia for multi-format support.
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)
//!
//! Sources are either files or in-memory bytes, see [`Payload`].

use std::fs::File;
use std::io::Cursor;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};

use super::transport::TransportError;
use crate::model::Payload;

/// Audio decoder wrapper for symphonia.
pub struct AudioDecoder {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    duration: Option<Duration>,
    time_base: Option<TimeBase>,
    /// Reused conversion buffer, grown on demand
    buffer: Option<SampleBuffer<f32>>,
}

impl AudioDecoder {
    /// Open a payload for decoding.
    pub fn open(source: &Payload) -> Result<Self, TransportError> {
        let media: Box<dyn MediaSource> = match source {
            Payload::File(path) => Box::new(File::open(path).map_err(|e| {
                TransportError::FileNotFound(format!("{}: {}", path.display(), e))
            })?),
            Payload::Memory { bytes, .. } => Box::new(Cursor::new(bytes.clone())),
        };
        let mss = MediaSourceStream::new(media, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = source.extension() {
            hint.with_extension(&ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &MetadataOptions::default())
            .map_err(|e| TransportError::UnsupportedFormat(format!("{}: {}", source.name(), e)))?;

        let reader = probed.format;

        // Find the first audio track
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TransportError::UnsupportedFormat("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| TransportError::Decode("Unknown sample rate".to_string()))?;
        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);

        let time_base = codec_params.time_base;
        let duration = codec_params.n_frames.map(|n_frames| match time_base {
            Some(tb) => to_duration(tb.calc_time(n_frames)),
            None => Duration::from_secs_f64(n_frames as f64 / f64::from(sample_rate)),
        });

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(Self {
            reader,
            decoder,
            track_id,
            sample_rate,
            channels,
            duration,
            time_base,
            buffer: None,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Total duration, when the container declares it.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, position: Duration) -> Result<(), TransportError> {
        let seek_to = SeekTo::Time {
            time: Time::from(position.as_secs_f64()),
            track_id: Some(self.track_id),
        };

        self.reader
            .seek(SeekMode::Accurate, seek_to)
            .map_err(|e| TransportError::Decode(format!("Seek failed: {}", e)))?;

        // Reset decoder state after seeking
        self.decoder.reset();

        Ok(())
    }

    /// Decode the next packet of the audio track.
    ///
    /// Returns `Ok(None)` at end of stream. The callback receives interleaved
    /// f32 samples.
    pub fn decode_next<F>(&mut self, mut callback: F) -> Result<Option<DecodedFrame>, TransportError>
    where
        F: FnMut(&[f32]),
    {
        loop {
            let packet = match self.reader.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(TransportError::Decode(e.to_string())),
            };

            // Skip packets from other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let timestamp = self
                .time_base
                .map(|tb| to_duration(tb.calc_time(packet.ts())))
                .unwrap_or_default();

            let decoded = match self.decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(_)) => continue, // Skip bad frame
                Err(e) => return Err(TransportError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let needed = decoded.capacity() * spec.channels.count();
            if self.buffer.as_ref().is_some_and(|b| b.capacity() < needed) {
                self.buffer = None;
            }
            let buffer = self
                .buffer
                .get_or_insert_with(|| SampleBuffer::new(capacity, spec));
            buffer.copy_interleaved_ref(decoded);

            let samples = buffer.samples();
            let frame = DecodedFrame {
                frames: samples.len() / usize::from(self.channels.max(1)),
                timestamp,
            };
            callback(samples);

            return Ok(Some(frame));
        }
    }
}

fn to_duration(time: Time) -> Duration {
    Duration::from_secs_f64(time.seconds as f64 + time.frac)
}

/// Information about a decoded packet.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Number of frames (samples per channel) decoded
    pub frames: usize,
    /// Presentation time of the first frame
    pub timestamp: Duration,
}
