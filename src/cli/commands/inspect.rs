//! File inspection commands.

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Runtime;
use tracing::warn;

use super::Format;
use crate::config::Config;
use crate::cover::{CoverSource, resolve_image};
use crate::error::{Error, ResultExt};
use crate::loader::{ColorExtractor, PaletteExtractor};
use crate::lyrics::{self, LyricEvent, TimestampPrecision};
use crate::metadata::{ContainerMetadata, LoftyExtractor, MetadataExtractor};
use crate::model::Payload;
use crate::player::format_clock;

/// What `inspect` found out about a file.
#[derive(Debug, Serialize)]
struct InspectReport {
    file: String,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    duration_secs: Option<f64>,
    cover: Option<CoverReport>,
    accent: Option<String>,
}

#[derive(Debug, Serialize)]
struct CoverReport {
    source: &'static str,
    mime_type: Option<String>,
}

impl InspectReport {
    fn to_text(&self) -> String {
        let mut out = String::new();
        let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "File:     {}", self.file);
        let _ = writeln!(out, "Title:    {}", field(&self.title));
        let _ = writeln!(out, "Artist:   {}", field(&self.artist));
        let _ = writeln!(out, "Album:    {}", field(&self.album));
        let duration = self
            .duration_secs
            .map(|s| format_clock(Duration::from_secs_f64(s)))
            .unwrap_or_else(|| "--:--".to_string());
        let _ = writeln!(out, "Duration: {}", duration);
        match &self.cover {
            Some(cover) => {
                let _ = writeln!(
                    out,
                    "Cover:    {} ({})",
                    cover.source,
                    cover.mime_type.as_deref().unwrap_or("unknown type")
                );
            }
            None => {
                let _ = writeln!(out, "Cover:    none");
            }
        }
        let _ = writeln!(out, "Accent:   {}", field(&self.accent));
        out
    }
}

fn build_report(
    audio: &Payload,
    metadata: ContainerMetadata,
    cover: Option<(CoverSource, Option<String>)>,
    accent: Option<String>,
) -> InspectReport {
    InspectReport {
        file: audio.name(),
        title: metadata.title,
        artist: metadata.artist,
        album: metadata.album,
        duration_secs: metadata.duration.map(|d| d.as_secs_f64()),
        cover: cover.map(|(source, mime_type)| CoverReport {
            source: match source {
                CoverSource::Override => "override",
                CoverSource::Embedded => "embedded",
            },
            mime_type,
        }),
        accent,
    }
}

/// Print metadata, cover source and accent colour of an audio file.
pub fn cmd_inspect(
    rt: &Runtime,
    path: &Path,
    background: Option<&Path>,
    format: Format,
) -> anyhow::Result<()> {
    if !path.is_file() {
        return Err(Error::not_found(path).into());
    }
    let audio = Payload::file(path);
    let background = background.map(Payload::file);

    let report = rt.block_on(async {
        let metadata = LoftyExtractor
            .extract(&audio)
            .await
            .with_context("reading tags")?;
        let image = resolve_image(background.as_ref(), metadata.cover.as_ref());
        let accent = match &image {
            Some(image) => match PaletteExtractor.extract(&image.payload).await {
                Ok(color) => Some(color.hex()),
                Err(e) => {
                    warn!(error = %e, "accent extraction failed");
                    None
                }
            },
            None => None,
        };
        let cover = image.map(|i| (i.source, i.mime_type));
        anyhow::Ok(build_report(&audio, metadata, cover, accent))
    })?;

    match format {
        Format::Text => print!("{}", report.to_text()),
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn render_lyrics(events: &[LyricEvent], at: Option<Duration>) -> String {
    let mut out = String::new();
    if events.is_empty() {
        let _ = writeln!(out, "No timed lines found.");
        return out;
    }

    let active = at.and_then(|now| lyrics::active_index(events, now));
    for (i, event) in events.iter().enumerate() {
        let marker = if Some(i) == active { ">" } else { " " };
        let _ = write!(out, "{} [{}] {}", marker, format_clock(event.time), event.primary);
        if let Some(secondary) = &event.secondary {
            let _ = write!(out, " / {}", secondary);
        }
        out.push('\n');
    }

    if let Some(now) = at {
        let line = active
            .map(|i| events[i].primary.as_str())
            .unwrap_or("(before first line)");
        let _ = writeln!(out, "\nAt {}: {}", format_clock(now), line);
    }
    out
}

/// Print the events of a lyric file and, with `--at`, the active line.
pub fn cmd_lyrics(config: &Config, path: &Path, at: Option<f64>, precise: bool) -> anyhow::Result<()> {
    let text = Payload::file(path)
        .read_text()
        .with_context(format!("reading {}", path.display()))?;
    let precision = if precise {
        TimestampPrecision::Millis
    } else {
        config.lyrics.precision()
    };
    let events = lyrics::parse_with(&text, precision);
    let at = at
        .map(Duration::try_from_secs_f64)
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid --at value: {}", e))?;
    print!("{}", render_lyrics(&events, at));
    Ok(())
}
