//! Full-screen terminal rendering with ratatui.
//!
//! The playing view shows the active lyric line above the spectrum; the
//! paused view shows the album and the artwork instead.

use std::io;

use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Gauge, Paragraph, Widget};
use ratatui::{Frame, Terminal};
use tracing::warn;

use super::{NowPlaying, RenderSurface, layout_bars, BAR_HEIGHT_SCALE};
use crate::loader::{AccentColor, ResourceId};
use crate::model::Payload;
use crate::player::{FrequencySnapshot, SessionPhase};

const BAR_BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const ART_ROWS: u16 = 12;

/// Album art pixel grid, two pixel rows per terminal row
type ArtPixels = Vec<Vec<(u8, u8, u8)>>;

pub struct TerminalSurface<B: Backend = CrosstermBackend<io::Stdout>> {
    terminal: Terminal<B>,
    view: Option<NowPlaying>,
    spectrum: Vec<u8>,
    art: Option<(ResourceId, Option<ArtPixels>)>,
    restore_on_drop: bool,
}

impl TerminalSurface {
    /// Take over the terminal: raw mode and the alternate screen. Restored
    /// on drop.
    pub fn new() -> io::Result<Self> {
        let mut surface = Self::with_terminal(ratatui::try_init()?);
        surface.restore_on_drop = true;
        Ok(surface)
    }
}

impl<B: Backend> TerminalSurface<B> {
    pub fn with_terminal(terminal: Terminal<B>) -> Self {
        Self {
            terminal,
            view: None,
            spectrum: Vec::new(),
            art: None,
            restore_on_drop: false,
        }
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    fn redraw(&mut self) {
        let Self {
            terminal,
            view,
            spectrum,
            art,
            ..
        } = self;
        let Some(view) = view.as_ref() else {
            return;
        };
        let art = art.as_ref().and_then(|(_, pixels)| pixels.as_ref());

        if let Err(e) = terminal.draw(|frame| draw(frame, view, spectrum, art)) {
            warn!(error = %e, "terminal draw failed");
        }
    }

    fn refresh_art(&mut self, view: &NowPlaying) {
        let wanted = view.artwork.as_ref().map(|a| a.id);
        let current = self.art.as_ref().map(|(id, _)| *id);
        if wanted == current {
            return;
        }
        self.art = view
            .artwork
            .as_ref()
            .map(|a| (a.id, decode_art(&a.payload, ART_ROWS * 2, ART_ROWS)));
    }
}

impl<B: Backend + Send> RenderSurface for TerminalSurface<B> {
    fn present(&mut self, view: &NowPlaying) {
        self.refresh_art(view);
        if !view.is_playing {
            self.spectrum.clear();
        }
        self.view = Some(view.clone());
        self.redraw();
    }

    fn draw_spectrum(&mut self, snapshot: &FrequencySnapshot, accent: AccentColor) {
        self.spectrum.clone_from(&snapshot.magnitudes);
        if let Some(view) = self.view.as_mut() {
            view.accent = accent;
        }
        self.redraw();
    }
}

impl<B: Backend> Drop for TerminalSurface<B> {
    fn drop(&mut self) {
        if self.restore_on_drop {
            ratatui::restore();
        }
    }
}

fn accent_color(accent: AccentColor) -> Color {
    Color::Rgb(accent.r, accent.g, accent.b)
}

fn rounded(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title)
}

fn draw(frame: &mut Frame, view: &NowPlaying, spectrum: &[u8], art: Option<&ArtPixels>) {
    let accent = accent_color(view.accent);
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(6),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .split(frame.area());

    let status = match view.phase {
        SessionPhase::Loading => "Loading",
        _ if view.is_playing => "Playing",
        _ => "Paused",
    };
    let mut header = vec![
        Span::styled(
            format!(" {status} "),
            Style::default().fg(Color::Black).bg(accent),
        ),
        Span::raw(format!("  [{}/{}]  ", view.index + 1, view.total)),
        Span::styled(view.title.as_str(), Style::default().add_modifier(Modifier::BOLD)),
    ];
    if let Some(artist) = &view.artist {
        header.push(Span::raw(format!(" - {artist}")));
    }
    frame.render_widget(
        Paragraph::new(Line::from(header)).block(rounded(" Now Playing ")),
        chunks[0],
    );

    if view.is_playing {
        draw_playing(frame, chunks[1], view, spectrum, accent);
    } else {
        draw_paused(frame, chunks[1], view, art);
    }

    let gauge = Gauge::default()
        .block(rounded(" Progress "))
        .gauge_style(Style::default().fg(accent))
        .ratio(view.progress())
        .label(view.clock());
    frame.render_widget(gauge, chunks[2]);

    frame.render_widget(
        Paragraph::new("space play/pause  n/p next/prev  ,/. seek  q quit")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn draw_playing(frame: &mut Frame, area: Rect, view: &NowPlaying, spectrum: &[u8], accent: Color) {
    let [lyrics_area, spectrum_area] =
        Layout::vertical([Constraint::Length(4), Constraint::Min(3)]).areas(area);

    let mut lines = Vec::new();
    if let Some(lyric) = &view.lyric {
        lines.push(Line::styled(
            lyric.primary.as_str(),
            Style::default().fg(accent).add_modifier(Modifier::BOLD),
        ));
        if let Some(secondary) = &lyric.secondary {
            lines.push(Line::styled(
                secondary.as_str(),
                Style::default().fg(Color::Gray),
            ));
        }
    }
    frame.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .block(rounded(" Lyrics ")),
        lyrics_area,
    );

    let block = rounded(" Spectrum ");
    let inner = block.inner(spectrum_area);
    frame.render_widget(block, spectrum_area);
    frame.render_widget(
        SpectrumBars {
            magnitudes: spectrum,
            color: accent,
        },
        inner,
    );
}

fn draw_paused(frame: &mut Frame, area: Rect, view: &NowPlaying, art: Option<&ArtPixels>) {
    let block = rounded(" Album ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [album_area, art_area] =
        Layout::vertical([Constraint::Length(2), Constraint::Min(0)]).areas(inner);
    let album = view.album.as_deref().unwrap_or("Unknown album");
    frame.render_widget(
        Paragraph::new(album).alignment(Alignment::Center),
        album_area,
    );

    if let Some(pixels) = art {
        let cols = pixels.first().map_or(0, |r| r.len()) as u16;
        let x = art_area.x + art_area.width.saturating_sub(cols) / 2;
        let centred = Rect {
            x,
            width: art_area.width.min(cols),
            ..art_area
        };
        frame.render_widget(AlbumArt { pixels }, centred);
    }
}

/// Bars from [`layout_bars`], one terminal cell per surface unit.
struct SpectrumBars<'a> {
    magnitudes: &'a [u8],
    color: Color,
}

impl Widget for SpectrumBars<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let max_height = 255.0 * BAR_HEIGHT_SCALE;
        let eighths_total = f32::from(area.height) * 8.0;

        for bar in layout_bars(self.magnitudes, f32::from(area.width)) {
            let first = bar.x.floor() as u16;
            let last = (bar.x + bar.width).ceil().max(bar.x + 1.0) as u16;
            let mut eighths = (bar.height / max_height * eighths_total).round() as u16;

            for row in (0..area.height).rev() {
                let fill = eighths.min(8);
                eighths = eighths.saturating_sub(8);
                if fill == 0 {
                    break;
                }
                for col in first..last.min(area.width) {
                    buf[(area.x + col, area.y + row)]
                        .set_char(BAR_BLOCKS[fill as usize])
                        .set_fg(self.color);
                }
            }
        }
    }
}

struct AlbumArt<'a> {
    pixels: &'a ArtPixels,
}

impl Widget for AlbumArt<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = (area.height as usize).min(self.pixels.len() / 2);
        for cy in 0..rows {
            let top_row = &self.pixels[cy * 2];
            let bottom_row = self.pixels.get(cy * 2 + 1).unwrap_or(top_row);
            for (cx, (top, bottom)) in top_row
                .iter()
                .zip(bottom_row)
                .take(area.width as usize)
                .enumerate()
            {
                buf[(area.x + cx as u16, area.y + cy as u16)]
                    .set_char('▀')
                    .set_fg(Color::Rgb(top.0, top.1, top.2))
                    .set_bg(Color::Rgb(bottom.0, bottom.1, bottom.2));
            }
        }
    }
}

fn decode_art(payload: &Payload, cols: u16, rows: u16) -> Option<ArtPixels> {
    let bytes = match payload.read_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(image = %payload.name(), error = %e, "artwork unreadable");
            return None;
        }
    };
    let img = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            warn!(image = %payload.name(), error = %e, "artwork undecodable");
            return None;
        }
    };
    let px_h = u32::from(rows) * 2;
    let rgb = img
        .resize_exact(u32::from(cols), px_h, image::imageops::FilterType::Triangle)
        .to_rgb8();
    Some(
        rgb.rows()
            .map(|row| row.map(|p| (p[0], p[1], p[2])).collect())
            .collect(),
    )
}
