//! Accent colour extraction from a raster image.
//!
//! The image is downsampled, clustered with k-means, and the cluster closest
//! to a "light muted" target (bright, low saturation) is chosen. When no
//! cluster falls in that range, the most populous one is pulled to the
//! target lightness and saturation instead.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;

use crate::model::Payload;

/// An sRGB colour rendered as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccentColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl AccentColor {
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AccentColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for AccentColor {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ColorError::InvalidHex(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| ColorError::InvalidHex(s.to_string()))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Colour extraction errors
#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("Failed to read image: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no opaque pixels")]
    Empty,

    #[error("Invalid colour {0:?}, expected #rrggbb")]
    InvalidHex(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

/// Derives an accent colour from an image.
#[async_trait]
pub trait ColorExtractor: Send + Sync {
    async fn extract(&self, image: &Payload) -> Result<AccentColor, ColorError>;
}

/// Palette-based [`ColorExtractor`], run on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaletteExtractor;

#[async_trait]
impl ColorExtractor for PaletteExtractor {
    async fn extract(&self, image: &Payload) -> Result<AccentColor, ColorError> {
        let image = image.clone();
        tokio::task::spawn_blocking(move || {
            let bytes = image.read_bytes()?;
            light_muted_from_bytes(&bytes)
        })
        .await
        .map_err(|e| ColorError::TaskJoin(e.to_string()))?
    }
}

const THUMBNAIL_SIZE: u32 = 96;
const MAX_SAMPLES: usize = 6_000;
const CLUSTERS: usize = 6;
const MAX_ITER: usize = 10;

const TARGET_LIGHTNESS: f32 = 0.74;
const MIN_LIGHTNESS: f32 = 0.55;
const TARGET_SATURATION: f32 = 0.3;
const MAX_SATURATION: f32 = 0.4;

/// Pick the light muted swatch of an encoded image.
pub fn light_muted_from_bytes(bytes: &[u8]) -> Result<AccentColor, ColorError> {
    let image = image::load_from_memory(bytes)?
        .thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
        .to_rgba8();
    let pixels: Vec<[u8; 4]> = image.pixels().map(|p| p.0).collect();
    light_muted(&pixels).ok_or(ColorError::Empty)
}

/// Pick the light muted swatch from raw RGBA pixels.
pub fn light_muted(pixels: &[[u8; 4]]) -> Option<AccentColor> {
    let samples = sample_pixels(pixels, MAX_SAMPLES);
    if samples.is_empty() {
        return None;
    }

    let clusters = kmeans_clusters(&samples, CLUSTERS.min(samples.len()), MAX_ITER);
    let max_count = clusters.iter().map(|c| c.count).max().unwrap_or(0).max(1) as f32;

    let best = clusters
        .iter()
        .filter(|c| c.count > 0)
        .filter_map(|c| {
            let (h, s, l) = rgb_to_hsl(c.centroid);
            (l >= MIN_LIGHTNESS && s <= MAX_SATURATION).then(|| {
                let score = (1.0 - (s - TARGET_SATURATION).abs()) * 3.0
                    + (1.0 - (l - TARGET_LIGHTNESS).abs()) * 6.5
                    + (c.count as f32 / max_count) * 0.5;
                (score, (h, s, l))
            })
        })
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, hsl)| hsl);

    let (h, s, l) = match best {
        Some(hsl) => hsl,
        None => {
            let dominant = clusters.iter().max_by_key(|c| c.count)?;
            let (h, s, _) = rgb_to_hsl(dominant.centroid);
            (h, s.min(TARGET_SATURATION), TARGET_LIGHTNESS)
        }
    };

    let [r, g, b] = hsl_to_rgb(h, s, l);
    Some(AccentColor::rgb(r, g, b))
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    centroid: [f32; 3],
    count: usize,
}

fn sample_pixels(pixels: &[[u8; 4]], max_samples: usize) -> Vec<[f32; 3]> {
    if max_samples == 0 || pixels.is_empty() {
        return Vec::new();
    }

    let step = (pixels.len() / max_samples).max(1);
    pixels
        .iter()
        .step_by(step)
        .filter(|p| p[3] >= 16)
        .take(max_samples)
        .map(|p| [f32::from(p[0]), f32::from(p[1]), f32::from(p[2])])
        .collect()
}

fn squared_distance(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dr = a[0] - b[0];
    let dg = a[1] - b[1];
    let db = a[2] - b[2];
    dr * dr + dg * dg + db * db
}

fn kmeans_clusters(samples: &[[f32; 3]], k: usize, max_iter: usize) -> Vec<Cluster> {
    if samples.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut centroids: Vec<[f32; 3]> = (0..k)
        .map(|i| samples[((i * samples.len()) / k).min(samples.len() - 1)])
        .collect();
    let mut assignments = vec![0usize; samples.len()];

    for iter in 0..max_iter {
        let mut sums = vec![[0f32; 3]; k];
        let mut counts = vec![0usize; k];

        for (sample, assignment) in samples.iter().zip(assignments.iter_mut()) {
            let best = nearest(sample, &centroids);
            *assignment = best;
            for channel in 0..3 {
                sums[best][channel] += sample[channel];
            }
            counts[best] += 1;
        }

        let mut changed = false;
        for i in 0..k {
            if counts[i] == 0 {
                centroids[i] = samples[(i + iter) % samples.len()];
                changed = true;
                continue;
            }
            let n = counts[i] as f32;
            let updated = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            if squared_distance(&centroids[i], &updated) > 1e-2 {
                changed = true;
            }
            centroids[i] = updated;
        }

        if !changed {
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for &assignment in &assignments {
        counts[assignment] += 1;
    }

    centroids
        .into_iter()
        .zip(counts)
        .map(|(centroid, count)| Cluster { centroid, count })
        .collect()
}

fn nearest(sample: &[f32; 3], centroids: &[[f32; 3]]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::MAX;
    for (idx, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(sample, centroid);
        if dist < best_dist {
            best_dist = dist;
            best = idx;
        }
    }
    best
}

/// RGB in 0..=255 to HSL in 0..=1.
fn rgb_to_hsl(rgb: [f32; 3]) -> (f32, f32, f32) {
    let [r, g, b] = rgb.map(|c| (c / 255.0).clamp(0.0, 1.0));
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f32::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 { d / (2.0 - max - min) } else { d / (max + min) };
    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };
    (h / 6.0, s, l)
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    if s <= 0.0 {
        let v = to_byte(l);
        return [v, v, v];
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f32| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    [
        to_byte(hue(h + 1.0 / 3.0)),
        to_byte(hue(h)),
        to_byte(hue(h - 1.0 / 3.0)),
    ]
}
