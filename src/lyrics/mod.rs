//! Timed lyric parsing.
//!
//! Lyric files use one tag format per line: a leading `[MM:SS.ff]` or
//! `[MM:SS.fff]` followed by free text. Lines without that tag (metadata
//! tags such as `[ar:...]`, blank lines, plain text) are ignored.
//!
//! Two lines carrying the same timestamp form one [`LyricEvent`]: the first
//! becomes `primary`, a later one becomes `secondary` (a third overwrites
//! the second). This is how bilingual files are laid out.

mod cursor;

pub use cursor::{LyricCursor, active_index};

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::time::Duration;

/// A timestamp plus one or two lines of lyric text, active from `time`
/// until the next event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricEvent {
    pub time: Duration,
    pub primary: String,
    pub secondary: Option<String>,
}

/// How much of a timestamp's fractional part is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPrecision {
    /// `[01:02.50]` lands on 62s; the fraction is parsed and dropped.
    #[default]
    WholeSeconds,
    /// `[01:02.50]` lands on 62.5s.
    Millis,
}

/// Parse lyric text with whole-second timestamps.
pub fn parse(text: &str) -> Vec<LyricEvent> {
    parse_with(text, TimestampPrecision::WholeSeconds)
}

/// Parse lyric text into events sorted by strictly increasing time.
pub fn parse_with(text: &str, precision: TimestampPrecision) -> Vec<LyricEvent> {
    let mut events: BTreeMap<Duration, LyricEvent> = BTreeMap::new();
    // Editors on Windows often prefix the file with a byte-order mark
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    for line in text.lines() {
        let Some(tag) = parse_line(line) else {
            continue;
        };
        let time = tag.time(precision);
        match events.entry(time) {
            Entry::Vacant(slot) => {
                slot.insert(LyricEvent {
                    time,
                    primary: tag.text.to_string(),
                    secondary: None,
                });
            }
            Entry::Occupied(mut slot) => {
                slot.get_mut().secondary = Some(tag.text.to_string());
            }
        }
    }

    events.into_values().collect()
}

/// One recognised `[MM:SS.ff]text` line.
#[derive(Debug, PartialEq, Eq)]
struct TaggedLine<'a> {
    minutes: u64,
    seconds: u64,
    millis: u64,
    text: &'a str,
}

impl TaggedLine<'_> {
    fn time(&self, precision: TimestampPrecision) -> Duration {
        let whole = Duration::from_secs(self.minutes * 60 + self.seconds);
        match precision {
            TimestampPrecision::WholeSeconds => whole,
            TimestampPrecision::Millis => whole + Duration::from_millis(self.millis),
        }
    }
}

fn parse_line(line: &str) -> Option<TaggedLine<'_>> {
    let rest = line.trim_start().strip_prefix('[')?;
    let bytes = rest.as_bytes();

    let minutes = two_digits(bytes.get(0..2)?)?;
    if bytes.get(2) != Some(&b':') {
        return None;
    }
    let seconds = two_digits(bytes.get(3..5)?)?;
    if bytes.get(5) != Some(&b'.') {
        return None;
    }

    let fraction_len = bytes[6..].iter().take_while(|b| b.is_ascii_digit()).count();
    if !(2..=3).contains(&fraction_len) {
        return None;
    }
    let close = 6 + fraction_len;
    if bytes.get(close) != Some(&b']') {
        return None;
    }

    let fraction: u64 = rest[6..close].parse().ok()?;
    let millis = if fraction_len == 2 { fraction * 10 } else { fraction };

    Some(TaggedLine {
        minutes,
        seconds,
        millis,
        text: rest[close + 1..].trim(),
    })
}

fn two_digits(bytes: &[u8]) -> Option<u64> {
    match bytes {
        [a, b] if a.is_ascii_digit() && b.is_ascii_digit() => {
            Some(u64::from(a - b'0') * 10 + u64::from(b - b'0'))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Payload;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_parse_basic_lines() {
        let text = "[00:00.00]A\n[00:05.10]B\n[00:10.200]C\n";
        let events = parse(text);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].time, secs(0));
        assert_eq!(events[0].primary, "A");
        assert_eq!(events[1].time, secs(5));
        assert_eq!(events[2].time, secs(10));
        assert!(events.iter().all(|e| e.secondary.is_none()));
    }

    #[test]
    fn test_minutes_are_scaled() {
        let events = parse("[03:07.55]late line");
        assert_eq!(events[0].time, secs(187));
    }

    #[test]
    fn test_non_matching_lines_are_ignored() {
        let text = "[ar:Someone]\n\nplain text\n[0:05.00]one digit minute\n[00:05.0]short fraction\n[00:05.0000]long fraction\n[00:06.00]kept";
        let events = parse(text);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary, "kept");
    }

    #[test]
    fn test_leading_whitespace_and_trimmed_text() {
        let events = parse("   [00:01.00]   spaced out   \r\n");
        assert_eq!(events[0].primary, "spaced out");
    }

    #[test]
    fn test_byte_order_mark_keeps_first_line() {
        let payload = Payload::memory(
            "song.lrc",
            "\u{feff}[00:00.00]first\n[00:05.00]second".as_bytes().to_vec(),
        );
        let events = parse(&payload.read_text().unwrap());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].time, secs(0));
        assert_eq!(events[0].primary, "first");
        assert_eq!(events[1].primary, "second");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").is_empty());
        assert!(parse("no tags here\nat all").is_empty());
    }

    #[test]
    fn test_same_second_merges_into_secondary() {
        let text = "[00:12.00]Hello\n[00:12.50]Bonjour";
        let events = parse(text);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary, "Hello");
        assert_eq!(events[0].secondary.as_deref(), Some("Bonjour"));
    }

    #[test]
    fn test_third_line_overwrites_secondary() {
        let text = "[00:12.00]one\n[00:12.10]two\n[00:12.20]three";
        let events = parse(text);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].primary, "one");
        assert_eq!(events[0].secondary.as_deref(), Some("three"));
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        let text = "[00:20.00]third\n[00:01.00]first\n[00:10.00]second";
        let primaries: Vec<_> = parse(text).into_iter().map(|e| e.primary).collect();
        assert_eq!(primaries, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_precise_timestamps_keep_fraction() {
        let text = "[00:12.00]Hello\n[00:12.50]Bonjour\n[00:13.125]Next";
        let events = parse_with(text, TimestampPrecision::Millis);

        assert_eq!(events.len(), 3);
        assert_eq!(events[1].time, Duration::from_millis(12_500));
        assert_eq!(events[2].time, Duration::from_millis(13_125));
    }

    #[test]
    fn test_empty_text_is_a_valid_event() {
        let events = parse("[00:04.00]");
        assert_eq!(events[0].primary, "");
    }

    fn lyric_line() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u8..100, 0u8..100, 0u16..1000, "[a-zA-Z ]{0,12}")
                .prop_map(|(m, s, f, text)| format!("[{m:02}:{s:02}.{f:03}]{text}")),
            (0u8..100, 0u8..100, 0u8..100, "[a-zA-Z ]{0,12}")
                .prop_map(|(m, s, f, text)| format!("[{m:02}:{s:02}.{f:02}]{text}")),
            "[a-zA-Z\\[\\]:. ]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn parse_is_deterministic(lines in prop::collection::vec(lyric_line(), 0..40)) {
            let text = lines.join("\n");
            prop_assert_eq!(parse(&text), parse(&text));
        }

        #[test]
        fn times_strictly_increase(lines in prop::collection::vec(lyric_line(), 0..40)) {
            let text = lines.join("\n");
            for precision in [TimestampPrecision::WholeSeconds, TimestampPrecision::Millis] {
                let events = parse_with(&text, precision);
                for pair in events.windows(2) {
                    prop_assert!(pair[0].time < pair[1].time);
                }
            }
        }

        #[test]
        fn whole_second_times_have_no_fraction(lines in prop::collection::vec(lyric_line(), 0..40)) {
            let text = lines.join("\n");
            for event in parse(&text) {
                prop_assert_eq!(event.time.subsec_nanos(), 0);
            }
        }
    }
}
