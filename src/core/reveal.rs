/// Timed character reveal that keeps the final layout from the first frame.
///
/// The whole line is present from the start; hidden characters are wrapped
/// in a transparency markup so the text box sizes itself once, and each
/// interval flips the next character to visible.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Markup used to hide characters that have not been revealed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealMarkup {
    pub hidden_open: String,
    pub hidden_close: String,
}

impl Default for RevealMarkup {
    fn default() -> Self {
        Self {
            hidden_open: "<color=#ffffff00>".to_string(),
            hidden_close: "</color>".to_string(),
        }
    }
}

impl RevealMarkup {
    pub fn new(hidden_open: impl Into<String>, hidden_close: impl Into<String>) -> Self {
        Self {
            hidden_open: hidden_open.into(),
            hidden_close: hidden_close.into(),
        }
    }

    /// Render glyphs, wrapping each run of hidden characters in the markup.
    pub fn render<I>(&self, glyphs: I) -> String
    where
        I: IntoIterator<Item = Glyph>,
    {
        let mut out = String::new();
        let mut hidden = false;
        for glyph in glyphs {
            if glyph.visible == hidden {
                out.push_str(if hidden {
                    &self.hidden_close
                } else {
                    &self.hidden_open
                });
                hidden = !hidden;
            }
            out.push(glyph.ch);
        }
        if hidden {
            out.push_str(&self.hidden_close);
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    pub ch: char,
    pub visible: bool,
}

/// One display snapshot and how long it stays up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub text: String,
    pub delay: Duration,
}

/// Reveals a line one character per interval, driven by [`tick`](Self::tick).
///
/// The character at `start_offset` shows immediately, every interval after
/// that shows the next one, and the reveal completes one interval after the
/// last character appears.
#[derive(Debug, Clone)]
pub struct TextRevealer {
    glyphs: Vec<Glyph>,
    start_offset: usize,
    revealed: usize,
    interval: Duration,
    elapsed: Duration,
    complete: bool,
    cancelled: bool,
}

impl TextRevealer {
    /// Start revealing `text` at `chars_per_second`. Characters before
    /// `start_offset` are visible from the outset.
    ///
    /// A rate that is not a positive finite number reveals everything at once.
    pub fn new(text: &str, chars_per_second: f32, start_offset: usize) -> Self {
        let interval = interval_for(chars_per_second);
        let glyphs: Vec<Glyph> = text
            .chars()
            .enumerate()
            .map(|(i, ch)| Glyph {
                ch,
                visible: i < start_offset,
            })
            .collect();
        let start_offset = start_offset.min(glyphs.len());

        let mut revealer = Self {
            glyphs,
            start_offset,
            revealed: start_offset,
            interval,
            elapsed: Duration::ZERO,
            complete: false,
            cancelled: false,
        };

        if interval.is_zero() || !revealer.reveal_next() {
            revealer.finish();
        }
        revealer
    }

    /// Advance the clock. Returns how many characters became visible.
    ///
    /// Does nothing once the reveal is complete or cancelled.
    pub fn tick(&mut self, delta: Duration) -> usize {
        if self.complete || self.cancelled {
            return 0;
        }

        self.elapsed = self.elapsed.saturating_add(delta);
        let mut newly = 0;
        while self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            if self.reveal_next() {
                newly += 1;
            } else {
                self.complete = true;
                self.elapsed = Duration::ZERO;
                break;
            }
        }
        newly
    }

    /// Stop emitting. The display stays where it is until [`finish`](Self::finish).
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Snap to the fully revealed line.
    pub fn finish(&mut self) {
        for glyph in &mut self.glyphs {
            glyph.visible = true;
        }
        self.revealed = self.glyphs.len();
        self.elapsed = Duration::ZERO;
        self.complete = true;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed
    }

    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn full_text(&self) -> String {
        self.glyphs.iter().map(|g| g.ch).collect()
    }

    /// Only the characters revealed so far.
    pub fn plain_text(&self) -> String {
        self.glyphs.iter().filter(|g| g.visible).map(|g| g.ch).collect()
    }

    /// The whole line with unrevealed characters wrapped in `markup`.
    pub fn display_text(&self, markup: &RevealMarkup) -> String {
        markup.render(self.glyphs.iter().copied())
    }

    /// The full reveal as a lazy sequence of snapshots, independent of
    /// how far this revealer has been ticked.
    pub fn frames<'a>(&'a self, markup: &'a RevealMarkup) -> Frames<'a> {
        let len = self.glyphs.len();
        let (visible, delay) = if self.interval.is_zero() || self.start_offset >= len {
            (len, Duration::ZERO)
        } else {
            (self.start_offset + 1, self.interval)
        };
        Frames {
            glyphs: &self.glyphs,
            markup,
            visible,
            delay,
            finished: false,
        }
    }

    fn reveal_next(&mut self) -> bool {
        match self.glyphs.get_mut(self.revealed) {
            Some(glyph) => {
                glyph.visible = true;
                self.revealed += 1;
                true
            }
            None => false,
        }
    }
}

/// Iterator over the snapshots of a reveal; see [`TextRevealer::frames`].
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    glyphs: &'a [Glyph],
    markup: &'a RevealMarkup,
    visible: usize,
    delay: Duration,
    finished: bool,
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.finished {
            return None;
        }
        let visible = self.visible;
        let text = self.markup.render(self.glyphs.iter().enumerate().map(|(i, g)| Glyph {
            ch: g.ch,
            visible: i < visible,
        }));
        if visible >= self.glyphs.len() {
            self.finished = true;
        } else {
            self.visible += 1;
        }
        Some(Frame {
            text,
            delay: self.delay,
        })
    }
}

fn interval_for(chars_per_second: f32) -> Duration {
    if !chars_per_second.is_finite() || chars_per_second <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(1.0 / chars_per_second as f64).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TENTH: Duration = Duration::from_millis(100);

    fn visible_count(text: &str, markup: &RevealMarkup) -> usize {
        match text.find(&markup.hidden_open) {
            Some(pos) => text[..pos].chars().count(),
            None => text.chars().count(),
        }
    }

    #[test]
    fn render_wraps_hidden_runs() {
        let markup = RevealMarkup::new("<h>", "</h>");
        let glyphs = "abcd".chars().enumerate().map(|(i, ch)| Glyph {
            ch,
            visible: i == 0 || i == 2,
        });
        assert_eq!(markup.render(glyphs), "a<h>b</h>c<h>d</h>");
    }

    #[test]
    fn first_character_shows_immediately() {
        let markup = RevealMarkup::default();
        let revealer = TextRevealer::new("Hi", 10.0, 0);
        assert!(!revealer.is_complete());
        assert_eq!(revealer.plain_text(), "H");
        assert_eq!(
            revealer.display_text(&markup),
            "H<color=#ffffff00>i</color>"
        );
        assert_eq!(revealer.interval(), TENTH);
    }

    #[test]
    fn completes_one_interval_after_last_character() {
        let mut revealer = TextRevealer::new("Hey", 10.0, 0);
        assert_eq!(revealer.tick(TENTH), 1);
        assert_eq!(revealer.tick(TENTH), 1);
        assert_eq!(revealer.plain_text(), "Hey");
        assert!(!revealer.is_complete());
        assert_eq!(revealer.tick(TENTH), 0);
        assert!(revealer.is_complete());
        assert_eq!(revealer.display_text(&RevealMarkup::default()), "Hey");
    }

    #[test]
    fn partial_ticks_accumulate() {
        let mut revealer = TextRevealer::new("abc", 4.0, 0);
        assert_eq!(revealer.tick(Duration::from_millis(100)), 0);
        assert_eq!(revealer.tick(Duration::from_millis(100)), 0);
        assert_eq!(revealer.tick(Duration::from_millis(50)), 1);
        assert_eq!(revealer.revealed_count(), 2);
    }

    #[test]
    fn large_tick_reveals_many() {
        let mut revealer = TextRevealer::new("abcdef", 10.0, 0);
        assert_eq!(revealer.tick(Duration::from_secs(10)), 5);
        assert!(revealer.is_complete());
        assert_eq!(revealer.tick(Duration::from_secs(10)), 0);
    }

    #[test]
    fn empty_text_completes_immediately() {
        let revealer = TextRevealer::new("", 30.0, 0);
        assert!(revealer.is_complete());
        let frames: Vec<Frame> = revealer.frames(&RevealMarkup::default()).collect();
        assert_eq!(
            frames,
            vec![Frame {
                text: String::new(),
                delay: Duration::ZERO,
            }]
        );
    }

    #[test]
    fn start_offset_keeps_prefix_visible() {
        let mut revealer = TextRevealer::new("Hello world", 10.0, 6);
        assert_eq!(revealer.plain_text(), "Hello w");
        assert_eq!(revealer.tick(TENTH), 1);
        assert_eq!(revealer.plain_text(), "Hello wo");

        let frames: Vec<Frame> = revealer.frames(&RevealMarkup::default()).collect();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames.last().unwrap().text, "Hello world");

        let past_end = TextRevealer::new("Hi", 10.0, 9);
        assert!(past_end.is_complete());
        assert_eq!(past_end.plain_text(), "Hi");
    }

    #[test]
    fn cancel_stops_emission() {
        let mut revealer = TextRevealer::new("Hello", 10.0, 0);
        revealer.cancel();
        assert_eq!(revealer.tick(Duration::from_secs(5)), 0);
        assert_eq!(revealer.plain_text(), "H");
        assert!(!revealer.is_complete());

        revealer.finish();
        assert!(revealer.is_complete());
        assert!(revealer.is_cancelled());
        assert_eq!(revealer.display_text(&RevealMarkup::default()), "Hello");
    }

    #[test]
    fn invalid_rate_reveals_everything() {
        for rate in [0.0, -5.0, f32::NAN, f32::INFINITY] {
            let revealer = TextRevealer::new("Instant", rate, 0);
            assert!(revealer.is_complete());
            assert_eq!(revealer.plain_text(), "Instant");
        }
    }

    #[test]
    fn multibyte_characters_reveal_whole() {
        let mut revealer = TextRevealer::new("héllo✨", 10.0, 0);
        assert_eq!(revealer.len(), 6);
        revealer.tick(TENTH);
        assert_eq!(revealer.plain_text(), "hé");
        assert_eq!(revealer.full_text(), "héllo✨");
    }

    #[test]
    fn frames_are_monotonic_and_end_unmarked() {
        let markup = RevealMarkup::default();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let len: usize = rng.gen_range(1..40);
            let text: String = (0..len).map(|_| rng.gen_range('a'..='z')).collect();
            let rate = rng.gen_range(1u32..120) as f32;
            let revealer = TextRevealer::new(&text, rate, 0);

            let frames: Vec<Frame> = revealer.frames(&markup).collect();
            assert_eq!(frames.len(), len);
            assert_eq!(frames.last().unwrap().text, text);

            let mut previous = 0;
            for frame in &frames {
                let count = visible_count(&frame.text, &markup);
                assert!(count > previous);
                assert_eq!(frame.delay, revealer.interval());
                previous = count;
            }
        }
    }

    #[test]
    fn ticking_matches_frames() {
        let markup = RevealMarkup::default();
        let mut revealer = TextRevealer::new("Layout", 20.0, 0);
        let frames: Vec<String> = revealer.frames(&markup).map(|f| f.text).collect();

        let mut seen = vec![revealer.display_text(&markup)];
        while !revealer.is_complete() {
            if revealer.tick(Duration::from_millis(50)) > 0 {
                seen.push(revealer.display_text(&markup));
            }
        }
        assert_eq!(seen, frames);
    }
}
