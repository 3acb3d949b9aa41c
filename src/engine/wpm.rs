use chrono::{DateTime, Utc};

use crate::engine::clock::SharedClock;

pub const CHARS_PER_WORD: f64 = 5.0;

const DEFAULT_DELIMITER: char = ' ';

/// Inclusive character range credited to one occurrence of a word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WordSpan {
    pub start: usize,
    pub end: usize,
}

impl WordSpan {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Position of a word from the exercise sequence inside the exercise text.
#[derive(Clone, Copy, Debug)]
struct Occurrence {
    word_idx: usize,
    start: usize,
}

/// Per-character timing of the exercise currently being typed.
pub struct WpmTracker {
    clock: SharedClock,
    text: Vec<char>,
    words: Vec<String>,
    delimiter: char,
    char_time: Vec<Option<DateTime<Utc>>>,
    last_set_index: usize,
    occurrences: Vec<Occurrence>,
    typing: bool,
}

impl WpmTracker {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            text: Vec::new(),
            words: Vec::new(),
            delimiter: DEFAULT_DELIMITER,
            char_time: Vec::new(),
            last_set_index: 0,
            occurrences: Vec::new(),
            typing: false,
        }
    }

    pub fn set_delimiter(&mut self, delimiter: char) {
        self.delimiter = delimiter;
    }

    /// Start timing a new exercise.
    ///
    /// `words` is the batch in typing order (repeats included); it is used to
    /// locate each occurrence and to look at the following word when
    /// deciding whether a trailing delimiter belongs to a span.
    pub fn set_exercise(&mut self, text: &str, words: &[String]) {
        self.text = text.chars().collect();
        self.words = words.to_vec();
        self.occurrences = locate_occurrences(&self.text, &self.words);
        self.reset();
    }

    pub fn exercise(&self) -> String {
        self.text.iter().collect()
    }

    pub fn reset(&mut self) {
        self.char_time = vec![None; self.text.len()];
        self.last_set_index = 0;
        self.typing = false;
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn last_set_index(&self) -> usize {
        self.last_set_index
    }

    /// Record that character `index` was just typed correctly.
    ///
    /// Typing the first character again restarts the whole series so a retry
    /// does not inherit timing from the abandoned attempt.
    pub fn update_char_time(&mut self, index: usize) {
        if index >= self.char_time.len() {
            return;
        }
        let now = self.clock.now();
        if index == 0 {
            self.char_time.iter_mut().for_each(|slot| *slot = Some(now));
        } else {
            self.char_time[index] = Some(now);
        }
        self.last_set_index = index;
        self.typing = index + 1 < self.char_time.len();
    }

    /// Aggregate speed from the first character to the last confirmed one.
    pub fn wpm(&self) -> f64 {
        if self.char_time.is_empty() || self.last_set_index >= self.char_time.len() {
            return 0.0;
        }
        let (Some(start), Some(end)) = (self.char_time[0], self.char_time[self.last_set_index])
        else {
            return 0.0;
        };
        let minutes = millis_between(start, end) / 60_000.0;
        if minutes <= 0.0 {
            return 0.0;
        }
        finite_or_zero(self.last_set_index as f64 / CHARS_PER_WORD / minutes)
    }

    /// Average speed over every completed occurrence of `word`.
    pub fn word_wpm(&self, word: &str, chorded: bool) -> f64 {
        if self.char_time.is_empty() {
            return 0.0;
        }

        let mut total_ms = 0.0;
        let mut total_len = 0usize;
        for span in self.spans(word, chorded) {
            let (Some(start), Some(end)) = (self.char_time[span.start], self.char_time[span.end])
            else {
                continue;
            };
            let ms = millis_between(start, end);
            if ms <= 0.0 {
                continue;
            }
            total_ms += ms;
            total_len += span.len();
        }

        if total_ms <= 0.0 {
            return 0.0;
        }
        finite_or_zero(total_len as f64 / CHARS_PER_WORD / (total_ms / 60_000.0))
    }

    /// Spans of `word` that are fully typed.
    pub fn spans(&self, word: &str, chorded: bool) -> Vec<WordSpan> {
        let last = self.last_set_index;
        self.occurrences
            .iter()
            .filter(|occ| self.words[occ.word_idx] == word)
            .filter_map(|occ| {
                if chorded {
                    self.chord_span(*occ)
                } else {
                    Some(self.plain_span(*occ))
                }
            })
            .filter(|span| span.end <= last && span.end < self.char_time.len())
            .collect()
    }

    fn plain_span(&self, occ: Occurrence) -> WordSpan {
        let word = &self.words[occ.word_idx];
        let len = word.chars().count();
        let delim = self.delimiter;

        let mut start = occ.start;
        if start > 0 && self.text[start - 1] == delim && !word.starts_with(delim) {
            start -= 1;
        }

        let mut end = occ.start + len - 1;
        let next_starts_with_delim = self
            .words
            .get(occ.word_idx + 1)
            .is_some_and(|next| next.starts_with(delim));
        if end + 1 < self.text.len()
            && end + 1 <= self.last_set_index
            && self.text[end + 1] == delim
            && !next_starts_with_delim
        {
            end += 1;
        }

        WordSpan { start, end }
    }

    // A chord fires as one unit: time it from the delimiter before the word
    // to the word's last character.
    fn chord_span(&self, occ: Occurrence) -> Option<WordSpan> {
        if occ.start == 0 {
            return None;
        }
        let len = self.words[occ.word_idx].chars().count();
        Some(WordSpan {
            start: occ.start - 1,
            end: occ.start + len - 1,
        })
    }
}

fn locate_occurrences(text: &[char], words: &[String]) -> Vec<Occurrence> {
    let mut found = Vec::new();
    let mut cursor = 0;
    for (word_idx, word) in words.iter().enumerate() {
        let needle: Vec<char> = word.chars().collect();
        if needle.is_empty() {
            continue;
        }
        if let Some(pos) = find_from(text, &needle, cursor) {
            found.push(Occurrence {
                word_idx,
                start: pos,
            });
            cursor = pos + needle.len();
        }
    }
    found
}

fn find_from(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}
