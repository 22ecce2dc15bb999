//! Caption processing
//!
//! Splits a caption into its prose body and the trailing block of hashtags,
//! applies configured substring filters, and derives a caption that fits a
//! platform's length limit while keeping as many trailing hashtags as fit.
//!
//! A hashtag block starts at the first run of consecutive `#`-words (two by
//! default). Isolated hashtags inside the prose stay part of the body.
//!
//! # Examples
//!
//! ```
//! use libimgcast::caption::CaptionProcessor;
//!
//! let captions = CaptionProcessor::default();
//! let caption = "Game night. #boardgames #meeples #dice";
//!
//! assert_eq!(captions.extract_caption_body(caption), "Game night.");
//! assert_eq!(captions.extract_hashtags(caption), vec!["#boardgames", "#meeples", "#dice"]);
//! assert_eq!(captions.shorten_caption(caption, 30), "Game night. #boardgames #dice");
//! ```

use tracing::debug;

use crate::config::{CaptionConfig, CaptionFilter};

/// Number of consecutive hashtag words that mark the start of the hashtag block
pub const DEFAULT_HASHTAG_RUN: usize = 2;

/// Caption transformations, parameterised by the filter list and hashtag run length
#[derive(Debug, Clone)]
pub struct CaptionProcessor {
    filters: Vec<CaptionFilter>,
    hashtag_run: usize,
}

impl Default for CaptionProcessor {
    fn default() -> Self {
        Self::from_config(&CaptionConfig::default())
    }
}

impl CaptionProcessor {
    pub fn new(filters: Vec<CaptionFilter>, hashtag_run: usize) -> Self {
        Self {
            filters,
            hashtag_run: hashtag_run.max(1),
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::new(config.filters.clone(), config.hashtag_run)
    }

    /// Find the byte offset where the trailing hashtag block begins
    ///
    /// Words are separated by single spaces. The offset returned is the start of
    /// the first word of the first run of consecutive hashtag words, whatever the
    /// configured run length. When no such run exists the offset points one past
    /// the end of the text (the text length plus one), meaning the whole text is
    /// body.
    ///
    /// Returns `None` for empty input.
    pub fn find_hashtag_start(&self, text: &str) -> Option<usize> {
        if text.is_empty() {
            return None;
        }

        let mut offset = 0;
        let mut run = 0;
        let mut run_start = 0;

        for word in text.split(' ') {
            if word.starts_with('#') {
                if run == 0 {
                    run_start = offset;
                }
                run += 1;
                if run == self.hashtag_run {
                    return Some(run_start);
                }
            } else {
                run = 0;
            }
            offset += word.len() + 1;
        }

        Some(offset)
    }

    /// The caption text before the hashtag block, trimmed
    pub fn extract_caption_body(&self, text: &str) -> String {
        match self.find_hashtag_start(text) {
            Some(start) => text[..start.min(text.len())].trim().to_string(),
            None => String::new(),
        }
    }

    /// Hashtags from the trailing hashtag block, in order
    ///
    /// A hashtag runs from `#` up to the next whitespace, `#`, `.` or `;`.
    pub fn extract_hashtags(&self, text: &str) -> Vec<String> {
        let Some(start) = self.find_hashtag_start(text) else {
            return Vec::new();
        };
        let block = text.get(start..).unwrap_or("").trim();
        scan_tokens(block, '#', |c| c.is_whitespace() || c == '.' || c == ';')
    }

    /// All `@` mentions in the text, in order
    pub fn extract_mentions(&self, text: &str) -> Vec<String> {
        scan_tokens(text, '@', char::is_whitespace)
    }

    /// Remove the first occurrence of each element, then collapse whitespace runs
    pub fn remove_text_elements<S: AsRef<str>>(&self, text: &str, elements: &[S]) -> String {
        if text.is_empty() {
            return String::new();
        }

        let stripped = elements
            .iter()
            .fold(text.to_string(), |acc, element| acc.replacen(element.as_ref(), "", 1));

        collapse_whitespace(&stripped)
    }

    /// Apply the configured substring filters
    ///
    /// Each filter replaces only the first occurrence of its pattern.
    pub fn filter_caption(&self, text: &str) -> String {
        self.filters
            .iter()
            .fold(text.to_string(), |acc, filter| acc.replacen(&filter.from, &filter.to, 1))
    }

    /// Derive a caption of at most `max_length` characters
    ///
    /// Captions that already fit are returned untouched. Otherwise the filtered
    /// body is kept and trailing hashtags are packed back in greedily, skipping
    /// any that would overflow. A body that alone exceeds the limit is cut at its
    /// last sentence boundary inside the limit, or hard-truncated with `...` when
    /// there is none.
    pub fn shorten_caption(&self, text: &str, max_length: usize) -> String {
        if text.is_empty() || char_len(text) <= max_length {
            return text.to_string();
        }

        let body = self.filter_caption(&self.extract_caption_body(text));

        if char_len(&body) > max_length {
            let window = take_chars(&body, max_length.saturating_sub(1));

            if let Some(dot) = window.rfind('.').filter(|&dot| dot > 0) {
                let shortened = window[..=dot].to_string();
                debug!(
                    length = char_len(&shortened),
                    "shortened caption at last sentence boundary"
                );
                return shortened;
            }

            let shortened = if max_length < 3 {
                take_chars(&body, max_length).to_string()
            } else {
                format!("{}...", take_chars(window, max_length - 3))
            };
            debug!(length = char_len(&shortened), "force shortened caption");
            return shortened;
        }

        let mut caption = body;
        let mut length = char_len(&caption);
        for hashtag in self.extract_hashtags(text) {
            let extended = length + 1 + char_len(&hashtag);
            if extended <= max_length {
                caption.push(' ');
                caption.push_str(&hashtag);
                length = extended;
            }
        }

        debug!(length, "added hashtags back to caption");
        caption
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Prefix of at most `count` characters
fn take_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Collect every maximal `sigil`-prefixed token
///
/// A token ends before a terminator character or at the next sigil, which
/// starts a new token.
fn scan_tokens(text: &str, sigil: char, is_terminator: impl Fn(char) -> bool) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in text.char_indices() {
        if c == sigil {
            if let Some(s) = start {
                tokens.push(text[s..i].to_string());
            }
            start = Some(i);
        } else if is_terminator(c) {
            if let Some(s) = start.take() {
                tokens.push(text[s..i].to_string());
            }
        }
    }

    if let Some(s) = start {
        tokens.push(text[s..].to_string());
    }

    tokens
}

fn collapse_whitespace(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut in_whitespace = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                collapsed.push(' ');
            }
            in_whitespace = true;
        } else {
            collapsed.push(c);
            in_whitespace = false;
        }
    }

    collapsed
}
