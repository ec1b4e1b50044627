//! Writing-system detection by Unicode block.
//!
//! Used to spot translations that leaked source-language (Hangul) text and
//! translations that never reached the target script at all.

use serde::Serialize;

/// Script families the site's languages are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Hangul,
    Thai,
    Cyrillic,
    /// CJK Unified Ideographs plus Japanese kana
    Cjk,
    Burmese,
    Devanagari,
    Latin,
    Other,
}

impl Script {
    /// Classify a single character.
    ///
    /// Returns `None` for characters that carry no script information
    /// (digits, punctuation, whitespace, symbols).
    pub fn of(c: char) -> Option<Script> {
        let cp = c as u32;
        match cp {
            0x1100..=0x11FF | 0x3130..=0x318F | 0xA960..=0xA97F | 0xAC00..=0xD7AF
            | 0xD7B0..=0xD7FF => Some(Script::Hangul),
            0x0E00..=0x0E7F => Some(Script::Thai),
            0x0400..=0x052F => Some(Script::Cyrillic),
            0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF => {
                Some(Script::Cjk)
            }
            0x1000..=0x109F | 0xAA60..=0xAA7F => Some(Script::Burmese),
            0x0900..=0x097F => Some(Script::Devanagari),
            0x0041..=0x005A
            | 0x0061..=0x007A
            | 0x00C0..=0x024F
            | 0x02BB..=0x02BC
            | 0x1E00..=0x1EFF => Some(Script::Latin),
            _ if c.is_alphabetic() => Some(Script::Other),
            _ => None,
        }
    }
}

/// True if any character of `text` belongs to `script`.
pub fn contains_script(text: &str, script: Script) -> bool {
    text.chars().any(|c| Script::of(c) == Some(script))
}

/// True if `text` contains any Hangul syllable or jamo.
pub fn contains_hangul(text: &str) -> bool {
    contains_script(text, Script::Hangul)
}
