//! Text cleanup after selection.
//!
//! Every step is a plain string transform that cannot fail; the whole chain
//! is repeated until the text stops changing so running it twice is a no-op.

mod tables;

pub use tables::CorrectionTables;

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const MAX_PASSES: usize = 8;

/// Punctuation that survives the rare-symbol filter.
const PERMITTED_PUNCTUATION: &str = ".,;:!?()'\"-/%&@#+$";
const SENTENCE_PUNCTUATION: &str = ".,;:!?";
const CLOSING: &str = ")\"'";
const PLACEHOLDER_CHARS: &str = "-_=.…";
const ONE_LETTER_WORDS: [&str; 3] = ["a", "A", "I"];

/// Lines with less than this share of letters, digits and spaces are noise.
const MIN_TEXT_RATIO: f64 = 0.3;

static HEADING_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static PHRASE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static BLANK_RUN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn heading_pattern() -> Option<&'static Regex> {
    HEADING_REGEX
        .get_or_init(|| Regex::new(r"(?i)\b(certificate|award|recognition|achievement)\b").ok())
        .as_ref()
}

fn phrase_pattern() -> Option<&'static Regex> {
    PHRASE_REGEX
        .get_or_init(|| Regex::new(r"(?i)\b(?:presented|awarded|given|granted)\s+to\b").ok())
        .as_ref()
}

fn blank_run_pattern() -> Option<&'static Regex> {
    BLANK_RUN_REGEX.get_or_init(|| Regex::new(r"\n{3,}").ok()).as_ref()
}

/// Normalize with the built-in correction tables.
pub fn normalize(text: &str) -> String {
    normalize_with(text, CorrectionTables::builtin())
}

pub fn normalize_with(text: &str, tables: &CorrectionTables) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_PASSES {
        let next = normalize_once(&current, tables);
        if next == current {
            break;
        }
        current = next;
    }
    log::debug!(
        "[NORMALIZE] {} -> {} chars",
        text.chars().count(),
        current.chars().count()
    );
    current
}

fn normalize_once(text: &str, tables: &CorrectionTables) -> String {
    let substituted = substitute_glyphs(text, &tables.glyphs);
    substituted
        .lines()
        .filter(|line| keep_line(line))
        .map(strip_rare_symbols)
        .map(|line| collapse_whitespace(&line))
        .filter(|line| !line.is_empty())
        .map(|line| drop_stray_letters(&line))
        .map(|line| split_case_runs(&line))
        .map(|line| fix_digit_confusions(&line))
        .map(|line| correct_words(&line, &tables.words))
        .map(|line| space_after_punctuation(&line))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// True when nothing but whitespace and filler punctuation remains.
pub fn is_placeholder_only(text: &str) -> bool {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .all(|c| PLACEHOLDER_CHARS.contains(c))
}

fn substitute_glyphs(text: &str, glyphs: &HashMap<char, String>) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match glyphs.get(&c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

fn keep_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || is_placeholder_only(trimmed) {
        return false;
    }
    let total = trimmed.chars().count();
    let texty = trimmed
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    texty as f64 / total as f64 >= MIN_TEXT_RATIO
}

fn strip_rare_symbols(line: &str) -> String {
    line.chars()
        .filter(|&c| {
            c.is_alphanumeric() || c == '_' || c.is_whitespace() || PERMITTED_PUNCTUATION.contains(c)
        })
        .collect()
}

fn collapse_whitespace(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_stray_letter(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => c.is_ascii_alphabetic() && !ONE_LETTER_WORDS.contains(&token),
        _ => false,
    }
}

fn drop_stray_letters(line: &str) -> String {
    let tokens: Vec<&str> = line.split(' ').collect();
    if tokens.len() < 2 {
        return line.to_string();
    }
    tokens
        .into_iter()
        .filter(|t| !is_stray_letter(t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// "wordWord" -> "word Word".
fn split_case_runs(line: &str) -> String {
    let mut out = String::with_capacity(line.len() + 4);
    let mut prev: Option<char> = None;
    for c in line.chars() {
        if prev.is_some_and(|p| p.is_ascii_lowercase()) && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

/// A 0 or 1 wedged between two letters is a misread o or l.
fn fix_digit_confusions(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            let between_letters = i > 0
                && chars.get(i - 1).is_some_and(char::is_ascii_alphabetic)
                && chars.get(i + 1).is_some_and(char::is_ascii_alphabetic);
            match c {
                '0' if between_letters => 'o',
                '1' if between_letters => 'l',
                _ => c,
            }
        })
        .collect()
}

fn correct_token(token: &str, table: &HashMap<String, String>) -> String {
    let edge = |c: char| !c.is_alphanumeric();
    let core = token.trim_matches(edge);
    let eligible = core.chars().count() > 2
        && core.chars().all(char::is_alphanumeric)
        && core.chars().any(char::is_alphabetic);
    if !eligible {
        return token.to_string();
    }
    match CorrectionTables::correct(table, core) {
        Some(fixed) => {
            let start = token.len() - token.trim_start_matches(edge).len();
            let end = start + core.len();
            format!("{}{}{}", &token[..start], fixed, &token[end..])
        }
        None => token.to_string(),
    }
}

fn correct_words(line: &str, table: &HashMap<String, String>) -> String {
    line.split(' ')
        .map(|token| correct_token(token, table))
        .collect::<Vec<_>>()
        .join(" ")
}

/// "end.Next" -> "end. Next", leaving "3.14", "10:30" and "?!" alone.
fn space_after_punctuation(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        out.push(c);
        if !SENTENCE_PUNCTUATION.contains(c) {
            continue;
        }
        let Some(&next) = chars.get(i + 1) else {
            continue;
        };
        let numeric = i > 0 && chars[i - 1].is_ascii_digit() && next.is_ascii_digit();
        if next.is_whitespace()
            || SENTENCE_PUNCTUATION.contains(next)
            || CLOSING.contains(next)
            || numeric
        {
            continue;
        }
        out.push(' ');
    }
    out
}

/// Certificate layout with the built-in tables.
pub fn normalize_certificate(text: &str) -> String {
    normalize_certificate_with(text, CorrectionTables::builtin())
}

/// Certificate vocabulary fixes, then headings and presentation phrases
/// on lines of their own.
pub fn normalize_certificate_with(text: &str, tables: &CorrectionTables) -> String {
    let mut out = text
        .lines()
        .map(|line| correct_words(line, &tables.certificate))
        .collect::<Vec<_>>()
        .join("\n");

    if let Some(re) = heading_pattern() {
        out = re
            .replace_all(&out, |caps: &regex::Captures| format!("\n{}\n", caps[1].to_uppercase()))
            .into_owned();
    }
    if let Some(re) = phrase_pattern() {
        out = re.replace_all(&out, "\n$0\n").into_owned();
    }

    out = out.lines().map(str::trim).collect::<Vec<_>>().join("\n");
    if let Some(re) = blank_run_pattern() {
        out = re.replace_all(&out, "\n\n").into_owned();
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_in_empty_out() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\n  "), "");
    }

    #[test]
    fn glyphs_substitute_without_context() {
        let out = normalize("|1[");
        assert!(out.contains('I'));
        assert!(out.contains('('));
        assert!(!out.contains('|'));
        assert!(!out.contains('['));
        assert_eq!(normalize("“quoted” text"), "\"quoted\" text");
        assert_eq!(normalize("café"), "cafe");
    }

    #[test]
    fn placeholder_and_noise_lines_dropped() {
        assert_eq!(normalize("Title\n=====\n\nBody text\n-----"), "Title\nBody text");
        assert_eq!(normalize("Real line\n~^~*~^~*~\n"), "Real line");
    }

    #[test]
    fn rare_symbols_removed_and_whitespace_collapsed() {
        assert_eq!(normalize("  hello   ~world^  "), "hello world");
        assert_eq!(normalize("50% off 12/05/2023"), "50% off 12/05/2023");
    }

    #[test]
    fn stray_letters_removed() {
        assert_eq!(normalize("this b is a test I think"), "this is a test I think");
        assert_eq!(normalize("x"), "x");
    }

    #[test]
    fn case_runs_split() {
        assert_eq!(normalize("helloWorld again"), "hello World again");
    }

    #[test]
    fn digits_between_letters_become_letters() {
        assert_eq!(normalize("he1lo w0rld 2024"), "hello world 2024");
    }

    #[test]
    fn dictionary_preserves_case() {
        assert_eq!(normalize("Tbe cat sat witb tbe dog."), "The cat sat with the dog.");
        assert_eq!(normalize("TBE END"), "THE END");
        assert_eq!(normalize("(tbe)"), "(the)");
    }

    #[test]
    fn space_after_sentence_punctuation() {
        assert_eq!(normalize("One.Two,three"), "One. Two, three");
        assert_eq!(normalize("Pi is 3.14 at 10:30!?"), "Pi is 3.14 at 10:30!?");
    }

    #[test]
    fn idempotent_over_corpus() {
        let corpus = [
            "Tbe quick brown fox\njumps over tbe lazy dog.",
            "|1[ weird ]} input",
            "aBc dEf gHi",
            "h0Me is wbere tbe heart is.Really",
            "-----\n\n====\n",
            "CERTIFICATE OF ACHIEVEMENT\npresented to Jane Doe\n05/12/2023",
            "e.g.this,that;other:thing",
            "File  Edit  View\nSave | Cancel",
        ];
        for text in corpus {
            let once = normalize(text);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", text);
        }
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder_only(""));
        assert!(is_placeholder_only(" --- ... \n ___ "));
        assert!(!is_placeholder_only("-- a --"));
    }

    #[test]
    fn certificate_layout() {
        let out = normalize_certificate("Certlficate of completion presented to Jane Doe");
        assert_eq!(out, "CERTIFICATE\nof completion\npresented to\nJane Doe");
    }

    #[test]
    fn certificate_collapses_blank_runs() {
        let out = normalize_certificate("Award\n\n\n\nfor service");
        assert_eq!(out, "AWARD\n\nfor service");
        assert!(!normalize_certificate("AWARDED to me").contains("AWARD\n"));
    }
}
