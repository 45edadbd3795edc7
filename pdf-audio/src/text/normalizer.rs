//! Text normalization for TTS processing.
//!
//! Extracted PDF text arrives as markdown (from MinerU) or as raw page text
//! with layout debris. `normalize` reduces either to plain, speakable text:
//! markup is stripped while its words are kept, inline math is read out,
//! and everything outside a small punctuation set becomes whitespace.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Characters that can cause TTS issues and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "-"),   // Em dash
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{200b}', ""),    // Zero-width space
    ('\u{200c}', ""),    // Zero-width non-joiner
    ('\u{200d}', ""),    // Zero-width joiner
    ('\u{feff}', ""),    // BOM
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2012}', "-"),   // Figure dash
    ('\u{2015}', "-"),   // Horizontal bar
    ('\u{2032}', "'"),   // Prime (feet)
    ('\u{2033}', "\""),  // Double prime (inches)
    ('\u{2039}', "'"),   // Single left-pointing angle quote
    ('\u{203a}', "'"),   // Single right-pointing angle quote
    ('\u{00ab}', "\""),  // Left-pointing double angle quote
    ('\u{00bb}', "\""),  // Right-pointing double angle quote
    ('\u{ff0c}', ","),   // Fullwidth comma
    ('\u{3001}', ","),   // Ideographic comma
    ('\u{3002}', "."),   // Ideographic full stop
    ('\u{ff01}', "!"),   // Fullwidth exclamation mark
    ('\u{ff1f}', "?"),   // Fullwidth question mark
    ('\u{ff1b}', ";"),   // Fullwidth semicolon
    ('\u{ff1a}', ":"),   // Fullwidth colon
    ('\u{ff08}', "("),   // Fullwidth left parenthesis
    ('\u{ff09}', ")"),   // Fullwidth right parenthesis
    ('\u{300c}', "\""),  // Left corner bracket
    ('\u{300d}', "\""),  // Right corner bracket
];

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:```|~~~)[^\n]*$").unwrap());
static DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());
static INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$").unwrap());
static IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap());
static REFERENCE_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]\[[^\]]*\]").unwrap());
static LINK_DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\[[^\]]+\]:[ \t]*\S+.*$").unwrap());
static AUTOLINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[A-Za-z][A-Za-z0-9+.-]*:[^<>\s]*>").unwrap());
static HTML_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[A-Za-z][A-Za-z0-9-]*(?:\s[^<>\n]*)?/?>").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:https?|ftp)://\S+").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());
static HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*#{1,6}[ \t]*").unwrap());
static BLOCK_QUOTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:>[ \t]?)+").unwrap());

static UNSPEAKABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[^\w\s.,!?;:\-()'"]|_"#).unwrap());
static PERIOD_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").unwrap());
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[^\S\n]*(?:-+(?:[^\S\n]+|$))+").unwrap());

static MATH_FRAC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").unwrap());
static MATH_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:mathrm|text|textrm|mathbf|mathit|mathsf|operatorname|rm|bf|it)\s*\{([^{}]*)\}")
        .unwrap()
});
static MATH_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d)\s*\^\s*\{?\s*(st|nd|rd|th)\b\s*\}?").unwrap());
static MATH_SUPERSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\^\s*(?:\{\s*([^{}]*?)\s*\}|(\w))").unwrap());
static MATH_SUBSCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_\s*(?:\{\s*([^{}]*?)\s*\}|(\w))").unwrap());
static MATH_COMMAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\([A-Za-z]+)").unwrap());

/// Normalize raw extracted text into TTS-safe plain text.
///
/// Total over all inputs and idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let text = map_characters(text);
    let text = strip_markup(&text);
    let text = filter_speakable(&text);
    let text = strip_list_markers(&text);
    let text = space_cjk(&text);
    collapse_whitespace(&text)
}

/// Replace typographic characters with plain ASCII equivalents.
fn map_characters(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        match PROBLEMATIC_CHARS.iter().find(|(ch, _)| *ch == c) {
            Some((_, replacement)) => result.push_str(replacement),
            None => result.push(c),
        }
    }

    result
}

/// Remove markdown, HTML and link syntax, keeping the readable words.
fn strip_markup(text: &str) -> String {
    let text = CODE_FENCE.replace_all(text, "");
    let text = DISPLAY_MATH.replace_all(&text, |caps: &Captures| {
        format!(" {} ", math_to_speech(&caps[1]))
    });
    let text = INLINE_MATH.replace_all(&text, |caps: &Captures| {
        format!(" {} ", math_to_speech(&caps[1]))
    });
    let text = IMAGE.replace_all(&text, " ");
    let text = LINK.replace_all(&text, "$1");
    let text = REFERENCE_LINK.replace_all(&text, "$1");
    let text = LINK_DEFINITION.replace_all(&text, "");
    let text = AUTOLINK.replace_all(&text, " ");
    let text = HTML_TAG.replace_all(&text, " ");
    let text = URL.replace_all(&text, " ");
    let text = EMAIL.replace_all(&text, " ");
    let text = HEADER.replace_all(&text, "");
    let text = BLOCK_QUOTE.replace_all(&text, "");
    text.into_owned()
}

/// Read a LaTeX-style math expression out as words.
///
/// `8 ^ { \mathrm { t h } }` becomes `8th`, `x^2` becomes `x squared`,
/// `\frac{1}{2}` becomes `1 over 2`.
pub fn math_to_speech(expr: &str) -> String {
    let s = MATH_FRAC.replace_all(expr, " $1 over $2 ");
    let s = MATH_TEXT.replace_all(&s, |caps: &Captures| {
        caps[1].chars().filter(|c| !c.is_whitespace()).collect::<String>()
    });
    let s = MATH_ORDINAL.replace_all(&s, "$1$2");
    let s = MATH_SUPERSCRIPT.replace_all(&s, |caps: &Captures| {
        let exponent = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        match exponent {
            "2" => " squared ".to_string(),
            "3" => " cubed ".to_string(),
            other => format!(" to the power of {} ", other),
        }
    });
    let s = MATH_SUBSCRIPT.replace_all(&s, |caps: &Captures| {
        let index = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str().trim())
            .unwrap_or_default();
        format!(" sub {} ", index)
    });
    let s = MATH_COMMAND.replace_all(&s, |caps: &Captures| {
        format!(" {} ", spoken_symbol(&caps[1]))
    });

    let mut spoken = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '{' | '}' | '\\' => spoken.push(' '),
            '=' => spoken.push_str(" equals "),
            '+' => spoken.push_str(" plus "),
            '<' => spoken.push_str(" less than "),
            '>' => spoken.push_str(" greater than "),
            _ => spoken.push(c),
        }
    }

    collapse_whitespace(&spoken)
}

/// Spoken form of a LaTeX command name.
fn spoken_symbol(command: &str) -> &str {
    match command {
        "times" | "cdot" => "times",
        "div" => "divided by",
        "pm" => "plus or minus",
        "leq" | "le" => "less than or equal to",
        "geq" | "ge" => "greater than or equal to",
        "neq" | "ne" => "not equal to",
        "approx" => "approximately",
        "infty" => "infinity",
        "sqrt" => "square root of",
        "sum" => "sum of",
        "circ" => "degrees",
        "percent" | "%" => "percent",
        "left" | "right" | "quad" | "qquad" | "displaystyle" => "",
        other => other,
    }
}

/// Replace every character outside the speakable set with a space and
/// collapse runs of periods.
fn filter_speakable(text: &str) -> String {
    let text = UNSPEAKABLE.replace_all(text, " ");
    PERIOD_RUN.replace_all(&text, ".").into_owned()
}

/// Drop list bullets and horizontal rules at the start of each line.
fn strip_list_markers(text: &str) -> String {
    LIST_MARKER.replace_all(text, "").into_owned()
}

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{f900}'..='\u{faff}'
        | '\u{3040}'..='\u{30ff}'
        | '\u{ac00}'..='\u{d7af}')
}

/// Insert a space where CJK text touches Latin letters or digits.
fn space_cjk(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if let Some(p) = prev {
            let boundary = (is_cjk(p) && c.is_ascii_alphanumeric())
                || (p.is_ascii_alphanumeric() && is_cjk(c));
            if boundary {
                result.push(' ');
            }
        }
        result.push(c);
        prev = Some(c);
    }

    result
}

/// Collapse all whitespace runs, newlines included, into single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
