//! Short definitions for compact display.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Non-ASCII bracket pairs never nest in practice; ASCII parentheses are
    // handled by `remove_parentheses`.
    static ref CJK_BRACKETS: Regex =
        Regex::new(r"（[^）]+）|〈[^〉]+〉|\[[^\]]+\]|［[^］]+］|【[^】]+】|﹝[^﹞]+﹞|「[^」]+」").unwrap();
    static ref SEMICOLONS: Regex = Regex::new(r"[;；]").unwrap();
}

/// Trim, then drop one trailing `.` or `。`.
pub fn remove_full_stop(text: &str) -> &str {
    let text = text.trim();
    text.strip_suffix('.')
        .or_else(|| text.strip_suffix('。'))
        .unwrap_or(text)
}

/// Remove every balanced `(...)` span, nested ones included.
///
/// An unmatched `(` or `)` is kept as ordinary text.
pub fn remove_parentheses(text: &str) -> String {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    for (i, ch) in text.char_indices() {
        match ch {
            '(' => open.push(i),
            ')' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i + 1));
                }
            }
            _ => {}
        }
    }
    spans.sort_unstable();

    let mut result = String::with_capacity(text.len());
    let mut cursor = 0;
    for (start, end) in spans {
        // Inner spans are already covered by their enclosing one.
        if start < cursor {
            continue;
        }
        result.push_str(&text[cursor..start]);
        cursor = end;
    }
    result.push_str(&text[cursor..]);
    result.replace("  ", " ")
}

fn shortest<'a>(parts: impl Iterator<Item = &'a str>) -> &'a str {
    // First of equally short fragments wins.
    parts
        .fold(None, |best: Option<&str>, part| match best {
            Some(b) if b.chars().count() <= part.chars().count() => Some(b),
            _ => Some(part),
        })
        .unwrap_or("")
}

/// Derive the short definition shown by default.
///
/// An empty return value means the gloss has no displayable core and the
/// sense should be dropped.
pub fn short_def(gloss: &str, gloss_lang: &str) -> String {
    let mut text = remove_full_stop(gloss).to_string();
    if text.contains('(') {
        text = remove_parentheses(&text);
    }
    text = CJK_BRACKETS.replace_all(&text, "").into_owned();

    let mut short = shortest(SEMICOLONS.split(&text));
    short = shortest(short.split('/'));
    if gloss_lang == "zh" {
        short = shortest(short.split('、'));
    }
    if gloss_lang == "es" {
        if let Some((_, rest)) = short.split_once('|') {
            short = rest;
        }
    }
    remove_full_stop(short).trim().to_string()
}
