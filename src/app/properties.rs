use std::fs;
use std::path::Path;

use tracing::{info, warn};

/// Reads a `.properties` file. A missing or unreadable file yields no entries.
pub fn load_properties(path: &Path) -> Vec<(String, String)> {
    let properties = match fs::read_to_string(path) {
        Ok(raw) => parse_properties(&raw),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to load properties file");
            Vec::new()
        }
    };
    info!(path = %path.display(), count = properties.len(), "loaded properties");
    properties
}

/// Parses `java.util.Properties` text: `key=value`, `key:value` and `key value` lines, `#`
/// and `!` comments, and backslash escapes in keys and values. A line ending in an odd number
/// of backslashes continues on the next line. Later keys replace earlier ones.
pub fn parse_properties(raw: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut logical = String::new();
    let mut continuing = false;

    for line in raw.lines() {
        let line = line.trim_start_matches(is_blank);
        if !continuing && (line.is_empty() || line.starts_with('#') || line.starts_with('!')) {
            continue;
        }
        let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing % 2 == 1 {
            logical.push_str(&line[..line.len() - 1]);
            continuing = true;
            continue;
        }
        logical.push_str(line);
        continuing = false;
        upsert(&mut entries, &logical);
        logical.clear();
    }
    if continuing {
        upsert(&mut entries, &logical);
    }
    entries
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0c')
}

fn upsert(entries: &mut Vec<(String, String)>, line: &str) {
    let Some((key, value)) = split_entry(line) else {
        return;
    };
    match entries.iter_mut().find(|(existing, _)| *existing == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Splits at the first unescaped `=`, `:` or blank. Trailing blanks belong to the value.
fn split_entry(line: &str) -> Option<(String, String)> {
    if line.is_empty() {
        return None;
    }
    let mut separator = None;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                separator = Some((index, false));
                break;
            }
            c if is_blank(c) => {
                separator = Some((index, true));
                break;
            }
            _ => {}
        }
    }

    let (key, value) = match separator {
        Some((index, blank)) => {
            let mut rest = line[index + 1..].trim_start_matches(is_blank);
            if blank {
                if let Some(after) = rest.strip_prefix(|c: char| c == '=' || c == ':') {
                    rest = after.trim_start_matches(is_blank);
                }
            }
            (&line[..index], rest)
        }
        None => (line, ""),
    };
    Some((unescape(key), unescape(value)))
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u16::from_str_radix(&hex, 16) {
                    Ok(unit) if hex.len() == 4 => push_utf16_unit(&mut out, unit, &mut chars),
                    _ => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Decodes one `\uXXXX` unit, pairing a high surrogate with a following `\uXXXX` low one.
/// Unpaired surrogates become U+FFFD.
fn push_utf16_unit(
    out: &mut String,
    unit: u16,
    chars: &mut std::str::Chars<'_>,
) {
    if (0xD800..0xDC00).contains(&unit) {
        let lookahead: String = chars.clone().take(6).collect();
        let low = lookahead
            .strip_prefix("\\u")
            .filter(|hex| hex.len() == 4)
            .and_then(|hex| u16::from_str_radix(hex, 16).ok())
            .filter(|low| (0xDC00..0xE000).contains(low));
        if let Some(low) = low {
            for _ in 0..6 {
                chars.next();
            }
            out.extend(char::decode_utf16([unit, low]).map(|r| r.unwrap_or('\u{FFFD}')));
            return;
        }
    }
    out.extend(char::decode_utf16([unit]).map(|r| r.unwrap_or('\u{FFFD}')));
}
