//! The emitter single-quotes strings that open with a brace and writes UTF-8
//! as-is; endpoint files want placeholders double-quoted and ASCII-only text.

use std::fmt::Write as _;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::collection::TOKEN_PLACEHOLDER;
use crate::extract::BASE_URL_PLACEHOLDER;

/// A `key: value` line of block YAML, optionally opening a sequence item.
static MAPPING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix> *(?:- )?[A-Za-z]+: )(?P<value>.+)$").expect("valid regex")
});

/// Header of a literal block scalar: `|`, optional indentation digit, optional chomping.
static LITERAL_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\|(?P<indent>[1-9])?(?P<chomp>[-+])?$").expect("valid regex")
});

/// Content indentation the emitter uses for a block scalar below its key.
const BLOCK_INDENT: usize = 2;

pub fn to_yaml<T: Serialize>(value: &T) -> Result<String> {
    let yaml = serde_yaml::to_string(value).context("failed to serialize endpoint file")?;
    Ok(normalize_quotes(&yaml))
}

/// Pretty JSON with 2-space indentation and non-ASCII escaped as `\uXXXX`.
pub fn pretty_json(value: &Value) -> serde_json::Result<String> {
    let json = serde_json::to_string_pretty(value)?;
    Ok(escape_non_ascii_json(&json))
}

// serde_json only emits non-ASCII inside string literals, so escaping every
// such char in the output keeps the document valid.
fn escape_non_ascii_json(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for ch in json.chars() {
        if ch.is_ascii() {
            out.push(ch);
            continue;
        }
        let mut units = [0u16; 2];
        for unit in ch.encode_utf16(&mut units) {
            let _ = write!(out, "\\u{unit:04x}");
        }
    }
    out
}

/// Rewrites mapping values into double-quoted form when they are
/// single-quoted and carry a placeholder token, or contain non-ASCII text.
///
/// Literal block scalars are consumed whole: their content is never read as
/// mapping lines, and a block holding non-ASCII text becomes one
/// double-quoted scalar.
pub fn normalize_quotes(yaml: &str) -> String {
    let lines: Vec<&str> = yaml.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());

    let mut pos = 0;
    while let Some(&line) = lines.get(pos) {
        pos += 1;
        let Some(caps) = MAPPING_LINE.captures(line) else {
            out.push(line.to_string());
            continue;
        };
        let prefix = &caps["prefix"];
        let value = &caps["value"];

        let Some(header) = LITERAL_HEADER.captures(value) else {
            out.push(normalize_scalar(line, prefix, value));
            continue;
        };

        let indent = key_column(prefix)
            + header
                .name("indent")
                .and_then(|digit| digit.as_str().parse().ok())
                .unwrap_or(BLOCK_INDENT);
        let margin = " ".repeat(indent);
        let start = pos;
        while let Some(next) = lines.get(pos) {
            if !next.trim().is_empty() && !next.starts_with(&margin) {
                break;
            }
            pos += 1;
        }
        let block = lines.get(start..pos).unwrap_or_default();

        let chomp = header.name("chomp").map(|chomp| chomp.as_str());
        let content = literal_content(block, indent, chomp);
        if content.is_ascii() {
            out.push(line.to_string());
            out.extend(block.iter().map(|line| line.to_string()));
        } else {
            out.push(format!("{prefix}{}", double_quoted(&content)));
        }
    }

    let mut text = out.join("\n");
    if yaml.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn normalize_scalar(line: &str, prefix: &str, value: &str) -> String {
    if value.starts_with('"') {
        if value.is_ascii() {
            return line.to_string();
        }
        let mut out = prefix.to_string();
        for ch in value.chars() {
            push_escaped_char(&mut out, ch);
        }
        return out;
    }

    let (content, single_quoted) = match single_quoted_content(value) {
        Some(content) => (content, true),
        None if is_plain(value) => (value.to_string(), false),
        None => return line.to_string(),
    };

    if (single_quoted && has_placeholder(&content)) || !content.is_ascii() {
        format!("{prefix}{}", double_quoted(&content))
    } else {
        line.to_string()
    }
}

/// Column of the key in a mapping line prefix such as `  - name: `.
fn key_column(prefix: &str) -> usize {
    prefix.len() - prefix.trim_start_matches([' ', '-']).len()
}

fn literal_content(block: &[&str], indent: usize, chomp: Option<&str>) -> String {
    let mut lines: Vec<&str> = block
        .iter()
        .map(|line| line.get(indent..).unwrap_or_default())
        .collect();
    if chomp != Some("+") {
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
    }

    let mut content = lines.join("\n");
    if chomp != Some("-") && !lines.is_empty() {
        content.push('\n');
    }
    content
}

fn single_quoted_content(value: &str) -> Option<String> {
    let inner = value.strip_prefix('\'')?.strip_suffix('\'')?;
    Some(inner.replace("''", "'"))
}

fn is_plain(value: &str) -> bool {
    !value.starts_with(['\'', '"', '|', '>', '{', '[', '&', '*', '!'])
}

fn has_placeholder(text: &str) -> bool {
    text.contains(BASE_URL_PLACEHOLDER) || text.contains(TOKEN_PLACEHOLDER)
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch if ch.is_ascii_control() => {
                let _ = write!(out, "\\x{:02X}", u32::from(ch));
            }
            ch => push_escaped_char(&mut out, ch),
        }
    }
    out.push('"');
    out
}

/// Pushes `ch`, escaping it when it is outside ASCII.
fn push_escaped_char(out: &mut String, ch: char) {
    let code = u32::from(ch);
    let _ = if ch.is_ascii() {
        out.write_char(ch)
    } else if code <= 0xFF {
        write!(out, "\\x{code:02X}")
    } else if code <= 0xFFFF {
        write!(out, "\\u{code:04X}")
    } else {
        write!(out, "\\U{code:08X}")
    };
}
