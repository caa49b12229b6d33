//! Parser for `.env`-style assignment files.
//!
//! Accepted syntax, one assignment per line:
//!
//! ```text
//! # comment
//! KEY=value            # trailing comment stripped
//! export OTHER='literal $value'
//! QUOTED="line one\nline two"
//! ```
//!
//! Later assignments override earlier ones. Values are taken literally; no
//! `$VAR` interpolation is performed.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail};

/// Variables loaded from an env file, applied to every spawned child.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse env file contents. Errors name the offending 1-based line.
pub fn parse_env(contents: &str) -> Result<EnvOverrides> {
    let mut overrides = EnvOverrides::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) =
            parse_assignment(line).map_err(|err| anyhow!("line {line_no}: {err}"))?;
        overrides.insert(key, value);
    }
    Ok(overrides)
}

fn parse_assignment(line: &str) -> Result<(String, String)> {
    let line = line
        .strip_prefix("export")
        .filter(|rest| rest.starts_with(char::is_whitespace))
        .map(str::trim_start)
        .unwrap_or(line);

    let (key, value) = line
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE"))?;
    let key = key.trim_end();
    if !is_valid_key(key) {
        bail!("invalid variable name '{key}'");
    }
    let value = parse_value(value.trim_start())?;
    Ok((key.to_string(), value))
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

fn parse_value(raw: &str) -> Result<String> {
    if let Some(rest) = raw.strip_prefix('\'') {
        let end = rest
            .find('\'')
            .ok_or_else(|| anyhow!("unterminated single quote"))?;
        ensure_only_comment(&rest[end + 1..])?;
        return Ok(rest[..end].to_string());
    }
    if let Some(rest) = raw.strip_prefix('"') {
        return parse_double_quoted(rest);
    }
    Ok(strip_inline_comment(raw).trim_end().to_string())
}

fn parse_double_quoted(rest: &str) -> Result<String> {
    let mut value = String::new();
    let mut chars = rest.char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => {
                ensure_only_comment(&rest[idx + 1..])?;
                return Ok(value);
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, other @ ('"' | '\\' | '$'))) => value.push(other),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => break,
            },
            _ => value.push(c),
        }
    }
    bail!("unterminated double quote")
}

/// Unquoted values end at the first ` #`.
fn strip_inline_comment(raw: &str) -> &str {
    let bytes = raw.as_bytes();
    for (idx, b) in bytes.iter().enumerate() {
        if *b == b'#' && idx > 0 && bytes[idx - 1].is_ascii_whitespace() {
            return &raw[..idx];
        }
    }
    raw
}

fn ensure_only_comment(tail: &str) -> Result<()> {
    let tail = tail.trim_start();
    if tail.is_empty() || tail.starts_with('#') {
        Ok(())
    } else {
        Err(anyhow!("unexpected text after closing quote: '{tail}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_export_and_comment_lines() {
        let env = parse_env(
            "# settings\n\nSMTP_HOST=mail.example.org\nexport SMTP_PORT=587\n  LEVEL = debug  \n",
        )
        .expect("parse");
        assert_eq!(env.len(), 3);
        assert_eq!(env.get("SMTP_HOST"), Some("mail.example.org"));
        assert_eq!(env.get("SMTP_PORT"), Some("587"));
        assert_eq!(env.get("LEVEL"), Some("debug"));
    }

    #[test]
    fn strips_inline_comment_only_after_whitespace() {
        let env = parse_env("URL=http://host/#frag\nMODE=dry # default\n").expect("parse");
        assert_eq!(env.get("URL"), Some("http://host/#frag"));
        assert_eq!(env.get("MODE"), Some("dry"));
    }

    #[test]
    fn handles_quoted_values() {
        let env = parse_env(
            "A='keep $HOME # as is'\nB=\"two\\nlines \\\"quoted\\\"\" # note\nC=\"\"\n",
        )
        .expect("parse");
        assert_eq!(env.get("A"), Some("keep $HOME # as is"));
        assert_eq!(env.get("B"), Some("two\nlines \"quoted\""));
        assert_eq!(env.get("C"), Some(""));
    }

    #[test]
    fn later_assignment_wins() {
        let env = parse_env("KEY=first\nKEY=second\n").expect("parse");
        assert_eq!(env.get("KEY"), Some("second"));
    }

    #[test]
    fn empty_value_is_allowed() {
        let env = parse_env("EMPTY=\n").expect("parse");
        assert_eq!(env.get("EMPTY"), Some(""));
    }

    #[test]
    fn exported_prefix_requires_whitespace() {
        let env = parse_env("exported=1\n").expect("parse");
        assert_eq!(env.get("exported"), Some("1"));
    }

    #[test]
    fn rejects_line_without_assignment() {
        let err = parse_env("OK=1\nnot an assignment\n").unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("line 2"), "got: {msg}");
        assert!(msg.contains("KEY=VALUE"), "got: {msg}");
    }

    #[test]
    fn rejects_invalid_key() {
        let err = parse_env("1BAD=x\n").unwrap_err();
        assert!(err.to_string().contains("invalid variable name"));
    }

    #[test]
    fn rejects_unterminated_quotes() {
        assert!(parse_env("A='open\n").is_err());
        assert!(parse_env("B=\"open\n").is_err());
    }

    #[test]
    fn rejects_trailing_text_after_quote() {
        let err = parse_env("A='x' y\n").unwrap_err();
        assert!(err.to_string().contains("after closing quote"));
    }
}
