use std::sync::LazyLock;

use regex::Regex;

use super::{fence_for, ParseError};
use crate::contract::SourceFile;

static BLOCK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(resource|data|provider|variable|output|module)\s+"([\w.-]+)"(?:\s+"([\w.-]+)")?\s*\{"#)
        .expect("valid regex literal")
});

/// One labelled top-level block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub kind: &'a str,
    pub name: &'a str,
    pub label: Option<&'a str>,
    /// Text between the braces, untouched.
    pub body: &'a str,
}

pub fn parse(file: &SourceFile, content: &str) -> Result<String, ParseError> {
    let blocks = blocks(content)?;
    let mut md = format!("# Terraform Summary\n\n**File:** `{}`\n\n", file.path);

    if blocks.is_empty() {
        md.push_str("> No recognized blocks found.\n");
        return Ok(md);
    }

    for block in blocks {
        let title = match block.label {
            Some(label) => format!("{} - {}", block.name, label),
            None => block.name.to_string(),
        };
        md.push_str(&format!("## {}: `{}`\n", capitalise(block.kind), title));
        let body = trim_blank_lines(block.body);
        let fence = fence_for(body);
        md.push_str(&format!("{fence}hcl\n{body}\n{fence}\n\n"));
    }
    Ok(md)
}

/// Extract top-level blocks in source order. Nested blocks stay inside their
/// parent's body.
pub fn blocks(content: &str) -> Result<Vec<Block<'_>>, ParseError> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(caps) = BLOCK_HEADER.captures_at(content, cursor) {
        let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        let open = whole.end();
        let close = matching_brace(content, open).ok_or_else(|| {
            ParseError::Structure(format!(
                "unterminated {} block \"{}\"",
                kind.as_str(),
                name.as_str()
            ))
        })?;
        found.push(Block {
            kind: kind.as_str(),
            name: name.as_str(),
            label: caps.get(3).map(|m| m.as_str()),
            body: &content[open..close],
        });
        cursor = close + 1;
    }
    Ok(found)
}

/// Byte offset of the `}` closing the block whose body starts at `start`.
/// String literals and comments are skipped.
fn matching_brace(content: &str, start: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    let mut depth = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'#' => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_line(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// Drop leading blank lines and trailing whitespace, keep indentation.
fn trim_blank_lines(body: &str) -> &str {
    let mut start = 0;
    for line in body.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        start += line.len();
    }
    body[start..].trim_end()
}

fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
