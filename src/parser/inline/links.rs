/// Link and image parsing.
///
/// Bracket matching respects escapes, code spans and nesting; the
/// tokenizer resolves brackets through a [`ScanIndex`] built in one pass
/// over the text. The destination/title micro-grammars are nom parsers.
/// Reference resolution (full, collapsed and shortcut forms) looks labels
/// up in the map collected by the block parser's first pass.
use nom::error::{Error, ErrorKind};
use nom::{Err, IResult};
use std::collections::HashMap;

/// A collected `[label]: destination "title"` definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub url: String,
    pub title: Option<String>,
}

/// Label map: keys normalized with [`normalize_label`]. First definition
/// wins; later duplicates are ignored by the collector.
pub type LinkRefMap = HashMap<String, LinkRef>;

/// Case-folds and whitespace-collapses a reference label.
pub fn normalize_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut in_ws = false;
    for ch in label.trim().chars() {
        if ch.is_whitespace() {
            in_ws = true;
            continue;
        }
        if in_ws {
            out.push(' ');
            in_ws = false;
        }
        for lower in ch.to_lowercase() {
            out.push(lower);
        }
    }
    out
}

/// Precomputed scan structure for one inline text: every backtick run
/// grouped by length, and the matching `]` for every `[` that sits outside
/// a code span. Built in one pass so the tokenizer never rescans the tail
/// of the text per bracket; a pathological run of unmatched `[` stays
/// linear.
#[derive(Debug)]
pub struct ScanIndex {
    brackets: HashMap<usize, usize>,
    backtick_runs: HashMap<usize, Vec<usize>>,
}

impl ScanIndex {
    pub fn build(text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut backtick_runs: HashMap<usize, Vec<usize>> = HashMap::new();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'`' {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                backtick_runs.entry(run).or_default().push(i);
                i += run;
            } else {
                i += 1;
            }
        }

        let mut index = ScanIndex {
            brackets: HashMap::new(),
            backtick_runs,
        };

        // Same walk the per-bracket scan does (escapes skipped, code spans
        // jumped), but once for the whole text with a stack of open
        // positions instead of a depth counter per `[`.
        let mut open_stack: Vec<usize> = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'`' => {
                    let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                    match index.backtick_close(i + run, run) {
                        Some(end) => i = end,
                        None => i += run,
                    }
                }
                b'[' => {
                    open_stack.push(i);
                    i += 1;
                }
                b']' => {
                    if let Some(open) = open_stack.pop() {
                        index.brackets.insert(open, i);
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
        index
    }

    /// Byte index of the `]` matching the `[` at `open`, if any.
    pub fn bracket_close(&self, open: usize) -> Option<usize> {
        self.brackets.get(&open).copied()
    }

    /// Position after the first closing run of exactly `run` backticks at
    /// or beyond `from`. Same contract as [`find_backtick_close`].
    pub fn backtick_close(&self, from: usize, run: usize) -> Option<usize> {
        let runs = self.backtick_runs.get(&run)?;
        let slot = runs.partition_point(|&start| start < from);
        runs.get(slot).map(|&start| start + run)
    }
}

/// Finds the `]` matching the `[` at `open`, skipping escapes, code spans
/// and nested bracket pairs. Returns the byte index of the closing bracket.
pub fn find_closing_bracket(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                match find_backtick_close(text, i + run, run) {
                    Some(end) => i = end,
                    None => i += run,
                }
            }
            b'[' => {
                depth += 1;
                i += 1;
            }
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

/// Position after a closing backtick run of exactly `run` ticks.
pub fn find_backtick_close(text: &str, from: usize, run: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let len = bytes[i..].iter().take_while(|&&b| b == b'`').count();
            if len == run {
                return Some(i + len);
            }
            i += len;
        } else {
            i += 1;
        }
    }
    None
}

/// Link destination: either `<...>` (escapes allowed, no newlines) or a
/// bare run with balanced parentheses and no whitespace or control bytes.
pub fn link_destination(input: &str) -> IResult<&str, String> {
    let bytes = input.as_bytes();
    if bytes.first() == Some(&b'<') {
        let mut dest = String::new();
        let mut i = 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => return Ok((&input[i + 1..], dest)),
                b'<' | b'\n' => break,
                b'\\' if i + 1 < bytes.len() => {
                    let next = bytes[i + 1] as char;
                    if next.is_ascii_punctuation() {
                        dest.push(next);
                        i += 2;
                    } else {
                        dest.push('\\');
                        i += 1;
                    }
                }
                _ => {
                    let ch = input[i..].chars().next().ok_or_else(eof_err(input))?;
                    dest.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
        return Err(Err::Error(Error::new(input, ErrorKind::Tag)));
    }

    let mut dest = String::new();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b.is_ascii_whitespace() || b.is_ascii_control() {
            break;
        }
        match b {
            b'(' => {
                depth += 1;
                dest.push('(');
                i += 1;
            }
            b')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
                dest.push(')');
                i += 1;
            }
            b'\\' if i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_punctuation() => {
                dest.push(bytes[i + 1] as char);
                i += 2;
            }
            _ => {
                let ch = input[i..].chars().next().ok_or_else(eof_err(input))?;
                dest.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    if i == 0 {
        return Err(Err::Error(Error::new(input, ErrorKind::TakeWhile1)));
    }
    if depth != 0 {
        return Err(Err::Error(Error::new(input, ErrorKind::Tag)));
    }
    Ok((&input[i..], dest))
}

fn eof_err<'a>(input: &'a str) -> impl Fn() -> Err<Error<&'a str>> + 'a {
    move || Err::Error(Error::new(input, ErrorKind::Eof))
}

/// Link title delimited by `"`, `'` or parentheses; backslash escapes
/// resolve, newlines are kept.
pub fn link_title(input: &str) -> IResult<&str, String> {
    let open = input
        .chars()
        .next()
        .ok_or_else(|| Err::Error(Error::new(input, ErrorKind::Eof)))?;
    let close = match open {
        '"' => '"',
        '\'' => '\'',
        '(' => ')',
        _ => return Err(Err::Error(Error::new(input, ErrorKind::OneOf))),
    };

    let bytes = input.as_bytes();
    let mut title = String::new();
    let mut i = 1;
    while i < bytes.len() {
        let ch = input[i..].chars().next().ok_or_else(eof_err(input))?;
        if ch == close {
            return Ok((&input[i + 1..], title));
        }
        if open == '(' && ch == '(' {
            // Paren titles may not contain unescaped opening parens.
            return Err(Err::Error(Error::new(input, ErrorKind::Tag)));
        }
        if ch == '\\' {
            if let Some(next) = input[i + 1..].chars().next() {
                if next.is_ascii_punctuation() {
                    title.push(next);
                    i += 1 + next.len_utf8();
                    continue;
                }
            }
        }
        title.push(ch);
        i += ch.len_utf8();
    }
    Err(Err::Error(Error::new(input, ErrorKind::Tag)))
}

/// Parses the `(destination "title")` suffix of an inline link. `pos` sits
/// on the opening parenthesis; returns (url, title, position after `)`).
pub fn parse_inline_suffix(text: &str, pos: usize) -> Option<(String, Option<String>, usize)> {
    if text.as_bytes().get(pos) != Some(&b'(') {
        return None;
    }
    let inner = &text[pos + 1..];
    let trimmed = inner.trim_start_matches([' ', '\t', '\n']);
    let mut consumed = pos + 1 + (inner.len() - trimmed.len());

    // Empty destination: ()
    if trimmed.starts_with(')') {
        return Some((String::new(), None, consumed + 1));
    }

    let (rest, url) = link_destination(trimmed).ok()?;
    consumed += trimmed.len() - rest.len();

    let ws = rest.len() - rest.trim_start_matches([' ', '\t', '\n']).len();
    let after_ws = &rest[ws..];

    if after_ws.starts_with(')') {
        return Some((url, None, consumed + ws + 1));
    }
    if ws == 0 {
        return None;
    }

    let (after_title, title) = link_title(after_ws).ok()?;
    let ws2 = after_title.len() - after_title.trim_start_matches([' ', '\t', '\n']).len();
    if !after_title[ws2..].starts_with(')') {
        return None;
    }
    let end = consumed + ws + (after_ws.len() - after_title.len()) + ws2 + 1;
    Some((url, Some(title), end))
}

/// Tries to read a link reference definition from the start of a paragraph
/// chunk. Returns (normalized label, definition, bytes consumed including
/// any trailing newline).
pub fn try_parse_ref_def(text: &str) -> Option<(String, LinkRef, usize)> {
    if !text.starts_with('[') {
        return None;
    }
    let close = find_closing_bracket(text, 0)?;
    let label = &text[1..close];
    if label.trim().is_empty() || label.len() > 999 {
        return None;
    }
    if text.as_bytes().get(close + 1) != Some(&b':') {
        return None;
    }

    let after_colon = &text[close + 2..];
    let ws = count_ws_one_newline(after_colon)?;
    let dest_input = &after_colon[ws..];
    let (rest, url) = link_destination(dest_input).ok()?;
    if url.is_empty() && !dest_input.starts_with('<') {
        return None;
    }
    let dest_end = text.len() - rest.len();

    // Optional title, possibly on the next line.
    let ws2 = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let mut after = &rest[ws2..];
    if after.starts_with('\n') {
        after = &after[1..];
        let ws3 = after.len() - after.trim_start_matches([' ', '\t']).len();
        after = &after[ws3..];
    } else if ws2 == 0 && !after.is_empty() {
        // Garbage directly after the destination.
        return None;
    }

    if let Ok((after_title, title)) = link_title(after) {
        let tail = after_title.trim_start_matches([' ', '\t']);
        if tail.is_empty() || tail.starts_with('\n') {
            let consumed = text.len() - after_title.len();
            let consumed = consumed + line_tail(after_title);
            return Some((
                normalize_label(label),
                LinkRef {
                    url,
                    title: Some(title),
                },
                consumed,
            ));
        }
    }

    // No valid title: definition ends with the destination line.
    let line_rest = &text[dest_end..];
    let tail = line_rest
        .split('\n')
        .next()
        .unwrap_or("");
    if !tail.trim().is_empty() {
        return None;
    }
    let consumed = dest_end + line_tail(line_rest);
    Some((normalize_label(label), LinkRef { url, title: None }, consumed))
}

/// Whitespace after the colon: spaces/tabs plus at most one newline.
fn count_ws_one_newline(text: &str) -> Option<usize> {
    let mut newlines = 0;
    for (idx, ch) in text.char_indices() {
        match ch {
            ' ' | '\t' => {}
            '\n' => {
                newlines += 1;
                if newlines > 1 {
                    return None;
                }
            }
            _ => return Some(idx),
        }
    }
    None
}

/// Bytes through the end of the current line (newline included, if any).
fn line_tail(rest: &str) -> usize {
    match rest.find('\n') {
        Some(i) => i + 1,
        None => rest.len(),
    }
}
