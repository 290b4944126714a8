/// Per-line block classification.
///
/// Pure functions over a single line's content (leading indent already
/// measured by the lexer). Each returns `Option`: `None` means "not this
/// construct, keep trying down the priority list".
use super::token::ListMarkerInfo;

/// Measures leading whitespace: returns (columns, byte index past the
/// indent). Tabs advance to the next 4-column stop.
pub fn measure_indent(line: &str) -> (usize, usize) {
    let mut columns = 0;
    for (idx, byte) in line.bytes().enumerate() {
        match byte {
            b' ' => columns += 1,
            b'\t' => columns = (columns / 4 + 1) * 4,
            _ => return (columns, idx),
        }
    }
    (columns, line.len())
}

pub fn is_blank(line: &str) -> bool {
    line.bytes().all(|b| b == b' ' || b == b'\t')
}

/// Thematic break: 3+ of the same `-`, `_` or `*`, spaces/tabs allowed
/// between them, nothing else on the line.
pub fn is_thematic_break(rest: &str) -> bool {
    let mut marker = None;
    let mut count = 0;
    for ch in rest.chars() {
        match ch {
            ' ' | '\t' => {}
            '-' | '_' | '*' => match marker {
                None => {
                    marker = Some(ch);
                    count = 1;
                }
                Some(m) if m == ch => count += 1,
                Some(_) => return false,
            },
            _ => return false,
        }
    }
    count >= 3
}

/// ATX heading: 1-6 `#` followed by space, tab or end of line.
///
/// Returns (level, content, explicit_id). Trailing closing hashes and a
/// `{#custom-id}` suffix are stripped from the content.
pub fn classify_atx(rest: &str) -> Option<(u8, String, Option<String>)> {
    let hashes = rest.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let after = &rest[hashes..];
    if !after.is_empty() && !after.starts_with(' ') && !after.starts_with('\t') {
        return None;
    }

    let mut content = after.trim();

    // Closing hash run: must be all hashes, preceded by a space or alone.
    let trailing = content.bytes().rev().take_while(|&b| b == b'#').count();
    if trailing > 0 {
        let before = &content[..content.len() - trailing];
        if before.is_empty() {
            content = "";
        } else if before.ends_with(' ') || before.ends_with('\t') {
            content = before.trim_end();
        }
    }

    let (content, explicit_id) = split_explicit_id(content);
    Some((hashes as u8, content.to_string(), explicit_id))
}

/// Splits a trailing `{#id}` anchor off heading content.
pub fn split_explicit_id(content: &str) -> (&str, Option<String>) {
    let trimmed = content.trim_end();
    if !trimmed.ends_with('}') {
        return (content, None);
    }
    let Some(open) = trimmed.rfind("{#") else {
        return (content, None);
    };
    let id = &trimmed[open + 2..trimmed.len() - 1];
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return (content, None);
    }
    (trimmed[..open].trim_end(), Some(id.to_string()))
}

/// An opening code fence line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FenceOpen {
    pub marker: char,
    pub run: usize,
    pub info: Option<String>,
}

/// Opening fence: 3+ backticks or tildes. Backtick info strings may not
/// contain backticks.
pub fn classify_fence_open(rest: &str) -> Option<FenceOpen> {
    let first = rest.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let run = rest.chars().take_while(|&c| c == first).count();
    if run < 3 {
        return None;
    }
    let info_raw = rest[run..].trim();
    if first == '`' && info_raw.contains('`') {
        return None;
    }
    let info = if info_raw.is_empty() {
        None
    } else {
        Some(info_raw.to_string())
    };
    Some(FenceOpen {
        marker: first,
        run,
        info,
    })
}

/// Closing fence: a run of the opener's marker at least as long, nothing
/// else but trailing whitespace.
pub fn is_fence_close(rest: &str, marker: char, open_run: usize) -> bool {
    let run = rest.chars().take_while(|&c| c == marker).count();
    run >= open_run && rest[run..].trim().is_empty()
}

/// Setext underline: all `=` (level 1) or all `-` (level 2), trailing
/// whitespace allowed. Only meaningful while a paragraph is open, which is
/// the parser's call.
pub fn setext_level(rest: &str) -> Option<u8> {
    let trimmed = rest.trim_end();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.bytes().all(|b| b == b'=') {
        Some(1)
    } else if trimmed.bytes().all(|b| b == b'-') {
        Some(2)
    } else {
        None
    }
}

/// List marker: `-`, `+`, `*` or 1-9 digits plus `.`/`)`, followed by
/// spacing or end of line.
///
/// `indent` is the line's expanded indent; the returned `content_indent` is
/// measured from the start of the line per the CommonMark arithmetic:
/// marker end plus following spaces, except that more than 4 spaces (or a
/// blank rest) count as exactly one.
pub fn classify_list_marker(rest: &str, indent: usize) -> Option<ListMarkerInfo> {
    let (ordered, marker_char, start, marker_width) = read_marker(rest)?;
    let after = &rest[marker_width..];

    if !after.is_empty() && !after.starts_with(' ') && !after.starts_with('\t') {
        return None;
    }

    let (spacing_cols, spacing_bytes) = measure_indent(after);
    let content = &after[spacing_bytes..];

    let (content_indent, content) = if content.is_empty() {
        (indent + marker_width + 1, String::new())
    } else if spacing_cols > 4 {
        // Content starts as indented code: one space belongs to the marker,
        // the rest stays on the content line.
        let kept = " ".repeat(spacing_cols - 1) + content;
        (indent + marker_width + 1, kept)
    } else {
        (indent + marker_width + spacing_cols, content.to_string())
    };

    Some(ListMarkerInfo {
        ordered,
        marker_char,
        start,
        marker_width,
        content_indent,
        content,
    })
}

fn read_marker(rest: &str) -> Option<(bool, char, u64, usize)> {
    let first = rest.chars().next()?;
    if matches!(first, '-' | '+' | '*') {
        return Some((false, first, 1, 1));
    }
    if first.is_ascii_digit() {
        let digits = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits > 9 {
            return None;
        }
        let delim = rest[digits..].chars().next()?;
        if delim != '.' && delim != ')' {
            return None;
        }
        let start: u64 = rest[..digits].parse().ok()?;
        return Some((true, delim, start, digits + 1));
    }
    None
}

/// Footnote definition line: `[^identifier]: content`.
pub fn classify_footnote_def(rest: &str) -> Option<(String, String)> {
    let inner = rest.strip_prefix("[^")?;
    let close = inner.find(']')?;
    let identifier = &inner[..close];
    if identifier.is_empty() || identifier.chars().any(|c| c.is_whitespace()) {
        return None;
    }
    let after = inner[close + 1..].strip_prefix(':')?;
    Some((identifier.to_string(), after.trim_start().to_string()))
}

/// Directive opener: `:::{name}` or `::::{name} title`, 3+ colons.
///
/// Returns (colon run, name, title).
pub fn classify_directive_open(rest: &str) -> Option<(usize, String, Option<String>)> {
    let colons = rest.bytes().take_while(|&b| b == b':').count();
    if colons < 3 {
        return None;
    }
    let after = rest[colons..].trim_start();
    let inner = after.strip_prefix('{')?;
    let close = inner.find('}')?;
    let name = inner[..close].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    let title_raw = inner[close + 1..].trim();
    let title = if title_raw.is_empty() {
        None
    } else {
        Some(title_raw.to_string())
    };
    Some((colons, name.to_string(), title))
}

/// Directive closer: a run of colons at least as long as the opener.
pub fn is_directive_close(rest: &str, open_colons: usize) -> bool {
    let colons = rest.bytes().take_while(|&b| b == b':').count();
    colons >= open_colons && rest[colons..].trim().is_empty()
}

/// Math block fence: a line that is exactly `$$` (plus whitespace).
pub fn is_math_fence(rest: &str) -> bool {
    rest.trim_end() == "$$"
}

/// Block quote marker: `>` with one optional following space consumed.
pub fn strip_quote_marker(rest: &str) -> Option<&str> {
    let after = rest.strip_prefix('>')?;
    Some(after.strip_prefix(' ').unwrap_or(after))
}
