/// Special inline constructs: autolinks, raw HTML, entities, math, roles.
///
/// Each `try_parse_*` function is handed the inline text and a byte
/// position sitting on the construct's trigger character, and returns the
/// built node plus the position after it, or `None` to fall back to
/// literal text.
use crate::ast::Inline;
use crate::location::Span;

/// Named entities the parser resolves. Unknown names pass through
/// literally; numeric references are always resolved.
const NAMED_ENTITIES: [(&str, &str); 14] = [
    ("amp", "&"),
    ("lt", "<"),
    ("gt", ">"),
    ("quot", "\""),
    ("apos", "'"),
    ("nbsp", "\u{a0}"),
    ("copy", "\u{a9}"),
    ("reg", "\u{ae}"),
    ("trade", "\u{2122}"),
    ("hellip", "\u{2026}"),
    ("mdash", "\u{2014}"),
    ("ndash", "\u{2013}"),
    ("laquo", "\u{ab}"),
    ("raquo", "\u{bb}"),
];

/// Resolves `&name;`, `&#NNN;` or `&#xHH;` at `pos` (on the `&`).
///
/// Returns the decoded text and the position after the `;`.
pub fn try_parse_entity(text: &str, pos: usize) -> Option<(String, usize)> {
    let rest = &text[pos + 1..];
    let semi = rest.find(';')?;
    if semi == 0 || semi > 32 {
        return None;
    }
    let body = &rest[..semi];
    let end = pos + 1 + semi + 1;

    if let Some(num) = body.strip_prefix('#') {
        let code = if let Some(hex) = num.strip_prefix(['x', 'X']) {
            if hex.is_empty() || hex.len() > 6 {
                return None;
            }
            u32::from_str_radix(hex, 16).ok()?
        } else {
            if num.is_empty() || num.len() > 7 || !num.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            num.parse::<u32>().ok()?
        };
        let ch = match code {
            0 => '\u{fffd}',
            _ => char::from_u32(code).unwrap_or('\u{fffd}'),
        };
        return Some((ch.to_string(), end));
    }

    let decoded = NAMED_ENTITIES
        .iter()
        .find(|(name, _)| *name == body)
        .map(|(_, value)| value.to_string())?;
    Some((decoded, end))
}

/// Scheme per CommonMark 6.5: a letter followed by 1-31 letters, digits,
/// `+`, `.` or `-`, then a colon.
fn split_uri_scheme(inner: &str) -> Option<(&str, &str)> {
    let colon = inner.find(':')?;
    let scheme = &inner[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() || !(2..=32).contains(&scheme.len()) {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-')) {
        return None;
    }
    Some((scheme, &inner[colon + 1..]))
}

fn is_email_autolink(inner: &str) -> bool {
    if inner.contains('\\') {
        return false;
    }
    let Some(at) = inner.find('@') else {
        return false;
    };
    let (local, domain) = (&inner[..at], &inner[at + 1..]);
    if local.is_empty()
        || !local.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b".!#$%&'*+/=?^_`{|}~-".contains(&b)
        })
    {
        return false;
    }
    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
                && !label.starts_with('-')
                && !label.ends_with('-')
        })
}

/// Percent-encodes the handful of characters CommonMark requires encoded
/// in autolink destinations.
fn encode_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for ch in url.chars() {
        match ch {
            '\\' => out.push_str("%5C"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            _ => out.push(ch),
        }
    }
    out
}

/// `<scheme:target>` or `<user@host>` at `pos` (on the `<`).
pub fn try_parse_autolink(text: &str, pos: usize, span: Span) -> Option<(Inline, usize)> {
    let close = text[pos + 1..].find('>')? + pos + 1;
    let inner = &text[pos + 1..close];
    if inner.is_empty() || inner.bytes().any(|b| matches!(b, b' ' | b'\t' | b'\n' | b'<')) {
        return None;
    }

    if split_uri_scheme(inner).is_some() {
        let link = Inline::Link {
            url: encode_url(inner),
            title: None,
            children: vec![Inline::Text {
                content: inner.to_string(),
                span,
            }],
            span,
        };
        return Some((link, close + 1));
    }

    if is_email_autolink(inner) {
        let link = Inline::Link {
            url: format!("mailto:{inner}"),
            title: None,
            children: vec![Inline::Text {
                content: inner.to_string(),
                span,
            }],
            span,
        };
        return Some((link, close + 1));
    }

    None
}

/// Raw inline HTML at `pos` (on the `<`): open/close tags with strict
/// attribute validation, comments, processing instructions, declarations
/// and CDATA sections.
pub fn try_parse_html_inline(text: &str, pos: usize, span: Span) -> Option<(Inline, usize)> {
    if let Some(end) = parse_open_tag(text, pos) {
        return Some((html_node(&text[pos..end], span), end));
    }

    let rest = &text[pos..];

    if rest.starts_with("<!--") {
        let close = rest[4..].find("-->")? + 4 + 3;
        return Some((html_node(&rest[..close], span), pos + close));
    }
    if rest.starts_with("<![CDATA[") {
        let close = rest[9..].find("]]>")? + 9 + 3;
        return Some((html_node(&rest[..close], span), pos + close));
    }
    if rest.starts_with("<?") {
        let close = rest[2..].find("?>")? + 2 + 2;
        return Some((html_node(&rest[..close], span), pos + close));
    }
    if rest.starts_with("<!") && rest.as_bytes().get(2).is_some_and(|b| b.is_ascii_alphabetic()) {
        let close = rest.find('>')? + 1;
        return Some((html_node(&rest[..close], span), pos + close));
    }
    if let Some(closing) = rest.strip_prefix("</") {
        let name_len = closing
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        if name_len == 0 || !closing.as_bytes()[0].is_ascii_alphabetic() {
            return None;
        }
        let after = &closing[name_len..];
        let gt = after.find('>')?;
        if !after[..gt].trim().is_empty() {
            return None;
        }
        let end = 2 + name_len + gt + 1;
        return Some((html_node(&rest[..end], span), pos + end));
    }

    None
}

fn html_node(html: &str, span: Span) -> Inline {
    Inline::HtmlInline {
        html: html.to_string(),
        span,
    }
}

/// Validates a complete open tag per CommonMark 6.8, returning the byte
/// position after the closing `>`.
fn parse_open_tag(text: &str, pos: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = pos + 1;
    if i >= bytes.len() || !bytes[i].is_ascii_alphabetic() {
        return None;
    }
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }

    loop {
        if i >= bytes.len() {
            return None;
        }
        match bytes[i] {
            b'>' => return Some(i + 1),
            b'/' => {
                return if bytes.get(i + 1) == Some(&b'>') {
                    Some(i + 2)
                } else {
                    None
                };
            }
            b' ' | b'\t' | b'\n' => {
                i += 1;
                continue;
            }
            c if c.is_ascii_alphabetic() || c == b'_' || c == b':' => {
                // Attribute name, then optional value.
                i += 1;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric()
                        || matches!(bytes[i], b'_' | b'.' | b':' | b'-'))
                {
                    i += 1;
                }
                let ws_start = i;
                while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n') {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'=' {
                    i += 1;
                    while i < bytes.len() && matches!(bytes[i], b' ' | b'\t' | b'\n') {
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return None;
                    }
                    match bytes[i] {
                        b'"' => {
                            i += 1;
                            while i < bytes.len() && bytes[i] != b'"' {
                                i += 1;
                            }
                            if i >= bytes.len() {
                                return None;
                            }
                            i += 1;
                        }
                        b'\'' => {
                            i += 1;
                            while i < bytes.len() && bytes[i] != b'\'' {
                                i += 1;
                            }
                            if i >= bytes.len() {
                                return None;
                            }
                            i += 1;
                        }
                        b'=' | b'<' | b'>' | b'`' => return None,
                        _ => {
                            let start = i;
                            while i < bytes.len()
                                && !matches!(
                                    bytes[i],
                                    b'"' | b'\'' | b'=' | b'<' | b'>' | b'`' | b' ' | b'\t' | b'\n'
                                )
                            {
                                i += 1;
                            }
                            if i == start {
                                return None;
                            }
                        }
                    }
                    if i < bytes.len() && !matches!(bytes[i], b' ' | b'\t' | b'\n' | b'/' | b'>') {
                        return None;
                    }
                } else if ws_start == i && !matches!(bytes.get(i), Some(b'/') | Some(b'>')) {
                    // Boolean attribute must be separated from what follows.
                    return None;
                }
            }
            _ => return None,
        }
    }
}

/// Inline math `$expr$` at `pos`. `$$` belongs to block math and is
/// rejected here; content may not be empty or space-padded on both ends.
pub fn try_parse_math(text: &str, pos: usize, span: Span) -> Option<(Inline, usize)> {
    if text.as_bytes().get(pos + 1) == Some(&b'$') {
        return None;
    }
    let close = text[pos + 1..].find('$')? + pos + 1;
    let content = &text[pos + 1..close];
    if content.is_empty() || content.contains('\n') {
        return None;
    }
    if content.len() > 1 && content.starts_with(' ') && content.ends_with(' ') {
        return None;
    }
    Some((
        Inline::Math {
            content: content.to_string(),
            span,
        },
        close + 1,
    ))
}

/// `{name}` + backtick-quoted content, e.g. ``{kbd}`Ctrl+C` ``.
pub fn try_parse_role(text: &str, pos: usize, span: Span) -> Option<(Inline, usize)> {
    let brace_close = text[pos + 1..].find('}')? + pos + 1;
    let name = text[pos + 1..brace_close].trim();
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    if text.as_bytes().get(brace_close + 1) != Some(&b'`') {
        return None;
    }
    let content_start = brace_close + 2;
    let tick_close = text[content_start..].find('`')? + content_start;
    Some((
        Inline::Role {
            name: name.to_string(),
            content: text[content_start..tick_close].to_string(),
            target: None,
            span,
        },
        tick_close + 1,
    ))
}

/// `[^identifier]` footnote reference at `pos` (on the `[`).
pub fn try_parse_footnote_ref(text: &str, pos: usize, span: Span) -> Option<(Inline, usize)> {
    let rest = text[pos..].strip_prefix("[^")?;
    let close = rest.find(']')?;
    let identifier = &rest[..close];
    if identifier.is_empty() || identifier.chars().any(char::is_whitespace) {
        return None;
    }
    Some((
        Inline::FootnoteRef {
            identifier: identifier.to_string(),
            span,
        },
        pos + 2 + close + 1,
    ))
}
