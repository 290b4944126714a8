/// HTML block recognition (CommonMark 4.6, types 1-7).
///
/// The lexer asks two questions: does this line open an HTML block (and of
/// which type), and does a given line end the block. Types 1-5 end on a
/// textual terminator that may sit on the opening line itself; types 6 and 7
/// end on a blank line.
/// Tags whose blocks run until a matching close tag (type 1).
const TYPE1_TAGS: [&str; 4] = ["pre", "script", "style", "textarea"];

/// Block-level tag names for type 6 (CommonMark 4.6 list).
const TYPE6_TAGS: [&str; 62] = [
    "address", "article", "aside", "base", "basefont", "blockquote", "body", "caption", "center",
    "col", "colgroup", "dd", "details", "dialog", "dir", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "frame", "frameset", "h1", "h2", "h3", "h4", "h5",
    "h6", "head", "header", "hr", "html", "iframe", "legend", "li", "link", "main", "menu",
    "menuitem", "nav", "noframes", "ol", "optgroup", "option", "p", "param", "search", "section",
    "summary", "table", "tbody", "td", "tfoot", "th", "thead", "title", "tr", "track", "ul",
];

/// Inline tags that should not open a type 7 block mid-flow.
const INLINE_TAGS: [&str; 27] = [
    "a", "abbr", "b", "bdi", "bdo", "cite", "code", "data", "del", "dfn", "em", "i", "ins", "kbd",
    "mark", "q", "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr",
];

/// Decides whether `rest` (indent-stripped line content) opens an HTML
/// block, and of which type (1-7).
///
/// `previous_line_blank` gates type 7's inline-tag exclusion: a lone
/// `<span>` only opens a block at a paragraph boundary.
pub fn classify_html_open(rest: &str, previous_line_blank: bool) -> Option<u8> {
    if !rest.starts_with('<') {
        return None;
    }
    let lower = rest.to_ascii_lowercase();

    for tag in TYPE1_TAGS {
        if let Some(after) = lower.strip_prefix('<').and_then(|s| s.strip_prefix(tag)) {
            let boundary = after
                .chars()
                .next()
                .map_or(true, |c| matches!(c, ' ' | '\t' | '>'));
            if boundary {
                return Some(1);
            }
        }
    }

    if rest.starts_with("<!--") {
        return Some(2);
    }
    if rest.starts_with("<?") {
        return Some(3);
    }
    if rest.starts_with("<![CDATA[") {
        return Some(5);
    }
    if rest.len() >= 3 && rest.as_bytes()[1] == b'!' && rest.as_bytes()[2].is_ascii_uppercase() {
        return Some(4);
    }

    if let Some(tag) = extract_tag_name(rest) {
        if TYPE6_TAGS.contains(&tag.to_ascii_lowercase().as_str()) {
            return Some(6);
        }
    }

    if is_complete_tag_line(rest, previous_line_blank) {
        return Some(7);
    }

    None
}

/// True if `line` contains the terminator for a type 1-5 block. Types 6-7
/// end on blank lines, which the lexer handles itself.
pub fn html_block_ends(kind: u8, line: &str) -> bool {
    match kind {
        1 => {
            let lower = line.to_ascii_lowercase();
            TYPE1_TAGS.iter().any(|tag| lower.contains(&format!("</{tag}>")))
        }
        2 => line.contains("-->"),
        3 => line.contains("?>"),
        4 => line.contains('>'),
        5 => line.contains("]]>"),
        _ => false,
    }
}

/// The terminator for type 1 on the opening line must be checked past the
/// opening tag itself.
pub fn html_open_self_terminates(kind: u8, rest: &str) -> bool {
    match kind {
        1 => html_block_ends(1, rest),
        2 => html_block_ends(2, &rest[4.min(rest.len())..]),
        3 => html_block_ends(3, &rest[2.min(rest.len())..]),
        4 => html_block_ends(4, &rest[2.min(rest.len())..]),
        5 => html_block_ends(5, &rest[9.min(rest.len())..]),
        _ => false,
    }
}

fn extract_tag_name(rest: &str) -> Option<&str> {
    let mut bytes = rest.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    bytes = &bytes[1..];
    let mut start = 1;
    if bytes.first() == Some(&b'/') {
        bytes = &bytes[1..];
        start = 2;
    }
    if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic()) {
        return None;
    }
    let len = bytes
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'-')
        .count();
    Some(&rest[start..start + len])
}

/// Type 7: a single complete open or close tag alone on the line.
fn is_complete_tag_line(rest: &str, previous_line_blank: bool) -> bool {
    let content = rest.trim_end();
    if content.len() < 3 || !content.starts_with('<') || !content.ends_with('>') {
        return false;
    }

    // Autolinks (<https://...>, <user@host>) are inline, not blocks.
    let inner = &content[1..content.len() - 1];
    if inner.contains("://") || inner.contains('@') {
        return false;
    }

    if let Some(closing) = content.strip_prefix("</") {
        let name_len = closing
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
            .count();
        if name_len == 0 || !closing.as_bytes()[0].is_ascii_alphabetic() {
            return false;
        }
        let tag = closing[..name_len].to_ascii_lowercase();
        let after = &closing[name_len..closing.len() - 1];
        return after.trim().is_empty()
            && !TYPE1_TAGS.contains(&tag.as_str())
            && !TYPE6_TAGS.contains(&tag.as_str());
    }

    let Some(tag) = extract_tag_name(content) else {
        return false;
    };
    let tag_lower = tag.to_ascii_lowercase();
    if TYPE1_TAGS.contains(&tag_lower.as_str()) || TYPE6_TAGS.contains(&tag_lower.as_str()) {
        return false;
    }
    if INLINE_TAGS.contains(&tag_lower.as_str()) && !previous_line_blank {
        return false;
    }

    let after_name = &content[1 + tag.len()..content.len() - 1];
    if let Some(first) = after_name.chars().next() {
        if !matches!(first, ' ' | '\t' | '/') {
            return false;
        }
    }
    let attrs = after_name.strip_suffix('/').unwrap_or(after_name);
    if attrs.contains('<') {
        return false;
    }
    validate_attributes(attrs)
}

/// Strict attribute validation per CommonMark 6.8.
fn validate_attributes(attrs: &str) -> bool {
    let bytes = attrs.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if matches!(bytes[i], b' ' | b'\t') {
            i += 1;
            continue;
        }

        // Attribute name: [a-zA-Z_:][a-zA-Z0-9_.:-]*
        if !(bytes[i].is_ascii_alphabetic() || bytes[i] == b'_' || bytes[i] == b':') {
            return false;
        }
        i += 1;
        while i < bytes.len()
            && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'.' | b':' | b'-'))
        {
            i += 1;
        }

        while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
            i += 1;
        }

        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            while i < bytes.len() && matches!(bytes[i], b' ' | b'\t') {
                i += 1;
            }
            if i >= bytes.len() {
                return false;
            }
            match bytes[i] {
                b'"' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'"' {
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return false;
                    }
                    i += 1;
                }
                b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'\'' {
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return false;
                    }
                    i += 1;
                }
                b'=' | b'<' | b'>' | b'`' => return false,
                _ => {
                    while i < bytes.len()
                        && !matches!(bytes[i], b'"' | b'\'' | b'=' | b'<' | b'>' | b'`' | b' ' | b'\t')
                    {
                        i += 1;
                    }
                }
            }
            // Space required before the next attribute.
            if i < bytes.len() && !matches!(bytes[i], b' ' | b'\t') {
                return false;
            }
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type1_script_and_pre() {
        assert_eq!(classify_html_open("<script>", false), Some(1));
        assert_eq!(classify_html_open("<pre class=\"x\">", false), Some(1));
        assert_eq!(classify_html_open("<PRE>", false), Some(1));
        // "prefix" is not "pre" with a boundary.
        assert_ne!(classify_html_open("<prefix>", true), Some(1));
    }

    #[test]
    fn comment_pi_declaration_cdata() {
        assert_eq!(classify_html_open("<!-- note", false), Some(2));
        assert_eq!(classify_html_open("<?php echo", false), Some(3));
        assert_eq!(classify_html_open("<!DOCTYPE html>", false), Some(4));
        assert_eq!(classify_html_open("<![CDATA[data", false), Some(5));
    }

    #[test]
    fn type6_block_tags() {
        assert_eq!(classify_html_open("<div>", false), Some(6));
        assert_eq!(classify_html_open("</table>", false), Some(6));
        assert_eq!(classify_html_open("<div class=x unterminated", false), Some(6));
    }

    #[test]
    fn type7_requires_complete_lone_tag() {
        assert_eq!(classify_html_open("<custom-tag attr=\"v\">", true), Some(7));
        assert_eq!(classify_html_open("<custom-tag/>", true), Some(7));
        // Inline tags only at paragraph boundaries.
        assert_eq!(classify_html_open("<span>", false), None);
        assert_eq!(classify_html_open("<span>", true), Some(7));
        // Content after the tag disqualifies type 7.
        assert_eq!(classify_html_open("<x>text</x>", true), None);
        // Autolinks are not blocks.
        assert_eq!(classify_html_open("<https://example.com>", true), None);
        // Missing space between attributes.
        assert_eq!(
            classify_html_open("<x a='b'c='d'>", true),
            None
        );
    }

    #[test]
    fn terminators() {
        assert!(html_block_ends(1, "text </script> more"));
        assert!(html_block_ends(2, "end -->"));
        assert!(html_block_ends(3, "x ?>"));
        assert!(html_block_ends(4, ">"));
        assert!(html_block_ends(5, "]]>"));
        assert!(!html_block_ends(2, "not closed"));
    }

    #[test]
    fn open_line_self_termination() {
        assert!(html_open_self_terminates(1, "<pre>x</pre>"));
        assert!(html_open_self_terminates(2, "<!-- c -->"));
        assert!(!html_open_self_terminates(2, "<!--"));
    }
}
