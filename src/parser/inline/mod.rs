/// Inline parsing: three stages over a leaf block's text.
///
/// 1. Tokenize into an immutable token list (`InlineTok`). Code spans,
///    links, autolinks, raw HTML, entities, math, roles and breaks are
///    fully resolved here; emphasis markers become delimiter tokens with
///    precomputed flanking.
/// 2. Resolve delimiters into an external match table ([`emphasis`]).
/// 3. Replay tokens plus table into the inline AST.
///
/// Link text is tokenized recursively with the same pipeline, so emphasis
/// never crosses a link boundary.
pub mod emphasis;
pub mod links;
pub mod special;

use crate::ast::{plain_text, Inline};
use crate::config::ParseConfig;
use crate::location::Span;
use links::LinkRefMap;

/// Immutable inline token. Resolution state lives in the match table, not
/// in the tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum InlineTok {
    Text { text: String, pos: usize },
    Delim {
        marker: char,
        count: usize,
        can_open: bool,
        can_close: bool,
        pos: usize,
    },
    Node(Inline),
}

/// Shared context for one inline parse.
pub struct InlineContext<'a> {
    pub config: &'a ParseConfig,
    pub link_refs: &'a LinkRefMap,
    pub base: Span,
}

impl InlineContext<'_> {
    fn span_at(&self, start: usize, end: usize) -> Span {
        Span::new(
            self.base.line,
            self.base.column,
            self.base.offset + start,
            self.base.offset + end,
        )
    }
}

/// Parses one leaf's text into inline nodes.
pub fn parse_inlines(text: &str, cx: &InlineContext) -> Vec<Inline> {
    let tokens = tokenize(text, cx);
    let table = emphasis::resolve(&tokens);
    build_ast(&tokens, &table, cx)
}

fn tokenize(text: &str, cx: &InlineContext) -> Vec<InlineTok> {
    let index = links::ScanIndex::build(text);
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut buf_start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;

    macro_rules! flush {
        () => {
            if !buf.is_empty() {
                tokens.push(InlineTok::Text {
                    text: std::mem::take(&mut buf),
                    pos: buf_start,
                });
            }
        };
    }

    while i < text.len() {
        let ch = match text[i..].chars().next() {
            Some(c) => c,
            None => break,
        };
        match ch {
            '\\' => {
                let next = text[i + 1..].chars().next();
                match next {
                    Some('\n') => {
                        flush!();
                        tokens.push(InlineTok::Node(Inline::LineBreak {
                            span: cx.span_at(i, i + 2),
                        }));
                        i += 2;
                        i += skip_spaces(&text[i..]);
                        buf_start = i;
                    }
                    Some(c) if c.is_ascii_punctuation() => {
                        buf.push(c);
                        i += 1 + c.len_utf8();
                    }
                    _ => {
                        buf.push('\\');
                        i += 1;
                    }
                }
            }
            '`' => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
                match index.backtick_close(i + run, run) {
                    Some(end) => {
                        flush!();
                        let code = normalize_code_span(&text[i + run..end - run]);
                        tokens.push(InlineTok::Node(Inline::CodeSpan {
                            code,
                            span: cx.span_at(i, end),
                        }));
                        i = end;
                        buf_start = i;
                    }
                    None => {
                        buf.push_str(&text[i..i + run]);
                        i += run;
                    }
                }
            }
            '\n' => {
                let hard = buf.ends_with("  ");
                while buf.ends_with(' ') {
                    buf.pop();
                }
                flush!();
                let span = cx.span_at(i, i + 1);
                tokens.push(InlineTok::Node(if hard {
                    Inline::LineBreak { span }
                } else {
                    Inline::SoftBreak { span }
                }));
                i += 1;
                i += skip_spaces(&text[i..]);
                buf_start = i;
            }
            '[' => {
                let parsed = footnote_or_link(text, i, false, cx, &index);
                match parsed {
                    Some((node, end)) => {
                        flush!();
                        tokens.push(InlineTok::Node(node));
                        i = end;
                        buf_start = i;
                    }
                    None => {
                        buf.push('[');
                        i += 1;
                    }
                }
            }
            '!' if bytes.get(i + 1) == Some(&b'[') => {
                match try_parse_link(text, i, true, cx, &index) {
                    Some((node, end)) => {
                        flush!();
                        tokens.push(InlineTok::Node(node));
                        i = end;
                        buf_start = i;
                    }
                    None => {
                        buf.push('!');
                        i += 1;
                    }
                }
            }
            '<' => {
                let span = cx.span_at(i, i);
                let autolink = if cx.config.autolinks {
                    special::try_parse_autolink(text, i, span)
                } else {
                    None
                };
                match autolink.or_else(|| special::try_parse_html_inline(text, i, span)) {
                    Some((node, end)) => {
                        flush!();
                        tokens.push(InlineTok::Node(node));
                        i = end;
                        buf_start = i;
                    }
                    None => {
                        buf.push('<');
                        i += 1;
                    }
                }
            }
            '&' => match special::try_parse_entity(text, i) {
                Some((decoded, end)) => {
                    buf.push_str(&decoded);
                    i = end;
                }
                None => {
                    buf.push('&');
                    i += 1;
                }
            },
            '*' | '_' => {
                let run = bytes[i..].iter().take_while(|&&b| b == ch as u8).count();
                let before = text[..i].chars().next_back();
                let after = text[i + run..].chars().next();
                let f = emphasis::flanking(ch, before, after);
                if f.can_open || f.can_close {
                    flush!();
                    tokens.push(InlineTok::Delim {
                        marker: ch,
                        count: run,
                        can_open: f.can_open,
                        can_close: f.can_close,
                        pos: i,
                    });
                    i += run;
                    buf_start = i;
                } else {
                    buf.push_str(&text[i..i + run]);
                    i += run;
                }
            }
            '~' if cx.config.strikethrough => {
                let run = bytes[i..].iter().take_while(|&&b| b == b'~').count();
                if run == 2 {
                    let before = text[..i].chars().next_back();
                    let after = text[i + run..].chars().next();
                    let f = emphasis::flanking('~', before, after);
                    flush!();
                    tokens.push(InlineTok::Delim {
                        marker: '~',
                        count: run,
                        can_open: f.can_open,
                        can_close: f.can_close,
                        pos: i,
                    });
                    i += run;
                    buf_start = i;
                } else {
                    // Literal tildes stay in the buffer; its start position
                    // must not move.
                    buf.push_str(&text[i..i + run]);
                    i += run;
                }
            }
            '$' if cx.config.math => match special::try_parse_math(text, i, cx.span_at(i, i)) {
                Some((node, end)) => {
                    flush!();
                    tokens.push(InlineTok::Node(node));
                    i = end;
                    buf_start = i;
                }
                None => {
                    buf.push('$');
                    i += 1;
                }
            },
            '{' => match special::try_parse_role(text, i, cx.span_at(i, i)) {
                Some((node, end)) => {
                    flush!();
                    tokens.push(InlineTok::Node(node));
                    i = end;
                    buf_start = i;
                }
                None => {
                    buf.push('{');
                    i += 1;
                }
            },
            _ => {
                buf.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    if !buf.is_empty() {
        tokens.push(InlineTok::Text {
            text: buf,
            pos: buf_start,
        });
    }
    tokens
}

fn skip_spaces(rest: &str) -> usize {
    rest.bytes().take_while(|&b| b == b' ').count()
}

/// CommonMark code span normalization: newlines become spaces; one space
/// is stripped from both ends when both exist and content isn't all spaces.
fn normalize_code_span(raw: &str) -> String {
    let code = raw.replace('\n', " ");
    if code.len() >= 2
        && code.starts_with(' ')
        && code.ends_with(' ')
        && !code.bytes().all(|b| b == b' ')
    {
        code[1..code.len() - 1].to_string()
    } else {
        code
    }
}

fn footnote_or_link(
    text: &str,
    pos: usize,
    image: bool,
    cx: &InlineContext,
    index: &links::ScanIndex,
) -> Option<(Inline, usize)> {
    if cx.config.footnotes && !image {
        if let Some(hit) = special::try_parse_footnote_ref(text, pos, cx.span_at(pos, pos)) {
            return Some(hit);
        }
    }
    try_parse_link(text, pos, image, cx, index)
}

/// Inline link/image, reference link, or `None` for literal brackets.
fn try_parse_link(
    text: &str,
    pos: usize,
    image: bool,
    cx: &InlineContext,
    index: &links::ScanIndex,
) -> Option<(Inline, usize)> {
    let bracket = if image { pos + 1 } else { pos };
    let close = index.bracket_close(bracket)?;
    let inner = &text[bracket + 1..close];
    let after = close + 1;

    if text.as_bytes().get(after) == Some(&b'(') {
        if let Some((url, title, end)) = links::parse_inline_suffix(text, after) {
            let node = make_link(inner, url, title, image, cx, pos, end)?;
            return Some((node, end));
        }
    }

    if text.as_bytes().get(after) == Some(&b'[') {
        let label_close = index.bracket_close(after)?;
        let label_raw = &text[after + 1..label_close];
        let label = if label_raw.is_empty() { inner } else { label_raw };
        let def = cx.link_refs.get(&links::normalize_label(label))?;
        let node = make_link(
            inner,
            def.url.clone(),
            def.title.clone(),
            image,
            cx,
            pos,
            label_close + 1,
        )?;
        return Some((node, label_close + 1));
    }

    // Shortcut reference.
    let def = cx.link_refs.get(&links::normalize_label(inner))?;
    let node = make_link(inner, def.url.clone(), def.title.clone(), image, cx, pos, after)?;
    Some((node, after))
}

fn make_link(
    inner: &str,
    url: String,
    title: Option<String>,
    image: bool,
    cx: &InlineContext,
    start: usize,
    end: usize,
) -> Option<Inline> {
    let children = parse_inlines(inner, cx);
    let span = cx.span_at(start, end);
    if image {
        return Some(Inline::Image {
            url,
            alt: plain_text(&children),
            title,
            span,
        });
    }
    // Links may not nest inside link text.
    if contains_link(&children) {
        return None;
    }
    Some(Inline::Link {
        url,
        title,
        children,
        span,
    })
}

fn contains_link(inlines: &[Inline]) -> bool {
    inlines.iter().any(|inline| match inline {
        Inline::Link { .. } => true,
        Inline::Emphasis { children, .. }
        | Inline::Strong { children, .. }
        | Inline::Strikethrough { children, .. } => contains_link(children),
        _ => false,
    })
}

/// Replays tokens and the match table into nested inline nodes.
fn build_ast(tokens: &[InlineTok], table: &emphasis::MatchTable, cx: &InlineContext) -> Vec<Inline> {
    // Events per token index. Pairs are recorded innermost-first between
    // the same tokens, so a closer closes in match order and an opener
    // opens in reverse match order.
    let mut opens: Vec<Vec<usize>> = vec![Vec::new(); tokens.len()];
    let mut closes: Vec<Vec<usize>> = vec![Vec::new(); tokens.len()];
    for (pair_idx, pair) in table.pairs.iter().enumerate() {
        opens[pair.opener].insert(0, pair_idx);
        closes[pair.closer].push(pair_idx);
    }

    struct Frame {
        marker: char,
        use_count: usize,
        start_pos: usize,
        saved: Vec<Inline>,
    }

    let mut stack: Vec<Frame> = Vec::new();
    let mut cur: Vec<Inline> = Vec::new();

    for (idx, tok) in tokens.iter().enumerate() {
        match tok {
            InlineTok::Text { text, pos } => {
                push_text(&mut cur, text, cx.span_at(*pos, *pos + text.len()));
            }
            InlineTok::Node(node) => cur.push(node.clone()),
            InlineTok::Delim { marker, pos, .. } => {
                for &pair_idx in &closes[idx] {
                    let pair = table.pairs[pair_idx];
                    if let Some(frame) = stack.pop() {
                        let children = std::mem::replace(&mut cur, frame.saved);
                        let span = cx.span_at(frame.start_pos, pos + pair.use_count);
                        cur.push(wrap(frame.marker, frame.use_count, children, span));
                    }
                }
                if table.leftover[idx] > 0 {
                    let run: String = std::iter::repeat(*marker)
                        .take(table.leftover[idx])
                        .collect();
                    push_text(&mut cur, &run, cx.span_at(*pos, pos + run.len()));
                }
                for &pair_idx in &opens[idx] {
                    let pair = table.pairs[pair_idx];
                    stack.push(Frame {
                        marker: *marker,
                        use_count: pair.use_count,
                        start_pos: *pos,
                        saved: std::mem::take(&mut cur),
                    });
                }
            }
        }
    }

    // Pairs are well-nested, so the stack should be empty here; any
    // remainder degrades to literal text rather than being dropped.
    while let Some(frame) = stack.pop() {
        let mut children = std::mem::replace(&mut cur, frame.saved);
        let run: String = std::iter::repeat(frame.marker).take(frame.use_count).collect();
        push_text(&mut cur, &run, cx.span_at(frame.start_pos, frame.start_pos));
        cur.append(&mut children);
    }

    cur
}

fn push_text(out: &mut Vec<Inline>, text: &str, span: Span) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text { content, span: s }) = out.last_mut() {
        content.push_str(text);
        s.end_offset = span.end_offset;
        return;
    }
    out.push(Inline::Text {
        content: text.to_string(),
        span,
    });
}

fn wrap(marker: char, use_count: usize, children: Vec<Inline>, span: Span) -> Inline {
    match (marker, use_count) {
        ('~', _) => Inline::Strikethrough { children, span },
        (_, 2) => Inline::Strong { children, span },
        _ => Inline::Emphasis { children, span },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseConfig;

    fn parse(text: &str) -> Vec<Inline> {
        let config = ParseConfig::default();
        parse_with(text, &config)
    }

    fn parse_with(text: &str, config: &ParseConfig) -> Vec<Inline> {
        let refs = LinkRefMap::new();
        let cx = InlineContext {
            config,
            link_refs: &refs,
            base: Span::unknown(),
        };
        parse_inlines(text, &cx)
    }

    fn text_of(inline: &Inline) -> &str {
        match inline {
            Inline::Text { content, .. } => content,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_single_token() {
        let inlines = parse("just words");
        assert_eq!(inlines.len(), 1);
        assert_eq!(text_of(&inlines[0]), "just words");
    }

    #[test]
    fn strong_and_emphasis() {
        let inlines = parse("**bold** and *italic*");
        assert_eq!(inlines.len(), 3);
        assert!(matches!(inlines[0], Inline::Strong { .. }));
        assert_eq!(text_of(&inlines[1]), " and ");
        assert!(matches!(inlines[2], Inline::Emphasis { .. }));
    }

    #[test]
    fn triple_delimiters_nest_fully() {
        let inlines = parse("***bold and italic***");
        assert_eq!(inlines.len(), 1);
        // Both delimiters fully consumed; strong/emphasis nested.
        let (outer_children, is_emphasis_outer) = match &inlines[0] {
            Inline::Emphasis { children, .. } => (children, true),
            Inline::Strong { children, .. } => (children, false),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(outer_children.len(), 1);
        match (&outer_children[0], is_emphasis_outer) {
            (Inline::Strong { children, .. }, true) | (Inline::Emphasis { children, .. }, false) => {
                assert_eq!(text_of(&children[0]), "bold and italic");
            }
            other => panic!("unexpected nesting {other:?}"),
        }
    }

    #[test]
    fn unmatched_delimiters_stay_literal() {
        let inlines = parse("**a*");
        // One asterisk of the opener is literal.
        assert_eq!(text_of(&inlines[0]), "*");
        assert!(matches!(inlines[1], Inline::Emphasis { .. }));
    }

    #[test]
    fn underscore_not_intraword() {
        let inlines = parse("snake_case_name");
        assert_eq!(inlines.len(), 1);
        assert_eq!(text_of(&inlines[0]), "snake_case_name");
    }

    #[test]
    fn code_span_backtick_matching() {
        let inlines = parse("a `code` b");
        assert!(matches!(
            &inlines[1],
            Inline::CodeSpan { code, .. } if code == "code"
        ));

        let inlines = parse("``has ` tick``");
        assert!(matches!(
            &inlines[0],
            Inline::CodeSpan { code, .. } if code == "has ` tick"
        ));
    }

    #[test]
    fn code_span_space_stripping() {
        let inlines = parse("` code `");
        assert!(matches!(
            &inlines[0],
            Inline::CodeSpan { code, .. } if code == "code"
        ));
        // All-space content is kept as-is.
        let inlines = parse("`  `");
        assert!(matches!(
            &inlines[0],
            Inline::CodeSpan { code, .. } if code == "  "
        ));
    }

    #[test]
    fn emphasis_does_not_cross_code_span() {
        let inlines = parse("*a `*` b*");
        assert!(matches!(inlines[0], Inline::Emphasis { .. }));
    }

    #[test]
    fn inline_link() {
        let inlines = parse("[text](/url \"title\")");
        assert_eq!(inlines.len(), 1);
        let Inline::Link {
            url,
            title,
            children,
            ..
        } = &inlines[0]
        else {
            panic!("expected link");
        };
        assert_eq!(url, "/url");
        assert_eq!(title.as_deref(), Some("title"));
        assert_eq!(text_of(&children[0]), "text");
    }

    #[test]
    fn image_alt_flattens_markup() {
        let inlines = parse("![the **alt**](/img.png)");
        let Inline::Image { url, alt, .. } = &inlines[0] else {
            panic!("expected image");
        };
        assert_eq!(url, "/img.png");
        assert_eq!(alt, "the alt");
    }

    #[test]
    fn reference_links() {
        let mut refs = LinkRefMap::new();
        refs.insert(
            "label".to_string(),
            links::LinkRef {
                url: "/ref".to_string(),
                title: None,
            },
        );
        let config = ParseConfig::default();
        let cx = InlineContext {
            config: &config,
            link_refs: &refs,
            base: Span::unknown(),
        };

        for source in ["[text][label]", "[label][]", "[label]"] {
            let inlines = parse_inlines(source, &cx);
            assert!(
                matches!(&inlines[0], Inline::Link { url, .. } if url == "/ref"),
                "failed for {source}: {inlines:?}"
            );
        }

        let inlines = parse_inlines("[missing]", &cx);
        assert!(matches!(inlines[0], Inline::Text { .. }));
    }

    #[test]
    fn links_do_not_nest() {
        let mut refs = LinkRefMap::new();
        refs.insert(
            "inner".to_string(),
            links::LinkRef {
                url: "/i".to_string(),
                title: None,
            },
        );
        let config = ParseConfig::default();
        let cx = InlineContext {
            config: &config,
            link_refs: &refs,
            base: Span::unknown(),
        };
        let inlines = parse_inlines("[a [inner] b](/outer)", &cx);
        // Outer bracket cannot become a link around another link.
        assert!(!matches!(inlines[0], Inline::Link { url: _, .. } if inlines.len() == 1));
    }

    #[test]
    fn escapes() {
        let inlines = parse("\\*not emphasis\\*");
        assert_eq!(inlines.len(), 1);
        assert_eq!(text_of(&inlines[0]), "*not emphasis*");
    }

    #[test]
    fn hard_and_soft_breaks() {
        let inlines = parse("a  \nb");
        assert!(matches!(inlines[1], Inline::LineBreak { .. }));
        assert_eq!(text_of(&inlines[0]), "a");

        let inlines = parse("a\nb");
        assert!(matches!(inlines[1], Inline::SoftBreak { .. }));

        let inlines = parse("a\\\nb");
        assert!(matches!(inlines[1], Inline::LineBreak { .. }));
    }

    #[test]
    fn entities_decode_into_text() {
        let inlines = parse("a &amp; b &#65;");
        assert_eq!(inlines.len(), 1);
        assert_eq!(text_of(&inlines[0]), "a & b A");
    }

    #[test]
    fn long_unmatched_bracket_run_stays_literal() {
        let source = "[".repeat(512);
        let inlines = parse(&source);
        assert_eq!(inlines.len(), 1);
        assert_eq!(text_of(&inlines[0]), source);
    }

    #[test]
    fn literal_tilde_keeps_text_position() {
        let config = ParseConfig::builder().strikethrough(true).build();
        let inlines = parse_with("ab~cd", &config);
        assert_eq!(inlines.len(), 1);
        let Inline::Text { content, span } = &inlines[0] else {
            panic!("expected text, got {:?}", inlines[0]);
        };
        assert_eq!(content, "ab~cd");
        assert_eq!(span.offset, 0);
        assert_eq!(span.end_offset, 5);
    }

    #[test]
    fn strikethrough_requires_config() {
        let config = ParseConfig::builder().strikethrough(true).build();
        let inlines = parse_with("~~gone~~", &config);
        assert!(matches!(inlines[0], Inline::Strikethrough { .. }));

        let inlines = parse("~~gone~~");
        assert_eq!(text_of(&inlines[0]), "~~gone~~");
    }

    #[test]
    fn math_requires_config() {
        let config = ParseConfig::builder().math(true).build();
        let inlines = parse_with("$e^x$", &config);
        assert!(matches!(&inlines[0], Inline::Math { content, .. } if content == "e^x"));

        let inlines = parse("$e^x$");
        assert_eq!(text_of(&inlines[0]), "$e^x$");
    }

    #[test]
    fn footnote_ref_requires_config() {
        let config = ParseConfig::builder().footnotes(true).build();
        let inlines = parse_with("see [^1]", &config);
        assert!(matches!(
            &inlines[1],
            Inline::FootnoteRef { identifier, .. } if identifier == "1"
        ));
    }

    #[test]
    fn autolink_requires_config() {
        let config = ParseConfig::builder().autolinks(true).build();
        let inlines = parse_with("<https://example.com>", &config);
        assert!(matches!(inlines[0], Inline::Link { .. }));
    }

    #[test]
    fn role_parses_without_config() {
        let inlines = parse("{kbd}`Ctrl+C`");
        assert!(matches!(&inlines[0], Inline::Role { name, .. } if name == "kbd"));
    }
}
