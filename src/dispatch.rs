/// Complexity classification and fast-path dispatch.
///
/// [`classify`] grades a document by how much block structure it carries:
///
/// * `UltraSimple`: paragraph lines and blanks only, no block decisions.
/// * `Simple`: leaf blocks (headings, fences, HTML, thematic breaks, math)
///   but no containers and no indented code.
/// * `Moderate`: exactly one container kind, nothing indented past 4
///   columns.
/// * `Complex`: multiple container kinds, or indentation past 4 columns.
///
/// Routing is keyed separately, on what a cheap pipeline can reproduce
/// exactly: markup-free prose is assembled straight from the lines without
/// lexing, and streams holding exactly one of ATX headings, HTML blocks or
/// indented code go to a pattern parser keyed by the token set. Everything
/// else takes the full block/inline parser. Every fast path is
/// semantics-preserving; when in doubt it bails to the next level down.
use crate::ast::{Block, Document, HeadingStyle, Inline};
use crate::config::ParseConfig;
use crate::error::Result;
use crate::lexer::{self, Token, TokenKind};
use crate::location::Span;
use crate::parser;
use crate::parser::inline::{links::LinkRefMap, parse_inlines, InlineContext};

/// How much block structure a document carries, least to most.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Complexity {
    /// Paragraph lines and blanks only.
    UltraSimple,
    /// Leaf blocks, no containers, no indented code.
    Simple,
    /// A single container kind with indentation of at most 4 columns.
    Moderate,
    /// Multiple container kinds or deeper indentation.
    Complex,
}

/// Classifies an input without parsing it.
pub fn classify(source: &str, config: &ParseConfig) -> Complexity {
    classify_tokens(&lexer::tokenize(source, config))
}

fn classify_tokens(tokens: &[Token]) -> Complexity {
    // Bitset of container kinds seen: list, quote, directive, footnote.
    let mut container_kinds = 0u8;
    let mut has_nesting = false;
    let mut has_leaf = false;
    let mut max_indent = 0;

    for token in tokens {
        max_indent = max_indent.max(token.line_indent);
        match &token.kind {
            TokenKind::ListItem { .. } => container_kinds |= 1,
            TokenKind::QuoteLine { .. } => container_kinds |= 1 << 1,
            TokenKind::Directive { .. } => container_kinds |= 1 << 2,
            TokenKind::FootnoteDef { .. } => container_kinds |= 1 << 3,
            TokenKind::IndentedCodeLine { .. } => has_nesting = true,
            TokenKind::ThematicBreak
            | TokenKind::AtxHeading { .. }
            | TokenKind::FencedCode { .. }
            | TokenKind::HtmlBlock { .. }
            | TokenKind::MathBlock { .. } => has_leaf = true,
            TokenKind::ParagraphLine { .. } | TokenKind::BlankLine | TokenKind::Eof => {}
        }
        if container_kinds.count_ones() > 1 || max_indent > 4 {
            return Complexity::Complex;
        }
    }

    if container_kinds == 0 && !has_nesting {
        if has_leaf {
            Complexity::Simple
        } else {
            Complexity::UltraSimple
        }
    } else if container_kinds.count_ones() == 1 {
        Complexity::Moderate
    } else {
        Complexity::Complex
    }
}

/// Parses a document, taking the cheapest route that is still exact.
pub(crate) fn parse_document(
    source: &str,
    config: &ParseConfig,
    source_file: Option<&str>,
) -> Result<Document> {
    if config.text_transformer.is_none() && ultra_fast_eligible(source) {
        return Ok(parse_ultra_fast(source));
    }
    let tokens = lexer::tokenize(source, config);
    if let Some(kind) = pattern_kind(&tokens) {
        return Ok(parse_pattern(source, config, &tokens, kind));
    }
    parser::parse_tokens(source, config, source_file, tokens)
}

/// Bytes whose presence anywhere in the input disqualifies the ultra-fast
/// path. Conservative: a false negative only costs a full parse.
const MARKUP_BYTES: &[u8] = b"\\`*_~[]<>&${}|!#=+-:";

fn ultra_fast_eligible(source: &str) -> bool {
    if source.bytes().any(|b| MARKUP_BYTES.contains(&b)) {
        return false;
    }
    for line in source.split('\n') {
        if line.starts_with(' ') || line.starts_with('\t') || line.ends_with(' ') {
            return false;
        }
        if line.bytes().next().map_or(false, |b| b.is_ascii_digit()) {
            return false;
        }
    }
    true
}

/// Paragraphs-only assembly for inputs with no markup at all.
fn parse_ultra_fast(source: &str) -> Document {
    let mut children = Vec::new();
    let mut inlines: Vec<Inline> = Vec::new();
    let mut para_start: Option<Span> = None;
    let mut para_end = 0;
    let mut offset = 0;
    let mut line_no = 0;

    for line in source.split('\n') {
        line_no += 1;
        let span = Span::new(line_no, 1, offset, offset + line.len());
        if line.trim().is_empty() {
            if let Some(start) = para_start.take() {
                inlines.pop(); // trailing soft break
                children.push(Block::Paragraph {
                    children: std::mem::take(&mut inlines),
                    span: Span::new(start.line, 1, start.offset, para_end),
                });
            }
        } else {
            // Inline spans carry the paragraph's first line, matching the
            // inline engine's positioning.
            let base_line = para_start.get_or_insert(span).line;
            para_end = span.end_offset;
            inlines.push(Inline::Text {
                content: line.to_string(),
                span: Span::new(base_line, 1, span.offset, span.end_offset),
            });
            inlines.push(Inline::SoftBreak {
                span: Span::new(base_line, 1, span.end_offset, span.end_offset + 1),
            });
        }
        offset += line.len() + 1;
    }
    if let Some(start) = para_start {
        inlines.pop();
        children.push(Block::Paragraph {
            children: inlines,
            span: Span::new(start.line, 1, start.offset, para_end),
        });
    }

    Document::new(children, Span::new(1, 1, 0, source.len()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Headings,
    Html,
    IndentedCode,
}

/// A token stream qualifies for a pattern parser when it holds exactly one
/// simple construct kind plus blanks. Paragraph lines never qualify: they
/// can hide setext headings, tables, and reference definitions. Fenced
/// code does not either; its content slicing belongs to the full parser.
fn pattern_kind(tokens: &[Token]) -> Option<PatternKind> {
    let mut kind: Option<PatternKind> = None;
    for token in tokens {
        let this = match &token.kind {
            TokenKind::BlankLine | TokenKind::Eof => continue,
            TokenKind::AtxHeading { .. } => PatternKind::Headings,
            TokenKind::HtmlBlock { .. } => PatternKind::Html,
            TokenKind::IndentedCodeLine { .. } => PatternKind::IndentedCode,
            _ => return None,
        };
        match kind {
            None => kind = Some(this),
            Some(existing) if existing == this => {}
            Some(_) => return None,
        }
    }
    kind
}

fn parse_pattern(
    source: &str,
    config: &ParseConfig,
    tokens: &[Token],
    kind: PatternKind,
) -> Document {
    if kind == PatternKind::IndentedCode {
        return parse_indented_pattern(source, tokens);
    }

    let refs = LinkRefMap::new();
    let mut children = Vec::new();
    for token in tokens {
        match &token.kind {
            TokenKind::AtxHeading {
                level,
                content,
                explicit_id,
            } => {
                let cx = InlineContext {
                    config,
                    link_refs: &refs,
                    base: token.span,
                };
                children.push(Block::Heading {
                    level: *level,
                    children: parse_inlines(content, &cx),
                    style: HeadingStyle::Atx,
                    explicit_id: explicit_id.clone(),
                    span: token.span,
                });
            }
            TokenKind::HtmlBlock { html } => {
                children.push(Block::HtmlBlock {
                    html: html.clone(),
                    span: token.span,
                });
            }
            _ => {}
        }
    }
    Document::new(children, Span::new(1, 1, 0, source.len()))
}

/// Code lines and blanks only. Blank runs join two chunks into one block
/// exactly like the full parser's indented-code assembly; a trailing blank
/// run is dropped.
fn parse_indented_pattern(source: &str, tokens: &[Token]) -> Document {
    let mut children = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let TokenKind::IndentedCodeLine { content } = &tokens[i].kind else {
            i += 1;
            continue;
        };
        let start = tokens[i].span;
        let mut end = tokens[i].span;
        let mut lines = vec![content.clone()];
        i += 1;
        loop {
            match &tokens[i].kind {
                TokenKind::IndentedCodeLine { content } => {
                    lines.push(content.clone());
                    end = tokens[i].span;
                    i += 1;
                }
                TokenKind::BlankLine => {
                    let mut j = i;
                    while tokens[j].is_blank() {
                        j += 1;
                    }
                    if !matches!(tokens[j].kind, TokenKind::IndentedCodeLine { .. }) {
                        break;
                    }
                    for _ in i..j {
                        lines.push(String::new());
                    }
                    i = j;
                }
                _ => break,
            }
        }
        let mut code = lines.join("\n");
        code.push('\n');
        children.push(Block::IndentedCode {
            code,
            span: start.span_to(end),
        });
    }
    Document::new(children, Span::new(1, 1, 0, source.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::plain_text;
    use pretty_assertions::assert_eq;

    fn config() -> ParseConfig {
        ParseConfig::default()
    }

    #[test]
    fn pure_inline_classifies_ultra_simple() {
        assert_eq!(
            classify("just some words\n\nmore words\n", &config()),
            Complexity::UltraSimple
        );
        // Inline markup is still no block decision.
        assert_eq!(
            classify("some *emphasis*\n", &config()),
            Complexity::UltraSimple
        );
    }

    #[test]
    fn leaf_blocks_classify_simple() {
        assert_eq!(classify("# heading\n\npara\n", &config()), Complexity::Simple);
        assert_eq!(classify("```\ncode\n```\n", &config()), Complexity::Simple);
        assert_eq!(classify("---\n", &config()), Complexity::Simple);
    }

    #[test]
    fn single_container_kind_classifies_moderate() {
        assert_eq!(classify("- a\n- b\n", &config()), Complexity::Moderate);
        assert_eq!(classify("> quoted\n> more\n", &config()), Complexity::Moderate);
    }

    #[test]
    fn mixed_containers_or_deep_indent_classify_complex() {
        assert_eq!(classify("> quote\n\n- list\n", &config()), Complexity::Complex);
        assert_eq!(classify("- a\n        deep\n", &config()), Complexity::Complex);
        assert_eq!(classify("    indented\n", &config()), Complexity::Complex);
    }

    #[test]
    fn single_construct_streams_use_pattern_parsers() {
        let tokens = lexer::tokenize("# one\n\n## two\n", &config());
        assert_eq!(pattern_kind(&tokens), Some(PatternKind::Headings));

        let tokens = lexer::tokenize("    code\n", &config());
        assert_eq!(pattern_kind(&tokens), Some(PatternKind::IndentedCode));

        let tokens = lexer::tokenize("# one\n\npara\n", &config());
        assert_eq!(pattern_kind(&tokens), None);

        // Fenced code keeps its zero-copy slicing in the full parser.
        let tokens = lexer::tokenize("```\ncode\n```\n", &config());
        assert_eq!(pattern_kind(&tokens), None);
    }

    #[test]
    fn ultra_fast_matches_full_parser() {
        let source = "first paragraph\nsecond line\n\nnext paragraph\n";
        let fast = parse_ultra_fast(source);
        let full = parser::parse_source(source, &config(), None).unwrap();
        assert_eq!(fast, full);
    }

    #[test]
    fn heading_pattern_matches_full_parser() {
        let source = "# one\n\n## two words\n";
        let cfg = config();
        let tokens = lexer::tokenize(source, &cfg);
        let kind = pattern_kind(&tokens).unwrap();
        let fast = parse_pattern(source, &cfg, &tokens, kind);
        let full = parser::parse_source(source, &cfg, None).unwrap();
        assert_eq!(fast, full);
    }

    #[test]
    fn indented_code_pattern_matches_full_parser() {
        let source = "    one\n    two\n\n    after blank\n\n\n";
        let cfg = config();
        let tokens = lexer::tokenize(source, &cfg);
        let kind = pattern_kind(&tokens).unwrap();
        let fast = parse_pattern(source, &cfg, &tokens, kind);
        let full = parser::parse_source(source, &cfg, None).unwrap();
        assert_eq!(fast, full);
    }

    #[test]
    fn transformer_disables_the_paragraph_fast_path() {
        use std::sync::Arc;
        let cfg = ParseConfig::builder()
            .text_transformer(Arc::new(|s: &str| s.to_uppercase()))
            .build();
        let doc = parse_document("plain words\n", &cfg, None).unwrap();
        let Block::Paragraph { children, .. } = &*doc.children[0] else {
            panic!("expected paragraph, got {:?}", doc.children[0]);
        };
        assert_eq!(plain_text(children), "PLAIN WORDS");
    }
}
