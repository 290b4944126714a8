/// Two-phase block/inline parser.
///
/// Phase one walks the lexer's token stream and assembles block structure:
/// paragraphs, headings, containers, tables. Container bodies (block quotes,
/// list items, footnote definitions, directive bodies) are dedented and fed
/// through a sub-parser running the same pipeline, which is how nesting
/// bottoms out. Phase two is inline parsing, invoked once per leaf via
/// [`inline::parse_inlines`].
///
/// Link reference definitions are collected in a first pass over the tokens
/// so forward references resolve; the first definition of a label wins.
pub mod blocks;
pub mod inline;
pub mod list;

use crate::ast::{Block, Document, HeadingStyle};
use crate::config::ParseConfig;
use crate::error::Result;
use crate::lexer::{self, classify, Token, TokenKind};
use crate::location::Span;
use inline::links::{self, LinkRefMap};
use inline::InlineContext;

/// One block-parse run over a token stream.
pub(crate) struct Parser<'src, 'cfg> {
    source: &'src str,
    config: &'cfg ParseConfig,
    source_file: Option<String>,
    tokens: Vec<Token>,
    pos: usize,
    link_refs: LinkRefMap,
    /// Sub-parsers run over a dedented slice, so their fenced code offsets
    /// don't point into the real source. They store content inline instead.
    nested: bool,
    /// Name of the enclosing directive, for contract checks.
    directive_parent: Option<String>,
}

/// Lexes and parses a complete document.
pub(crate) fn parse_source(
    source: &str,
    config: &ParseConfig,
    source_file: Option<&str>,
) -> Result<Document> {
    let tokens = lexer::tokenize(source, config);
    parse_tokens(source, config, source_file, tokens)
}

/// Parses a document from an already-lexed token stream.
pub(crate) fn parse_tokens(
    source: &str,
    config: &ParseConfig,
    source_file: Option<&str>,
    tokens: Vec<Token>,
) -> Result<Document> {
    let mut parser = Parser {
        source,
        config,
        source_file: source_file.map(str::to_string),
        tokens,
        pos: 0,
        link_refs: LinkRefMap::new(),
        nested: false,
        directive_parent: None,
    };
    parser.run()
}

impl<'src, 'cfg> Parser<'src, 'cfg> {
    fn run(&mut self) -> Result<Document> {
        let children = self.run_blocks()?;
        let span = Span::new(1, 1, 0, self.source.len());
        Ok(Document::new(children, span))
    }

    fn run_blocks(&mut self) -> Result<Vec<Block>> {
        self.collect_link_refs();
        let mut children = Vec::new();
        while !self.current().is_eof() {
            self.next_block(&mut children)?;
        }
        Ok(children)
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn raw(&self, span: Span) -> &str {
        &self.source[span.offset..span.end_offset]
    }

    fn inline_cx(&self, base: Span) -> InlineContext<'_> {
        InlineContext {
            config: self.config,
            link_refs: &self.link_refs,
            base,
        }
    }

    /// First pass: register every link reference definition so later (and
    /// earlier) paragraphs can resolve them.
    fn collect_link_refs(&mut self) {
        let mut i = 0;
        let mut defs = Vec::new();
        while i < self.tokens.len() {
            if !matches!(self.tokens[i].kind, TokenKind::ParagraphLine { .. }) {
                i += 1;
                continue;
            }
            let mut chunk = String::new();
            while let TokenKind::ParagraphLine { content } = &self.tokens[i].kind {
                if !chunk.is_empty() {
                    chunk.push('\n');
                }
                chunk.push_str(&self.transform(content));
                i += 1;
            }
            let mut rest = chunk.as_str();
            while let Some((label, def, consumed)) = links::try_parse_ref_def(rest) {
                defs.push((label, def));
                if consumed == 0 {
                    break;
                }
                rest = &rest[consumed..];
            }
        }
        for (label, def) in defs {
            self.link_refs.entry(label).or_insert(def);
        }
    }

    fn transform(&self, line: &str) -> String {
        match &self.config.text_transformer {
            Some(f) => f(line),
            None => line.to_string(),
        }
    }

    fn next_block(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::BlankLine | TokenKind::Eof => {
                self.pos += 1;
            }
            TokenKind::ThematicBreak => {
                self.pos += 1;
                out.push(Block::ThematicBreak { span: token.span });
            }
            TokenKind::AtxHeading {
                level,
                content,
                explicit_id,
            } => {
                self.pos += 1;
                let children = inline::parse_inlines(&content, &self.inline_cx(token.span));
                out.push(Block::Heading {
                    level,
                    children,
                    style: HeadingStyle::Atx,
                    explicit_id,
                    span: token.span,
                });
            }
            TokenKind::FencedCode {
                info,
                marker,
                fence_indent,
                content_start,
                content_end,
            } => {
                self.pos += 1;
                let content_override = if self.nested {
                    Some(self.source[content_start..content_end].to_string())
                } else {
                    None
                };
                out.push(Block::FencedCode {
                    source_start: content_start,
                    source_end: content_end,
                    info,
                    marker,
                    fence_indent,
                    content_override,
                    span: token.span,
                });
            }
            TokenKind::HtmlBlock { html } => {
                self.pos += 1;
                out.push(Block::HtmlBlock {
                    html,
                    span: token.span,
                });
            }
            TokenKind::MathBlock { content } => {
                self.pos += 1;
                out.push(Block::MathBlock {
                    content,
                    span: token.span,
                });
            }
            TokenKind::IndentedCodeLine { .. } => self.parse_indented_code(out),
            TokenKind::QuoteLine { .. } => self.parse_block_quote(out)?,
            TokenKind::ListItem { .. } => self.parse_list(out)?,
            TokenKind::FootnoteDef { .. } => self.parse_footnote_def(out)?,
            TokenKind::Directive { .. } => self.parse_directive(out)?,
            TokenKind::ParagraphLine { .. } => self.parse_paragraph_chunk(out)?,
        }
        Ok(())
    }

    /// Gathers a run of paragraph lines, then sorts out what it really was:
    /// link reference definitions, setext headings, a table, or paragraphs.
    fn parse_paragraph_chunk(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let mut lines: Vec<(String, Span)> = Vec::new();
        while let TokenKind::ParagraphLine { content } = &self.current().kind {
            let span = self.current().span;
            lines.push((self.transform(content), span));
            self.pos += 1;
        }

        let mut i = 0;
        let mut para: Vec<(String, Span)> = Vec::new();
        while i < lines.len() {
            if para.is_empty() {
                let rest = join_lines(&lines[i..]);
                if let Some((label, def, consumed)) = links::try_parse_ref_def(&rest) {
                    self.link_refs.entry(label).or_insert(def);
                    let advanced = consumed_lines(&rest, consumed);
                    if advanced == 0 {
                        break;
                    }
                    i += advanced;
                    continue;
                }
            }

            let (text, span) = &lines[i];

            if !para.is_empty() {
                if let Some(level) = classify::setext_level(text) {
                    let content = std::mem::take(&mut para);
                    out.push(self.make_heading(level, content, *span));
                    i += 1;
                    continue;
                }
            }

            if para.is_empty() && self.config.tables && i + 1 < lines.len() {
                if let Some(alignments) = blocks::delimiter_row(&lines[i + 1].0) {
                    if blocks::split_row(&lines[i].0).len() == alignments.len() {
                        let table = self.build_table(&lines[i..], alignments);
                        out.push(table);
                        break;
                    }
                }
            }

            para.push((text.clone(), *span));
            i += 1;
        }

        if !para.is_empty() {
            out.push(self.make_paragraph(para));
        }
        Ok(())
    }

    fn make_paragraph(&self, lines: Vec<(String, Span)>) -> Block {
        let span = lines_span(&lines);
        let text = join_lines(&lines);
        let children = inline::parse_inlines(&text, &self.inline_cx(span));
        Block::Paragraph { children, span }
    }

    fn make_heading(&self, level: u8, lines: Vec<(String, Span)>, underline: Span) -> Block {
        let content_span = lines_span(&lines);
        let span = content_span.span_to(underline);
        let text = join_lines(&lines);
        let (text, explicit_id) = classify::split_explicit_id(text.trim_end());
        let children = inline::parse_inlines(text, &self.inline_cx(content_span));
        Block::Heading {
            level,
            children,
            style: HeadingStyle::Setext,
            explicit_id,
            span,
        }
    }

    /// Re-parses dedented container content with a fresh parser sharing this
    /// parser's reference definitions.
    fn sub_parse(&mut self, text: &str) -> Result<Vec<Block>> {
        let parent = self.directive_parent.clone();
        self.sub_parse_with_parent(text, parent)
    }

    fn sub_parse_with_parent(
        &mut self,
        text: &str,
        directive_parent: Option<String>,
    ) -> Result<Vec<Block>> {
        let tokens = lexer::tokenize(text, self.config);
        let mut sub = Parser {
            source: text,
            config: self.config,
            source_file: self.source_file.clone(),
            tokens,
            pos: 0,
            link_refs: self.link_refs.clone(),
            nested: true,
            directive_parent,
        };
        let children = sub.run_blocks()?;
        // Definitions found inside the container become visible to blocks
        // parsed after it.
        for (label, def) in sub.link_refs {
            self.link_refs.entry(label).or_insert(def);
        }
        Ok(children)
    }
}

fn join_lines(lines: &[(String, Span)]) -> String {
    let mut out = String::new();
    for (idx, (text, _)) in lines.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(text);
    }
    out
}

/// Number of whole lines covered by `consumed` bytes of `text`.
fn consumed_lines(text: &str, consumed: usize) -> usize {
    let eaten = &text[..consumed];
    let newlines = eaten.matches('\n').count();
    if eaten.is_empty() || eaten.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

fn lines_span(lines: &[(String, Span)]) -> Span {
    match (lines.first(), lines.last()) {
        (Some((_, first)), Some((_, last))) => first.span_to(*last),
        _ => Span::unknown(),
    }
}

/// True when the line would lex as ordinary paragraph text; used for lazy
/// continuation decisions.
fn paragraphish(line: &str) -> bool {
    let trimmed = line.trim_start();
    !classify::is_blank(line)
        && !classify::is_thematic_break(trimmed)
        && classify::classify_atx(trimmed).is_none()
        && classify::classify_fence_open(trimmed).is_none()
        && classify::strip_quote_marker(trimmed).is_none()
        && classify::classify_list_marker(trimmed, 0).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Alignment, Inline};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Document {
        parse_with(source, &ParseConfig::default())
    }

    fn parse_with(source: &str, config: &ParseConfig) -> Document {
        parse_source(source, config, None).unwrap()
    }

    fn para_text(block: &Block) -> String {
        let Block::Paragraph { children, .. } = block else {
            panic!("expected paragraph, got {block:?}");
        };
        crate::ast::plain_text(children)
    }

    #[test]
    fn empty_document() {
        let doc = parse("");
        assert!(doc.children.is_empty());
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let doc = parse("one\ntwo\n\nthree\n");
        assert_eq!(doc.children.len(), 2);
        assert_eq!(para_text(&doc.children[0]), "one two");
        assert_eq!(para_text(&doc.children[1]), "three");
    }

    #[test]
    fn atx_and_setext_headings() {
        let doc = parse("# One\n\nTwo\n---\n");
        let Block::Heading { level, style, .. } = &*doc.children[0] else {
            panic!("expected heading");
        };
        assert_eq!(*level, 1);
        assert_eq!(*style, HeadingStyle::Atx);

        let Block::Heading { level, style, .. } = &*doc.children[1] else {
            panic!("expected setext heading, got {:?}", doc.children[1]);
        };
        assert_eq!(*level, 2);
        assert_eq!(*style, HeadingStyle::Setext);
    }

    #[test]
    fn setext_heading_keeps_explicit_id() {
        let doc = parse("Title {#anchor}\n===\n");
        let Block::Heading { explicit_id, .. } = &*doc.children[0] else {
            panic!("expected heading");
        };
        assert_eq!(explicit_id.as_deref(), Some("anchor"));
    }

    #[test]
    fn fenced_code_is_zero_copy_at_top_level() {
        let source = "```rust\nlet x = 1;\n```\n";
        let doc = parse(source);
        let block = &*doc.children[0];
        assert!(matches!(
            block,
            Block::FencedCode {
                content_override: None,
                ..
            }
        ));
        assert_eq!(block.fenced_code_text(source).as_deref(), Some("let x = 1;\n"));
    }

    #[test]
    fn nested_fence_carries_its_content() {
        let source = "> ```\n> code\n> ```\n";
        let doc = parse(source);
        let Block::BlockQuote { children, .. } = &*doc.children[0] else {
            panic!("expected quote, got {:?}", doc.children[0]);
        };
        assert_eq!(
            children[0].fenced_code_text(source).as_deref(),
            Some("code\n")
        );
    }

    #[test]
    fn link_reference_defined_after_use() {
        let doc = parse("[text][label]\n\n[label]: /url\n");
        assert_eq!(doc.children.len(), 1);
        let Block::Paragraph { children, .. } = &*doc.children[0] else {
            panic!("expected paragraph");
        };
        assert!(matches!(&children[0], Inline::Link { url, .. } if url == "/url"));
    }

    #[test]
    fn ref_def_chunk_produces_no_block() {
        let doc = parse("[a]: /one\n[b]: /two \"title\"\n");
        assert!(doc.children.is_empty(), "got {:?}", doc.children);
    }

    #[test]
    fn first_definition_wins() {
        let doc = parse("[a]: /first\n\n[a]: /second\n\n[a]\n");
        let last = doc.children.last().unwrap();
        let Block::Paragraph { children, .. } = &**last else {
            panic!("expected paragraph");
        };
        assert!(matches!(&children[0], Inline::Link { url, .. } if url == "/first"));
    }

    #[test]
    fn table_requires_config() {
        let source = "| a | b |\n| --- | :-: |\n| 1 | 2 |\n";
        let doc = parse(source);
        assert!(matches!(*doc.children[0], Block::Paragraph { .. }));

        let doc = parse_with(source, &ParseConfig::gfm());
        let Block::Table {
            head,
            body,
            alignments,
            ..
        } = &*doc.children[0]
        else {
            panic!("expected table, got {:?}", doc.children[0]);
        };
        assert_eq!(head.len(), 1);
        assert_eq!(body.len(), 1);
        assert_eq!(alignments, &vec![None, Some(Alignment::Center)]);
    }

    #[test]
    fn text_transformer_runs_before_inline_parsing() {
        use std::sync::Arc;
        let config = ParseConfig::builder()
            .text_transformer(Arc::new(|line: &str| line.replace("{{name}}", "world")))
            .build();
        let doc = parse_with("hello {{name}}\n", &config);
        assert_eq!(para_text(&doc.children[0]), "hello world");
    }

    #[test]
    fn directive_parent_is_visible_to_children() {
        let source = ":::{tab-set}\n::::{tab-item} One\nbody\n::::\n:::\n";
        let config = ParseConfig::builder()
            .directive_registry(crate::directives::DirectiveRegistry::with_defaults())
            .strict_contracts(true)
            .build();
        assert!(parse_source(source, &config, None).is_ok());

        let orphan = ":::{tab-item} One\nbody\n:::\n";
        assert!(parse_source(orphan, &config, None).is_err());
    }
}
