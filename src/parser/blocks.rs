/// Container and leaf collectors: indented code, block quotes, footnote
/// definitions, directives, and GFM tables.
///
/// Containers gather their dedented body text and hand it to
/// [`Parser::sub_parse`], so arbitrary nesting falls out of the same
/// pipeline that parses the top level.
use super::{inline, paragraphish, Parser};
use crate::ast::{Alignment, Block, TableCell, TableRow};
use crate::directives::{DirectiveInput, DirectiveOptions};
use crate::error::Result;
use crate::lexer::TokenKind;
use crate::location::Span;

impl Parser<'_, '_> {
    pub(super) fn parse_indented_code(&mut self, out: &mut Vec<Block>) {
        let start = self.current().span;
        let mut end = start;
        let mut lines: Vec<String> = Vec::new();
        loop {
            let tok = self.current().clone();
            match tok.kind {
                TokenKind::IndentedCodeLine { content } => {
                    lines.push(content);
                    end = tok.span;
                    self.pos += 1;
                }
                TokenKind::BlankLine => {
                    // Interior blanks stay in the block; trailing ones don't.
                    let mut j = self.pos;
                    while self.tokens[j].is_blank() {
                        j += 1;
                    }
                    if !matches!(self.tokens[j].kind, TokenKind::IndentedCodeLine { .. }) {
                        break;
                    }
                    for _ in self.pos..j {
                        lines.push(String::new());
                    }
                    self.pos = j;
                }
                _ => break,
            }
        }
        let mut code = lines.join("\n");
        code.push('\n');
        out.push(Block::IndentedCode {
            code,
            span: start.span_to(end),
        });
    }

    pub(super) fn parse_block_quote(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let start = self.current().span;
        let mut end = start;
        let mut lines: Vec<String> = Vec::new();
        let mut lazy_ok = false;
        loop {
            let tok = self.current().clone();
            match tok.kind {
                TokenKind::QuoteLine { content } => {
                    lazy_ok = paragraphish(&content);
                    lines.push(content);
                    end = tok.span;
                    self.pos += 1;
                }
                // Lazy continuation: an unmarked line keeps the quote's open
                // paragraph going.
                TokenKind::ParagraphLine { content } if lazy_ok => {
                    lines.push(content);
                    end = tok.span;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let children = self.sub_parse(&lines.join("\n"))?;
        out.push(Block::BlockQuote {
            children,
            span: start.span_to(end),
        });
        Ok(())
    }

    pub(super) fn parse_footnote_def(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let tok = self.current().clone();
        let TokenKind::FootnoteDef {
            identifier,
            content,
        } = tok.kind
        else {
            self.pos += 1;
            return Ok(());
        };
        self.pos += 1;
        let start = tok.span;
        let mut end = tok.span;
        let mut lines = vec![content];

        loop {
            let cur = self.current().clone();
            match cur.kind {
                // Indented continuation lines, 4 columns already stripped.
                TokenKind::IndentedCodeLine { content } => {
                    lines.push(content);
                    end = cur.span;
                    self.pos += 1;
                }
                TokenKind::ParagraphLine { content }
                    if lines.last().map_or(false, |l| !l.is_empty()) =>
                {
                    lines.push(content);
                    end = cur.span;
                    self.pos += 1;
                }
                TokenKind::BlankLine => {
                    let mut j = self.pos;
                    while self.tokens[j].is_blank() {
                        j += 1;
                    }
                    if self.tokens[j].line_indent < 4 || self.tokens[j].is_eof() {
                        break;
                    }
                    for _ in self.pos..j {
                        lines.push(String::new());
                    }
                    self.pos = j;
                }
                _ => break,
            }
        }

        let children = self.sub_parse(&lines.join("\n"))?;
        out.push(Block::FootnoteDef {
            identifier,
            children,
            span: start.span_to(end),
        });
        Ok(())
    }

    pub(super) fn parse_directive(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let tok = self.current().clone();
        let TokenKind::Directive { name, title, body } = tok.kind else {
            self.pos += 1;
            return Ok(());
        };
        self.pos += 1;

        let (options, rest) = extract_options(&body);
        let children = self.sub_parse_with_parent(&rest, Some(name.clone()))?;
        let handler = self
            .config
            .directive_registry
            .as_ref()
            .and_then(|registry| registry.get(&name))
            .cloned();

        if self.config.strict_contracts {
            if let Some(handler) = &handler {
                if let Some(contract) = handler.contract() {
                    contract
                        .check_parent(&name, self.directive_parent.as_deref(), tok.span.line)
                        .map_err(|e| e.with_source_file(self.source_file.as_deref()))?;
                    contract
                        .check_children(&name, &children, tok.span.line)
                        .map_err(|e| e.with_source_file(self.source_file.as_deref()))?;
                }
            }
        }

        let raw_content = handler
            .as_ref()
            .filter(|h| h.preserves_raw_content())
            .map(|_| body.clone());
        let input = DirectiveInput {
            name,
            title,
            options,
            children,
            raw_content,
            span: tok.span,
        };
        let block = match handler {
            Some(handler) => handler.parse(input)?,
            None => input.into_block(),
        };
        out.push(block);
        Ok(())
    }

    pub(super) fn build_table(
        &self,
        lines: &[(String, Span)],
        alignments: Vec<Option<Alignment>>,
    ) -> Block {
        let start = lines[0].1;
        let mut end = lines[1].1;
        let head = vec![self.table_row(&lines[0].0, lines[0].1, &alignments, true)];
        let mut body = Vec::new();
        for (text, span) in &lines[2..] {
            body.push(self.table_row(text, *span, &alignments, false));
            end = *span;
        }
        Block::Table {
            head,
            body,
            alignments,
            span: start.span_to(end),
        }
    }

    fn table_row(
        &self,
        text: &str,
        span: Span,
        alignments: &[Option<Alignment>],
        is_header: bool,
    ) -> TableRow {
        let mut cells = split_row(text);
        // Rows are normalized to the delimiter row's column count.
        cells.resize(alignments.len(), String::new());
        let cells = cells
            .into_iter()
            .zip(alignments)
            .map(|(cell, align)| TableCell {
                children: inline::parse_inlines(cell.trim(), &self.inline_cx(span)),
                align: *align,
                span,
            })
            .collect();
        TableRow {
            cells,
            is_header,
            span,
        }
    }
}

/// Leading `:key: value` lines of a directive body, plus the remaining
/// content with one separating blank line dropped.
pub(crate) fn extract_options(body: &str) -> (DirectiveOptions, String) {
    let mut options = DirectiveOptions::new();
    let mut offset = 0;
    for line in body.split('\n') {
        let Some((key, value)) = parse_option_line(line.trim()) else {
            break;
        };
        options.insert(key, value);
        offset = (offset + line.len() + 1).min(body.len());
    }
    let mut rest = &body[offset..];
    if !options.is_empty() {
        rest = rest.strip_prefix('\n').unwrap_or(rest);
    }
    (options, rest.to_string())
}

fn parse_option_line(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix(':')?;
    let colon = rest.find(':')?;
    let key = &rest[..colon];
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    Some((key, rest[colon + 1..].trim()))
}

/// Parses a table delimiter row like `| --- | :-: |` into per-column
/// alignments. Returns `None` when the line isn't a delimiter row.
pub(super) fn delimiter_row(line: &str) -> Option<Vec<Option<Alignment>>> {
    if !line.contains('|') {
        return None;
    }
    let cells = split_row(line);
    if cells.is_empty() {
        return None;
    }
    let mut alignments = Vec::with_capacity(cells.len());
    for cell in &cells {
        let cell = cell.trim();
        let (left, rest) = match cell.strip_prefix(':') {
            Some(rest) => (true, rest),
            None => (false, cell),
        };
        let (right, dashes) = match rest.strip_suffix(':') {
            Some(rest) => (true, rest),
            None => (false, rest),
        };
        if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
            return None;
        }
        alignments.push(match (left, right) {
            (true, true) => Some(Alignment::Center),
            (true, false) => Some(Alignment::Left),
            (false, true) => Some(Alignment::Right),
            (false, false) => None,
        });
    }
    Some(alignments)
}

/// Splits a table row into raw cell strings. Only `\|` is resolved here;
/// every other escape is left for the inline parser.
pub(super) fn split_row(line: &str) -> Vec<String> {
    let mut trimmed = line.trim();
    trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    if trimmed.ends_with('|') && !trimmed.ends_with("\\|") {
        trimmed = &trimmed[..trimmed.len() - 1];
    }

    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = trimmed.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some('|') => cell.push('|'),
                Some(next) => {
                    cell.push('\\');
                    cell.push(next);
                }
                None => cell.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cell)),
            _ => cell.push(ch),
        }
    }
    cells.push(cell);
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::plain_text;
    use crate::config::ParseConfig;
    use crate::directives::DirectiveRegistry;
    use crate::parser::parse_source;

    fn parse(source: &str) -> Vec<Block> {
        parse_with(source, &ParseConfig::default())
    }

    fn parse_with(source: &str, config: &ParseConfig) -> Vec<Block> {
        let doc = parse_source(source, config, None).unwrap();
        doc.children.iter().map(|b| (**b).clone()).collect()
    }

    #[test]
    fn row_splitting_handles_escaped_pipes() {
        assert_eq!(split_row("| a | b |"), vec![" a ", " b "]);
        assert_eq!(split_row("a|b"), vec!["a", "b"]);
        assert_eq!(split_row("a \\| b | c"), vec!["a | b ", " c"]);
    }

    #[test]
    fn delimiter_rows() {
        assert_eq!(delimiter_row("| --- | :-: |").map(|a| a.len()), Some(2));
        assert_eq!(
            delimiter_row("|:--|--:|"),
            Some(vec![Some(Alignment::Left), Some(Alignment::Right)])
        );
        assert_eq!(delimiter_row("| a | b |"), None);
        assert_eq!(delimiter_row("---"), None);
    }

    #[test]
    fn table_rows_are_normalized_to_column_count() {
        let config = ParseConfig::gfm();
        let blocks = parse_with("| a | b |\n| - | - |\n| only |\n| 1 | 2 | extra |\n", &config);
        let Block::Table { body, .. } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(body[0].cells.len(), 2);
        assert_eq!(plain_text(&body[0].cells[1].children), "");
        assert_eq!(body[1].cells.len(), 2);
        assert_eq!(plain_text(&body[1].cells[1].children), "2");
    }

    #[test]
    fn nested_block_quotes() {
        let blocks = parse("> outer\n> > inner\n");
        let Block::BlockQuote { children, .. } = &blocks[0] else {
            panic!("expected quote");
        };
        assert!(matches!(children[0], Block::Paragraph { .. }));
        assert!(matches!(children[1], Block::BlockQuote { .. }));
    }

    #[test]
    fn quote_lazy_continuation() {
        let blocks = parse("> first\nsecond\n");
        assert_eq!(blocks.len(), 1);
        let Block::BlockQuote { children, .. } = &blocks[0] else {
            panic!("expected quote");
        };
        let Block::Paragraph { children, .. } = &children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(plain_text(children), "first second");
    }

    #[test]
    fn quote_ends_at_blank_line() {
        let blocks = parse("> quoted\n\nplain\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Block::BlockQuote { .. }));
        assert!(matches!(blocks[1], Block::Paragraph { .. }));
    }

    #[test]
    fn indented_code_keeps_interior_blanks() {
        let blocks = parse("    a\n\n    b\n");
        let Block::IndentedCode { code, .. } = &blocks[0] else {
            panic!("expected code, got {:?}", blocks[0]);
        };
        assert_eq!(code, "a\n\nb\n");
    }

    #[test]
    fn footnote_definition_with_continuation() {
        let config = ParseConfig::builder().footnotes(true).build();
        let blocks = parse_with("[^note]: first line\n    second line\n", &config);
        let Block::FootnoteDef {
            identifier,
            children,
            ..
        } = &blocks[0]
        else {
            panic!("expected footnote def, got {:?}", blocks[0]);
        };
        assert_eq!(identifier, "note");
        let Block::Paragraph { children, .. } = &children[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(plain_text(children), "first line second line");
    }

    #[test]
    fn option_extraction() {
        let (options, rest) = extract_options(":class: tip\n:open:\n\nBody here");
        assert_eq!(options.get("class"), Some("tip"));
        assert_eq!(options.get_bool("open"), Some(true));
        assert_eq!(rest, "Body here");

        let (options, rest) = extract_options("no options");
        assert!(options.is_empty());
        assert_eq!(rest, "no options");
    }

    #[test]
    fn directive_body_is_parsed_as_markdown() {
        let blocks = parse(":::{note} Watch out\n:class: compact\n\nSome **bold** text\n:::\n");
        let Block::Directive {
            name,
            title,
            options,
            children,
            ..
        } = &blocks[0]
        else {
            panic!("expected directive, got {:?}", blocks[0]);
        };
        assert_eq!(name, "note");
        assert_eq!(title.as_deref(), Some("Watch out"));
        assert_eq!(options.get("class"), Some("compact"));
        assert!(matches!(children[0], Block::Paragraph { .. }));
    }

    #[test]
    fn unknown_directive_still_parses() {
        let config = ParseConfig::builder()
            .directive_registry(DirectiveRegistry::with_defaults())
            .build();
        let blocks = parse_with(":::{custom-thing}\nbody\n:::\n", &config);
        assert!(matches!(&blocks[0], Block::Directive { name, .. } if name == "custom-thing"));
    }

    #[test]
    fn contract_violations_ignored_without_strict_mode() {
        let config = ParseConfig::builder()
            .directive_registry(DirectiveRegistry::with_defaults())
            .build();
        let blocks = parse_with(":::{tab-item} Orphan\nbody\n:::\n", &config);
        assert!(matches!(blocks[0], Block::Directive { .. }));
    }
}
