/// Abstract Syntax Tree definitions for Markdown documents.
///
/// The AST is a typed, immutable tree: parsing produces it once and nothing
/// mutates it afterwards, which makes documents safe to share across threads
/// and lets the incremental reparser reuse whole subtrees between parses.
/// Top-level blocks sit behind an [`Arc`] so an untouched block survives an
/// incremental reparse as the same allocation, not a copy.
///
/// All nodes carry a [`Span`] back into the source. Fenced code blocks are
/// zero-copy: they store byte offsets into the source instead of an owned
/// string (see [`Block::FencedCode`]).
use crate::directives::DirectiveOptions;
use crate::location::Span;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Root node of a parsed Markdown document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub children: Vec<Arc<Block>>,
    pub span: Span,
}

impl Document {
    pub fn new(children: Vec<Block>, span: Span) -> Self {
        Self {
            children: children.into_iter().map(Arc::new).collect(),
            span,
        }
    }

    /// Builds a document from blocks that may already be shared with an
    /// earlier parse.
    pub fn from_shared(children: Vec<Arc<Block>>, span: Span) -> Self {
        Self { children, span }
    }
}

/// Heading syntax used in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingStyle {
    Atx,
    Setext,
}

/// Column alignment in a GFM table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Block-level AST nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Block {
    /// ATX (`# Heading`) or setext (`Heading\n===`) heading.
    ///
    /// `explicit_id` holds an anchor from the `## Title {#custom-id}` syntax.
    Heading {
        level: u8,
        children: Vec<Inline>,
        style: HeadingStyle,
        explicit_id: Option<String>,
        span: Span,
    },
    Paragraph {
        children: Vec<Inline>,
        span: Span,
    },
    /// Fenced code block referencing the original source by byte range.
    ///
    /// For nested contexts (code inside a block quote or list item) the
    /// offsets would point into a sub-parser's slice, so the actual text is
    /// stored in `content_override` instead. Use [`Block::fenced_code_text`]
    /// to extract the content either way.
    FencedCode {
        source_start: usize,
        source_end: usize,
        info: Option<String>,
        marker: char,
        fence_indent: usize,
        content_override: Option<String>,
        span: Span,
    },
    /// Indented code block (4+ spaces of indent).
    IndentedCode { code: String, span: Span },
    BlockQuote {
        children: Vec<Block>,
        span: Span,
    },
    List {
        items: Vec<ListItem>,
        ordered: bool,
        start: u64,
        tight: bool,
        span: Span,
    },
    ThematicBreak { span: Span },
    /// Raw HTML block, passed through verbatim.
    HtmlBlock { html: String, span: Span },
    /// GFM table. `alignments` has one entry per column.
    Table {
        head: Vec<TableRow>,
        body: Vec<TableRow>,
        alignments: Vec<Option<Alignment>>,
        span: Span,
    },
    /// `$$ ... $$` display math.
    MathBlock { content: String, span: Span },
    /// `[^id]: content` footnote definition.
    FootnoteDef {
        identifier: String,
        children: Vec<Block>,
        span: Span,
    },
    /// `:::{name}` block directive with parsed options and body.
    Directive {
        name: String,
        title: Option<String>,
        options: DirectiveOptions,
        children: Vec<Block>,
        raw_content: Option<String>,
        span: Span,
    },
}

impl Block {
    pub fn span(&self) -> Span {
        match self {
            Block::Heading { span, .. }
            | Block::Paragraph { span, .. }
            | Block::FencedCode { span, .. }
            | Block::IndentedCode { span, .. }
            | Block::BlockQuote { span, .. }
            | Block::List { span, .. }
            | Block::ThematicBreak { span }
            | Block::HtmlBlock { span, .. }
            | Block::Table { span, .. }
            | Block::MathBlock { span, .. }
            | Block::FootnoteDef { span, .. }
            | Block::Directive { span, .. } => *span,
        }
    }

    /// Extracts the content of a fenced code block against its source.
    ///
    /// Strips up to `fence_indent` leading spaces from each content line, as
    /// CommonMark requires. Returns `None` for non-fence blocks.
    pub fn fenced_code_text(&self, source: &str) -> Option<String> {
        let Block::FencedCode {
            source_start,
            source_end,
            fence_indent,
            content_override,
            ..
        } = self
        else {
            return None;
        };

        let raw = match content_override {
            Some(text) => text.as_str(),
            None => source.get(*source_start..*source_end)?,
        };

        if *fence_indent == 0 {
            return Some(raw.to_string());
        }
        let stripped: Vec<&str> = raw
            .split('\n')
            .map(|line| {
                let spaces = line.len() - line.trim_start_matches(' ').len();
                &line[spaces.min(*fence_indent)..]
            })
            .collect();
        Some(stripped.join("\n"))
    }
}

/// A single list item. `checked` is set for task-list items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    pub children: Vec<Block>,
    pub checked: Option<bool>,
    pub span: Span,
}

/// A table row: header rows live in `Table::head`, data rows in `Table::body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub cells: Vec<TableCell>,
    pub is_header: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCell {
    pub children: Vec<Inline>,
    pub align: Option<Alignment>,
    pub span: Span,
}

/// Inline-level AST nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Inline {
    Text { content: String, span: Span },
    Emphasis {
        children: Vec<Inline>,
        span: Span,
    },
    Strong {
        children: Vec<Inline>,
        span: Span,
    },
    Strikethrough {
        children: Vec<Inline>,
        span: Span,
    },
    Link {
        url: String,
        title: Option<String>,
        children: Vec<Inline>,
        span: Span,
    },
    Image {
        url: String,
        alt: String,
        title: Option<String>,
        span: Span,
    },
    CodeSpan { code: String, span: Span },
    /// Hard line break (backslash-newline or two trailing spaces).
    LineBreak { span: Span },
    /// Soft line break (plain newline inside a paragraph).
    SoftBreak { span: Span },
    HtmlInline { html: String, span: Span },
    /// `$expression$` inline math.
    Math { content: String, span: Span },
    /// `{name}` + backtick content, e.g. `{kbd}` shortcuts.
    Role {
        name: String,
        content: String,
        target: Option<String>,
        span: Span,
    },
    /// `[^id]` footnote reference.
    FootnoteRef { identifier: String, span: Span },
}

impl Inline {
    pub fn span(&self) -> Span {
        match self {
            Inline::Text { span, .. }
            | Inline::Emphasis { span, .. }
            | Inline::Strong { span, .. }
            | Inline::Strikethrough { span, .. }
            | Inline::Link { span, .. }
            | Inline::Image { span, .. }
            | Inline::CodeSpan { span, .. }
            | Inline::LineBreak { span }
            | Inline::SoftBreak { span }
            | Inline::HtmlInline { span, .. }
            | Inline::Math { span, .. }
            | Inline::Role { span, .. }
            | Inline::FootnoteRef { span, .. } => *span,
        }
    }
}

/// Flattens inlines into their plain-text content.
///
/// Used for image alt text and explicit heading anchors.
pub fn plain_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    collect_plain_text(inlines, &mut out);
    out
}

fn collect_plain_text(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text { content, .. } => out.push_str(content),
            Inline::CodeSpan { code, .. } => out.push_str(code),
            Inline::Math { content, .. } => out.push_str(content),
            Inline::Emphasis { children, .. }
            | Inline::Strong { children, .. }
            | Inline::Strikethrough { children, .. }
            | Inline::Link { children, .. } => collect_plain_text(children, out),
            Inline::Image { alt, .. } => out.push_str(alt),
            Inline::LineBreak { .. } | Inline::SoftBreak { .. } => out.push(' '),
            Inline::Role { content, .. } => out.push_str(content),
            Inline::HtmlInline { .. } | Inline::FootnoteRef { .. } => {}
        }
    }
}

/// Visitor for walking the AST without consuming it.
///
/// Default implementations recurse into children; override the hooks you
/// care about.
pub trait Visitor {
    fn visit_document(&mut self, doc: &Document) {
        for block in &doc.children {
            self.visit_block(block);
        }
    }

    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_inline(&mut self, _inline: &Inline) {}
}

/// Recurses into a block's children, calling the visitor on each.
pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &Block) {
    match block {
        Block::Heading { children, .. } | Block::Paragraph { children, .. } => {
            for inline in children {
                visitor.visit_inline(inline);
            }
        }
        Block::BlockQuote { children, .. }
        | Block::FootnoteDef { children, .. }
        | Block::Directive { children, .. } => {
            for child in children {
                visitor.visit_block(child);
            }
        }
        Block::List { items, .. } => {
            for item in items {
                for child in &item.children {
                    visitor.visit_block(child);
                }
            }
        }
        Block::Table { head, body, .. } => {
            for row in head.iter().chain(body.iter()) {
                for cell in &row.cells {
                    for inline in &cell.children {
                        visitor.visit_inline(inline);
                    }
                }
            }
        }
        Block::FencedCode { .. }
        | Block::IndentedCode { .. }
        | Block::ThematicBreak { .. }
        | Block::HtmlBlock { .. }
        | Block::MathBlock { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(content: &str) -> Inline {
        Inline::Text {
            content: content.to_string(),
            span: Span::unknown(),
        }
    }

    #[test]
    fn plain_text_flattens_nested_inlines() {
        let inlines = vec![
            text("a "),
            Inline::Strong {
                children: vec![text("b")],
                span: Span::unknown(),
            },
            Inline::CodeSpan {
                code: "c".to_string(),
                span: Span::unknown(),
            },
        ];
        assert_eq!(plain_text(&inlines), "a bc");
    }

    #[test]
    fn fenced_code_text_strips_fence_indent() {
        let source = "  ```\n  code\n    more\n  ```\n";
        let block = Block::FencedCode {
            source_start: 6,
            source_end: 22,
            info: None,
            marker: '`',
            fence_indent: 2,
            content_override: None,
            span: Span::unknown(),
        };
        assert_eq!(
            block.fenced_code_text(source).as_deref(),
            Some("code\n  more\n")
        );
    }

    #[test]
    fn fenced_code_text_prefers_override() {
        let block = Block::FencedCode {
            source_start: 0,
            source_end: 0,
            info: Some("rust".to_string()),
            marker: '`',
            fence_indent: 0,
            content_override: Some("let x = 1;\n".to_string()),
            span: Span::unknown(),
        };
        assert_eq!(
            block.fenced_code_text("unrelated").as_deref(),
            Some("let x = 1;\n")
        );
    }

    #[test]
    fn visitor_reaches_nested_inlines() {
        struct Counter(usize);
        impl Visitor for Counter {
            fn visit_inline(&mut self, _: &Inline) {
                self.0 += 1;
            }
        }

        let doc = Document::new(
            vec![Block::BlockQuote {
                children: vec![Block::Paragraph {
                    children: vec![text("x"), text("y")],
                    span: Span::unknown(),
                }],
                span: Span::unknown(),
            }],
            Span::unknown(),
        );
        let mut counter = Counter(0);
        counter.visit_document(&doc);
        assert_eq!(counter.0, 2);
    }
}
