/// Token definitions for the line-oriented lexer.
///
/// The lexer emits one token per source line for simple constructs, and one
/// accumulated token for multi-line constructs it owns a mode for (fenced
/// code, HTML blocks, math blocks, directives). Every token records the
/// byte span of the source it came from plus the expanded indent of its
/// line, which is all the block parser needs for container arithmetic.
use crate::location::Span;

/// Marker details for a list item line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMarkerInfo {
    /// True for `1.` / `1)` markers, false for `-`, `+`, `*`.
    pub ordered: bool,
    /// Bullet character, or the delimiter (`.` or `)`) for ordered lists.
    pub marker_char: char,
    /// Starting number for ordered lists (1 for bullets).
    pub start: u64,
    /// Width of the marker itself, without trailing spacing.
    pub marker_width: usize,
    /// Columns from line start to the item's content (marker + spacing).
    pub content_indent: usize,
    /// Text after the marker and its spacing. Empty for blank items.
    pub content: String,
}

/// What kind of line (or accumulated block) a token represents.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `---`, `***` or `___` with optional internal spaces.
    ThematicBreak,
    /// `# Heading` with the hashes and optional `{#id}` suffix stripped.
    AtxHeading {
        level: u8,
        content: String,
        explicit_id: Option<String>,
    },
    /// Complete fenced code block. Content is the byte range
    /// `content_start..content_end` of the source (zero-copy).
    FencedCode {
        info: Option<String>,
        marker: char,
        fence_indent: usize,
        content_start: usize,
        content_end: usize,
    },
    /// One line of an indented code block, with 4 columns of indent removed.
    IndentedCodeLine { content: String },
    /// Complete HTML block (CommonMark types 1-7), terminator included.
    HtmlBlock { html: String },
    /// Complete `$$ ... $$` math block, fences stripped.
    MathBlock { content: String },
    /// Complete `:::{name}` directive with its raw, unparsed body.
    Directive {
        name: String,
        title: Option<String>,
        body: String,
    },
    /// Block quote line with one `>` marker (and one following space) removed.
    QuoteLine { content: String },
    /// A list item's first line.
    ListItem { marker: ListMarkerInfo },
    /// `[^id]: content` footnote definition line.
    FootnoteDef { identifier: String, content: String },
    /// Ordinary text line. Paragraph content, setext candidates and link
    /// reference definitions all lex to this; the parser sorts them out.
    ParagraphLine { content: String },
    BlankLine,
    Eof,
}

/// One lexed token with its source span and line indent.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Leading whitespace of the line in columns, tabs expanded at 4-column
    /// stops.
    pub line_indent: usize,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line_indent: usize) -> Self {
        Self {
            kind,
            span,
            line_indent,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.kind, TokenKind::BlankLine)
    }

    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}
