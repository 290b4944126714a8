/// Line-oriented, mode-switching lexer.
///
/// The lexer scans the source one line window at a time and classifies each
/// line in block context. Multi-line constructs with their own content rules
/// (fenced code, HTML blocks, math blocks, directives) switch the lexer into
/// a dedicated mode that accumulates lines until the construct's close
/// condition fires, then emit a single token. Everything else is one token
/// per line; nesting is resolved later by the block parser.
///
/// The whole pass is O(n): each source byte is visited a bounded number of
/// times and no classification backtracks across lines.
pub mod classify;
pub mod html;
pub mod token;

pub use token::{ListMarkerInfo, Token, TokenKind};

use crate::config::ParseConfig;
use crate::location::Span;
use classify::FenceOpen;

#[derive(Debug)]
enum Mode {
    Block,
    Fence(FenceState),
    Html(HtmlState),
    Math(MathState),
    Directive(DirectiveState),
}

#[derive(Debug)]
struct FenceState {
    open: FenceOpen,
    fence_indent: usize,
    block_start: usize,
    start_line: usize,
    content_start: usize,
}

#[derive(Debug)]
struct HtmlState {
    kind: u8,
    block_start: usize,
    start_line: usize,
    indent: usize,
    content: String,
}

#[derive(Debug)]
struct MathState {
    block_start: usize,
    start_line: usize,
    lines: Vec<String>,
}

#[derive(Debug)]
struct DirectiveState {
    colons: usize,
    name: String,
    title: Option<String>,
    block_start: usize,
    start_line: usize,
    body: Vec<String>,
    /// Open nested directives inside the body.
    depth: usize,
}

/// Streaming tokenizer over one source string.
pub struct Lexer<'src, 'cfg> {
    source: &'src str,
    config: &'cfg ParseConfig,
    tokens: Vec<Token>,
    mode: Mode,
    line_no: usize,
    previous_line_blank: bool,
    in_paragraph: bool,
}

impl<'src, 'cfg> Lexer<'src, 'cfg> {
    pub fn new(source: &'src str, config: &'cfg ParseConfig) -> Self {
        Self {
            source,
            config,
            tokens: Vec::new(),
            mode: Mode::Block,
            line_no: 0,
            previous_line_blank: true,
            in_paragraph: false,
        }
    }

    /// Runs the lexer to completion, ending with an `Eof` token.
    ///
    /// CRLF line endings are normalized: a trailing `\r` is not part of any
    /// token's content or span.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut pos = 0;
        while pos < self.source.len() {
            let line_end = self.source[pos..]
                .find('\n')
                .map(|i| pos + i)
                .unwrap_or(self.source.len());
            let raw = &self.source[pos..line_end];
            let line = raw.strip_suffix('\r').unwrap_or(raw);
            self.line_no += 1;
            let next_start = (line_end + 1).min(self.source.len());
            self.scan_line(line, pos, pos + line.len(), next_start);
            pos = next_start;
        }
        self.finish_open_mode(self.source.len());

        let end = Span::new(self.line_no + 1, 1, self.source.len(), self.source.len());
        self.tokens.push(Token::new(TokenKind::Eof, end, 0));
        self.tokens
    }

    fn scan_line(&mut self, line: &str, line_start: usize, line_end: usize, next_start: usize) {
        match std::mem::replace(&mut self.mode, Mode::Block) {
            Mode::Block => self.scan_block_line(line, line_start, line_end, next_start),
            Mode::Fence(state) => self.continue_fence(state, line, line_start, line_end),
            Mode::Html(state) => self.continue_html(state, line, line_start, line_end, next_start),
            Mode::Math(state) => self.continue_math(state, line, line_end),
            Mode::Directive(state) => self.continue_directive(state, line, line_end),
        }
    }

    fn scan_block_line(&mut self, line: &str, line_start: usize, line_end: usize, next_start: usize) {
        let (indent, ws_bytes) = classify::measure_indent(line);
        let rest = &line[ws_bytes..];
        let span = self.line_span(line_start, line_end);

        if classify::is_blank(line) {
            self.push(TokenKind::BlankLine, span, indent);
            self.previous_line_blank = true;
            self.in_paragraph = false;
            return;
        }

        // 4+ columns of indent: code, unless it lazily continues a paragraph.
        if indent >= 4 {
            if self.in_paragraph {
                self.push_paragraph_line(rest, span, indent);
            } else {
                let content = strip_columns(line, 4);
                self.push(TokenKind::IndentedCodeLine { content }, span, indent);
                self.previous_line_blank = false;
            }
            return;
        }

        // Setext underline wins over thematic break and list markers while a
        // paragraph is open; the parser does the promotion.
        if self.in_paragraph && classify::setext_level(rest).is_some() {
            self.push_paragraph_line(rest, span, indent);
            return;
        }

        if classify::is_thematic_break(rest) {
            self.push(TokenKind::ThematicBreak, span, indent);
            self.end_paragraph();
            return;
        }

        if let Some((level, content, explicit_id)) = classify::classify_atx(rest) {
            self.push(
                TokenKind::AtxHeading {
                    level,
                    content,
                    explicit_id,
                },
                span,
                indent,
            );
            self.end_paragraph();
            return;
        }

        if let Some(open) = classify::classify_fence_open(rest) {
            self.mode = Mode::Fence(FenceState {
                open,
                fence_indent: indent,
                block_start: line_start,
                start_line: self.line_no,
                content_start: next_start,
            });
            self.end_paragraph();
            return;
        }

        if let Some(kind) = html::classify_html_open(rest, self.previous_line_blank) {
            // Type 7 never interrupts a paragraph.
            if !(kind == 7 && self.in_paragraph) {
                let mut content = line.to_string();
                content.push('\n');
                let state = HtmlState {
                    kind,
                    block_start: line_start,
                    start_line: self.line_no,
                    indent,
                    content,
                };
                if html::html_open_self_terminates(kind, rest) {
                    self.emit_html(state, line_end);
                } else {
                    self.mode = Mode::Html(state);
                }
                self.end_paragraph();
                return;
            }
        }

        if let Some(content) = classify::strip_quote_marker(rest) {
            self.push(
                TokenKind::QuoteLine {
                    content: content.to_string(),
                },
                span,
                indent,
            );
            self.end_paragraph();
            return;
        }

        if let Some(marker) = classify::classify_list_marker(rest, indent) {
            // Paragraph interruption: only non-empty items, and ordered
            // lists only when they start at 1.
            let interrupts =
                !marker.content.is_empty() && (!marker.ordered || marker.start == 1);
            if !self.in_paragraph || interrupts {
                self.push(TokenKind::ListItem { marker }, span, indent);
                self.end_paragraph();
                return;
            }
            self.push_paragraph_line(rest, span, indent);
            return;
        }

        if self.config.math && classify::is_math_fence(rest) {
            self.mode = Mode::Math(MathState {
                block_start: line_start,
                start_line: self.line_no,
                lines: Vec::new(),
            });
            self.end_paragraph();
            return;
        }

        if let Some((colons, name, title)) = classify::classify_directive_open(rest) {
            self.mode = Mode::Directive(DirectiveState {
                colons,
                name,
                title,
                block_start: line_start,
                start_line: self.line_no,
                body: Vec::new(),
                depth: 0,
            });
            self.end_paragraph();
            return;
        }

        if self.config.footnotes {
            if let Some((identifier, content)) = classify::classify_footnote_def(rest) {
                self.push(
                    TokenKind::FootnoteDef {
                        identifier,
                        content,
                    },
                    span,
                    indent,
                );
                self.end_paragraph();
                return;
            }
        }

        self.push_paragraph_line(rest, span, indent);
    }

    fn continue_fence(
        &mut self,
        state: FenceState,
        line: &str,
        line_start: usize,
        line_end: usize,
    ) {
        let (indent, ws_bytes) = classify::measure_indent(line);
        let rest = &line[ws_bytes..];
        if indent <= 3 && classify::is_fence_close(rest, state.open.marker, state.open.run) {
            self.emit_fence(state, line_start, line_end);
        } else {
            self.mode = Mode::Fence(state);
        }
    }

    fn emit_fence(&mut self, state: FenceState, close_start: usize, span_end: usize) {
        let content_end = state.content_start.max(close_start.min(self.source.len()));
        let span = Span::new(state.start_line, 1, state.block_start, span_end);
        self.tokens.push(Token::new(
            TokenKind::FencedCode {
                info: state.open.info,
                marker: state.open.marker,
                fence_indent: state.fence_indent,
                content_start: state.content_start,
                content_end,
            },
            span,
            state.fence_indent,
        ));
        self.previous_line_blank = false;
    }

    fn continue_html(
        &mut self,
        mut state: HtmlState,
        line: &str,
        line_start: usize,
        line_end: usize,
        next_start: usize,
    ) {
        match state.kind {
            6 | 7 if classify::is_blank(line) => {
                self.emit_html(state, line_start);
                // The blank line is not part of the block; process it normally.
                self.scan_block_line(line, line_start, line_end, next_start);
            }
            _ => {
                state.content.push_str(line);
                state.content.push('\n');
                if html::html_block_ends(state.kind, line) {
                    self.emit_html(state, line_end);
                } else {
                    self.mode = Mode::Html(state);
                }
            }
        }
    }

    fn emit_html(&mut self, state: HtmlState, span_end: usize) {
        let span = Span::new(
            state.start_line,
            1,
            state.block_start,
            span_end.max(state.block_start),
        );
        self.tokens.push(Token::new(
            TokenKind::HtmlBlock {
                html: state.content,
            },
            span,
            state.indent,
        ));
        self.previous_line_blank = false;
    }

    fn continue_math(&mut self, mut state: MathState, line: &str, line_end: usize) {
        let (_, ws_bytes) = classify::measure_indent(line);
        if classify::is_math_fence(&line[ws_bytes..]) {
            self.emit_math(state, line_end);
        } else {
            state.lines.push(line.to_string());
            self.mode = Mode::Math(state);
        }
    }

    fn emit_math(&mut self, state: MathState, span_end: usize) {
        let span = Span::new(state.start_line, 1, state.block_start, span_end);
        self.tokens.push(Token::new(
            TokenKind::MathBlock {
                content: state.lines.join("\n"),
            },
            span,
            0,
        ));
        self.previous_line_blank = false;
    }

    fn continue_directive(&mut self, mut state: DirectiveState, line: &str, line_end: usize) {
        let (_, ws_bytes) = classify::measure_indent(line);
        let rest = &line[ws_bytes..];
        if classify::classify_directive_open(rest).is_some() {
            state.depth += 1;
        } else if classify::is_directive_close(rest, 3) {
            if state.depth > 0 {
                state.depth -= 1;
            } else if classify::is_directive_close(rest, state.colons) {
                self.emit_directive(state, line_end);
                return;
            }
        }
        state.body.push(line.to_string());
        self.mode = Mode::Directive(state);
    }

    fn emit_directive(&mut self, state: DirectiveState, span_end: usize) {
        let span = Span::new(state.start_line, 1, state.block_start, span_end);
        self.tokens.push(Token::new(
            TokenKind::Directive {
                name: state.name,
                title: state.title,
                body: state.body.join("\n"),
            },
            span,
            0,
        ));
        self.previous_line_blank = false;
    }

    /// Closes whatever mode is still open at end of input.
    fn finish_open_mode(&mut self, source_len: usize) {
        match std::mem::replace(&mut self.mode, Mode::Block) {
            Mode::Block => {}
            Mode::Fence(state) => self.emit_fence(state, source_len, source_len),
            Mode::Html(state) => self.emit_html(state, source_len),
            Mode::Math(state) => self.emit_math(state, source_len),
            Mode::Directive(state) => self.emit_directive(state, source_len),
        }
    }

    fn push_paragraph_line(&mut self, rest: &str, span: Span, indent: usize) {
        self.push(
            TokenKind::ParagraphLine {
                content: rest.to_string(),
            },
            span,
            indent,
        );
        self.in_paragraph = true;
        self.previous_line_blank = false;
    }

    fn end_paragraph(&mut self) {
        self.in_paragraph = false;
        self.previous_line_blank = false;
    }

    fn push(&mut self, kind: TokenKind, span: Span, line_indent: usize) {
        self.tokens.push(Token::new(kind, span, line_indent));
    }

    fn line_span(&self, line_start: usize, line_end: usize) -> Span {
        Span::new(self.line_no, 1, line_start, line_end)
    }
}

/// Convenience wrapper: tokenize a full source string.
pub fn tokenize(source: &str, config: &ParseConfig) -> Vec<Token> {
    Lexer::new(source, config).tokenize()
}

/// Removes `cols` columns of leading whitespace, expanding tabs. A tab that
/// straddles the boundary is replaced by the spaces left over.
pub fn strip_columns(line: &str, cols: usize) -> String {
    let mut column = 0;
    for (idx, ch) in line.char_indices() {
        if column >= cols {
            return line[idx..].to_string();
        }
        match ch {
            ' ' => column += 1,
            '\t' => {
                let next = (column / 4 + 1) * 4;
                if next > cols {
                    let mut out = " ".repeat(next - cols);
                    out.push_str(&line[idx + 1..]);
                    return out;
                }
                column = next;
            }
            _ => return line[idx..].to_string(),
        }
    }
    String::new()
}
