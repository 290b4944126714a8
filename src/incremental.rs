/// Incremental reparsing.
///
/// Given the previous [`Document`], the old and new source, and the edit
/// that turned one into the other, [`reparse`] rebuilds only the top-level
/// blocks the edit touched. Blocks before the edit are reused untouched;
/// blocks after it are reused with their spans shifted by the edit's byte
/// and line deltas. The touched window (plus one block of slack on each
/// side) is run through the regular pipeline and spliced in.
///
/// The engine is deliberately conservative: whenever the edit could change
/// structure outside its window it falls back to a full parse. That covers
/// fence and directive markers (an unclosed fence swallows the rest of the
/// document), link reference and footnote definitions (they bind globally),
/// and windows that aren't isolated by blank lines.
use crate::ast::{Block, Document, Inline, ListItem, TableCell, TableRow};
use crate::config::ParseConfig;
use crate::dispatch;
use crate::error::{MarklyError, Result};
use crate::location::Span;
use std::sync::Arc;

/// A single contiguous text replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    /// Byte offset where the change begins (same in old and new text).
    pub start: usize,
    /// End of the replaced range in the old text.
    pub old_end: usize,
    /// End of the replacement in the new text.
    pub new_end: usize,
}

impl Edit {
    pub fn new(start: usize, old_end: usize, new_end: usize) -> Self {
        Self {
            start,
            old_end,
            new_end,
        }
    }

    /// Insertion of `len` bytes at `offset`.
    pub fn insertion(offset: usize, len: usize) -> Self {
        Self::new(offset, offset, offset + len)
    }

    /// Deletion of `len` bytes at `offset`.
    pub fn deletion(offset: usize, len: usize) -> Self {
        Self::new(offset, offset + len, offset)
    }

    /// Net change in document length.
    pub fn delta(&self) -> isize {
        self.new_end as isize - self.old_end as isize
    }
}

/// Markers that can change structure beyond the edited window.
const GLOBAL_MARKERS: &[&str] = &["```", "~~~", "$$", ":::", "[^", "]:"];

/// Reparses `new_source` reusing as much of `previous` as possible.
///
/// Produces the same AST a full parse of `new_source` would, up to the
/// line numbers inside reused subtrees, which are shifted arithmetically.
pub fn reparse(
    previous: &Document,
    old_source: &str,
    new_source: &str,
    edit: Edit,
    config: &ParseConfig,
) -> Result<Document> {
    if edit.start > edit.old_end || edit.old_end > old_source.len() || edit.new_end > new_source.len()
    {
        return Err(MarklyError::InvalidDocument {
            message: "edit range is out of bounds".to_string(),
        });
    }
    if old_source.len() as isize + edit.delta() != new_source.len() as isize {
        return Err(MarklyError::InvalidDocument {
            message: "edit delta does not match source lengths".to_string(),
        });
    }

    match try_reparse(previous, old_source, new_source, edit, config) {
        Some(result) => result,
        None => dispatch::parse_document(new_source, config, None),
    }
}

/// The incremental path proper; `None` means fall back to a full parse.
fn try_reparse(
    previous: &Document,
    old_source: &str,
    new_source: &str,
    edit: Edit,
    config: &ParseConfig,
) -> Option<Result<Document>> {
    let blocks = &previous.children;
    if blocks.is_empty() {
        return None;
    }

    // Blocks overlapping the edit, widened by one byte so edits touching a
    // block boundary catch both sides.
    let lo = edit.start.saturating_sub(1);
    let hi = edit.old_end + 1;
    let mut first = None;
    let mut last = None;
    for (idx, block) in blocks.iter().enumerate() {
        if block.span().overlaps(lo, hi) {
            first.get_or_insert(idx);
            last = Some(idx);
        }
    }
    let (first, last) = (first?, last?);

    // One block of slack on each side.
    let first = first.saturating_sub(1);
    let last = (last + 1).min(blocks.len() - 1);

    let slice_old_start = blocks[first].span().offset;
    // The gap up to the next surviving block belongs to the window.
    let slice_old_end = blocks
        .get(last + 1)
        .map(|b| b.span().offset)
        .unwrap_or(old_source.len());
    if edit.start < slice_old_start || edit.old_end > slice_old_end {
        return None;
    }

    let slice_new_start = slice_old_start;
    let slice_new_end = slice_old_end.checked_add_signed(edit.delta())?;
    if slice_new_end > new_source.len() || slice_new_start > slice_new_end {
        return None;
    }

    // The window must be isolated by blank lines so nothing outside it can
    // lazily attach to blocks inside it.
    if slice_new_start != 0 && !new_source[..slice_new_start].ends_with("\n\n") {
        return None;
    }
    if slice_new_end != new_source.len() && !new_source[..slice_new_end].ends_with("\n\n") {
        return None;
    }

    let new_slice = &new_source[slice_new_start..slice_new_end];
    if GLOBAL_MARKERS.iter().any(|m| new_slice.contains(m)) {
        return None;
    }
    let old_slice = &old_source[slice_old_start..slice_old_end];
    if GLOBAL_MARKERS.iter().any(|m| old_slice.contains(m)) {
        return None;
    }

    Some(splice(
        previous,
        new_source,
        config,
        first,
        last,
        slice_new_start,
        new_slice,
        old_slice,
        edit.delta(),
    ))
}

#[allow(clippy::too_many_arguments)]
fn splice(
    previous: &Document,
    new_source: &str,
    config: &ParseConfig,
    first: usize,
    last: usize,
    slice_new_start: usize,
    new_slice: &str,
    old_slice: &str,
    byte_delta: isize,
) -> Result<Document> {
    let window = dispatch::parse_document(new_slice, config, None)?;

    let lines_before = newline_count(&new_source[..slice_new_start]) as isize;
    let line_delta =
        newline_count(new_slice) as isize - newline_count(old_slice) as isize;

    // Untouched prefix blocks are shared, not copied; the suffix is shared
    // too when the edit changed neither byte length nor line count.
    let mut children: Vec<Arc<Block>> = Vec::with_capacity(previous.children.len());
    children.extend(previous.children[..first].iter().map(Arc::clone));
    for mut block in window.children {
        shift_block(Arc::make_mut(&mut block), slice_new_start as isize, lines_before);
        children.push(block);
    }
    for old in &previous.children[last + 1..] {
        if byte_delta == 0 && line_delta == 0 {
            children.push(Arc::clone(old));
        } else {
            let mut block = Arc::clone(old);
            shift_block(Arc::make_mut(&mut block), byte_delta, line_delta);
            children.push(block);
        }
    }

    Ok(Document::from_shared(
        children,
        Span::new(1, 1, 0, new_source.len()),
    ))
}

fn newline_count(text: &str) -> usize {
    text.matches('\n').count()
}

fn shift_span(span: &mut Span, bytes: isize, lines: isize) {
    *span = Span::new(
        span.line.saturating_add_signed(lines),
        span.column,
        span.offset.saturating_add_signed(bytes),
        span.end_offset.saturating_add_signed(bytes),
    );
}

fn shift_block(block: &mut Block, bytes: isize, lines: isize) {
    match block {
        Block::Heading { children, span, .. } | Block::Paragraph { children, span } => {
            shift_span(span, bytes, lines);
            for inline in children {
                shift_inline(inline, bytes, lines);
            }
        }
        Block::FencedCode {
            source_start,
            source_end,
            content_override,
            span,
            ..
        } => {
            shift_span(span, bytes, lines);
            if content_override.is_none() {
                *source_start = source_start.saturating_add_signed(bytes);
                *source_end = source_end.saturating_add_signed(bytes);
            }
        }
        Block::IndentedCode { span, .. }
        | Block::ThematicBreak { span }
        | Block::HtmlBlock { span, .. }
        | Block::MathBlock { span, .. } => shift_span(span, bytes, lines),
        Block::BlockQuote { children, span }
        | Block::FootnoteDef { children, span, .. }
        | Block::Directive { children, span, .. } => {
            shift_span(span, bytes, lines);
            for child in children {
                shift_block(child, bytes, lines);
            }
        }
        Block::List { items, span, .. } => {
            shift_span(span, bytes, lines);
            for item in items {
                shift_item(item, bytes, lines);
            }
        }
        Block::Table {
            head, body, span, ..
        } => {
            shift_span(span, bytes, lines);
            for row in head.iter_mut().chain(body.iter_mut()) {
                shift_row(row, bytes, lines);
            }
        }
    }
}

fn shift_item(item: &mut ListItem, bytes: isize, lines: isize) {
    shift_span(&mut item.span, bytes, lines);
    for child in &mut item.children {
        shift_block(child, bytes, lines);
    }
}

fn shift_row(row: &mut TableRow, bytes: isize, lines: isize) {
    shift_span(&mut row.span, bytes, lines);
    for cell in &mut row.cells {
        shift_cell(cell, bytes, lines);
    }
}

fn shift_cell(cell: &mut TableCell, bytes: isize, lines: isize) {
    shift_span(&mut cell.span, bytes, lines);
    for inline in &mut cell.children {
        shift_inline(inline, bytes, lines);
    }
}

fn shift_inline(inline: &mut Inline, bytes: isize, lines: isize) {
    match inline {
        Inline::Text { span, .. }
        | Inline::Image { span, .. }
        | Inline::CodeSpan { span, .. }
        | Inline::LineBreak { span }
        | Inline::SoftBreak { span }
        | Inline::HtmlInline { span, .. }
        | Inline::Math { span, .. }
        | Inline::Role { span, .. }
        | Inline::FootnoteRef { span, .. } => shift_span(span, bytes, lines),
        Inline::Emphasis { children, span }
        | Inline::Strong { children, span }
        | Inline::Strikethrough { children, span }
        | Inline::Link { children, span, .. } => {
            shift_span(span, bytes, lines);
            for child in children {
                shift_inline(child, bytes, lines);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> Document {
        dispatch::parse_document(source, &ParseConfig::default(), None).unwrap()
    }

    /// Applies `edit`'s replacement textually, for test construction.
    fn apply(old: &str, edit: Edit, replacement: &str) -> String {
        let mut out = String::new();
        out.push_str(&old[..edit.start]);
        out.push_str(replacement);
        out.push_str(&old[edit.old_end..]);
        out
    }

    #[test]
    fn edit_inside_paragraph_matches_full_parse() {
        let old = "# Title\n\npara one\n\npara two\n\n# End\n";
        let doc = parse(old);
        let start = old.find("one").unwrap();
        let edit = Edit::new(start, start + 3, start + 8);
        let new = apply(old, edit, "one more");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
    }

    #[test]
    fn untouched_prefix_blocks_are_reused_verbatim() {
        let old = "# Title\n\nalpha\n\nbeta\n";
        let doc = parse(old);
        let start = old.find("beta").unwrap();
        let edit = Edit::new(start, start + 4, start + 5);
        let new = apply(old, edit, "gamma");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental.children[0], doc.children[0]);
        assert_eq!(incremental, parse(&new));
    }

    #[test]
    fn suffix_spans_shift_by_the_delta() {
        let old = "alpha\n\nbeta\n\ngamma\n";
        let doc = parse(old);
        let edit = Edit::insertion(2, 2); // "alpha" -> "alXXpha"
        let new = apply(old, edit, "XX");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
        let last = incremental.children.last().unwrap().span();
        assert_eq!(&new[last.offset..last.end_offset], "gamma");
    }

    #[test]
    fn untouched_blocks_keep_their_allocation() {
        let old = "alpha one\n\nbeta two\n\ngamma three\n\ndelta four\n\nepsilon five\n";
        let doc = parse(old);
        let start = old.find("three").unwrap();
        // Same-length replacement: suffix blocks need no shifting at all.
        let edit = Edit::new(start, start + 5, start + 5);
        let new = old.replace("three", "THREE");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
        assert!(Arc::ptr_eq(&incremental.children[0], &doc.children[0]));
        assert!(Arc::ptr_eq(&incremental.children[4], &doc.children[4]));
        assert!(!Arc::ptr_eq(&incremental.children[2], &doc.children[2]));
    }

    #[test]
    fn fence_markers_fall_back_to_full_parse() {
        let old = "alpha\n\nbeta\n";
        let doc = parse(old);
        let start = old.find("beta").unwrap();
        let edit = Edit::new(start, start + 4, start + 6);
        let new = apply(old, edit, "```\nx\n"); // unclosed fence

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
    }

    #[test]
    fn reference_definition_edits_fall_back() {
        let old = "[a]\n\n[a]: /url\n";
        let doc = parse(old);
        let start = old.find("/url").unwrap();
        let edit = Edit::new(start, start + 4, start + 6);
        let new = apply(old, edit, "/other");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let old = "alpha\n";
        let doc = parse(old);
        let edit = Edit::insertion(0, 10);
        let err = reparse(&doc, old, "alpha\n", edit, &ParseConfig::default());
        assert!(matches!(err, Err(MarklyError::InvalidDocument { .. })));
    }

    #[test]
    fn edit_at_document_end_appends() {
        let old = "alpha\n\nbeta\n";
        let doc = parse(old);
        let edit = Edit::insertion(old.len(), 7);
        let new = apply(old, edit, "\ngamma\n");

        let config = ParseConfig::default();
        let incremental = reparse(&doc, old, &new, edit, &config).unwrap();
        assert_eq!(incremental, parse(&new));
    }
}
