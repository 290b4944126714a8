/// List assembly.
///
/// A list item owns every following line indented to at least its content
/// column. Item bodies are rebuilt from the raw source (so nested markers,
/// fences and quotes survive), dedented, and sub-parsed. Tightness follows
/// CommonMark: a blank line between items, or between two blocks inside an
/// item, makes the whole list loose.
use super::Parser;
use crate::ast::{Block, ListItem};
use crate::error::Result;
use crate::lexer::{strip_columns, ListMarkerInfo, TokenKind};
use crate::location::Span;

impl Parser<'_, '_> {
    pub(super) fn parse_list(&mut self, out: &mut Vec<Block>) -> Result<()> {
        let TokenKind::ListItem { marker } = self.current().kind.clone() else {
            self.pos += 1;
            return Ok(());
        };
        let ordered = marker.ordered;
        let marker_char = marker.marker_char;
        let start = marker.start;
        let list_start = self.current().span;
        let mut end = list_start.end_offset;

        let mut items = Vec::new();
        let mut loose = false;
        while let TokenKind::ListItem { marker: m } = &self.current().kind {
            if m.ordered != ordered || m.marker_char != marker_char {
                break;
            }
            let m = m.clone();
            let (item, item_loose) = self.collect_item(&m)?;
            end = item.span.end_offset;
            loose |= item_loose;
            items.push(item);
        }

        out.push(Block::List {
            items,
            ordered,
            start,
            tight: !loose,
            span: Span::new(list_start.line, list_start.column, list_start.offset, end),
        });
        Ok(())
    }

    fn collect_item(&mut self, marker: &ListMarkerInfo) -> Result<(ListItem, bool)> {
        let first = self.current().clone();
        self.pos += 1;
        let indent = marker.content_indent;
        // The lexer already split the marker off the first line; re-cutting
        // the raw span would put the marker back and recurse forever.
        let mut lines = vec![marker.content.clone()];
        let mut end = first.span;
        let mut loose = false;
        let mut blank_inside = false;

        loop {
            let tok = self.current().clone();
            match &tok.kind {
                TokenKind::Eof => break,
                TokenKind::BlankLine => {
                    let mut j = self.pos;
                    while self.tokens[j].is_blank() {
                        j += 1;
                    }
                    let next = &self.tokens[j];
                    if !next.is_eof() && next.line_indent >= indent {
                        for _ in self.pos..j {
                            lines.push(String::new());
                        }
                        self.pos = j;
                        blank_inside = true;
                        continue;
                    }
                    if let TokenKind::ListItem { marker: next_marker } = &next.kind {
                        if next_marker.ordered == marker.ordered
                            && next_marker.marker_char == marker.marker_char
                        {
                            // Blank line between sibling items: loose list.
                            loose = true;
                            self.pos = j;
                        }
                    }
                    break;
                }
                _ if tok.line_indent >= indent => {
                    if blank_inside {
                        loose = true;
                    }
                    for line in self.raw(tok.span).split('\n') {
                        lines.push(strip_columns(line, indent));
                    }
                    end = tok.span;
                    self.pos += 1;
                }
                // Unindented text right after item content continues its
                // paragraph lazily.
                TokenKind::ParagraphLine { content } => {
                    lines.push(content.clone());
                    end = tok.span;
                    self.pos += 1;
                }
                _ => break,
            }
        }

        let mut checked = None;
        if self.config.task_lists {
            if let Some(first_line) = lines.first_mut() {
                if let Some((state, rest)) = task_marker(first_line) {
                    checked = Some(state);
                    *first_line = rest;
                }
            }
        }

        while lines.last().map_or(false, |l| l.is_empty()) {
            lines.pop();
        }

        let children = self.sub_parse(&lines.join("\n"))?;
        let item = ListItem {
            children,
            checked,
            span: Span::new(
                first.span.line,
                first.span.column,
                first.span.offset,
                end.end_offset,
            ),
        };
        Ok((item, loose))
    }
}

/// `[ ]` / `[x]` task list marker at the start of an item's text.
fn task_marker(line: &str) -> Option<(bool, String)> {
    let (state, rest) = if let Some(rest) = line.strip_prefix("[ ]") {
        (false, rest)
    } else if let Some(rest) = line.strip_prefix("[x]").or_else(|| line.strip_prefix("[X]")) {
        (true, rest)
    } else {
        return None;
    };
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((state, rest.trim_start().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::plain_text;
    use crate::config::ParseConfig;
    use crate::parser::parse_source;

    fn parse(source: &str) -> Vec<Block> {
        parse_with(source, &ParseConfig::default())
    }

    fn parse_with(source: &str, config: &ParseConfig) -> Vec<Block> {
        let doc = parse_source(source, config, None).unwrap();
        doc.children.iter().map(|b| (**b).clone()).collect()
    }

    fn item_text(item: &ListItem) -> String {
        let Block::Paragraph { children, .. } = &item.children[0] else {
            panic!("expected paragraph, got {:?}", item.children);
        };
        plain_text(children)
    }

    #[test]
    fn single_item_consumes_its_marker() {
        // The item body must not re-enter list parsing with the marker
        // still attached.
        let blocks = parse("- a\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks[0]);
        };
        assert_eq!(items.len(), 1);
        assert_eq!(item_text(&items[0]), "a");
    }

    #[test]
    fn marker_directly_followed_by_marker_nests_once() {
        let blocks = parse("- - inner\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks[0]);
        };
        assert_eq!(items.len(), 1);
        let Block::List { items: nested, .. } = &items[0].children[0] else {
            panic!("expected nested list, got {:?}", items[0].children);
        };
        assert_eq!(item_text(&nested[0]), "inner");
    }

    #[test]
    fn tight_bullet_list() {
        let blocks = parse("- a\n- b\n- c\n");
        let Block::List {
            items,
            ordered,
            tight,
            ..
        } = &blocks[0]
        else {
            panic!("expected list");
        };
        assert!(!ordered);
        assert!(tight);
        assert_eq!(items.len(), 3);
        assert_eq!(item_text(&items[0]), "a");
    }

    #[test]
    fn ordered_list_keeps_start_number() {
        let blocks = parse("3. third\n4. fourth\n");
        let Block::List { ordered, start, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert!(ordered);
        assert_eq!(*start, 3);
    }

    #[test]
    fn blank_between_items_makes_list_loose() {
        let blocks = parse("- a\n\n- b\n");
        let Block::List { items, tight, .. } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks[0]);
        };
        assert_eq!(items.len(), 2);
        assert!(!tight);
    }

    #[test]
    fn blank_inside_item_makes_list_loose() {
        let blocks = parse("- first\n\n  second\n- next\n");
        let Block::List { items, tight, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert!(!tight);
        assert_eq!(items[0].children.len(), 2);
    }

    #[test]
    fn different_marker_starts_new_list() {
        let blocks = parse("- a\n* b\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Block::List { .. }));
        assert!(matches!(blocks[1], Block::List { .. }));
    }

    #[test]
    fn nested_list_inside_item() {
        let blocks = parse("- outer\n  - inner\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].children[1], Block::List { .. }));
    }

    #[test]
    fn item_owns_indented_continuation() {
        let blocks = parse("- first\n  continued\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(item_text(&items[0]), "first continued");
    }

    #[test]
    fn lazy_continuation_without_indent() {
        let blocks = parse("- first\nlazy\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks[0]);
        };
        assert_eq!(item_text(&items[0]), "first lazy");
    }

    #[test]
    fn fence_inside_item() {
        let source = "- item\n\n  ```\n  code\n  ```\n";
        let blocks = parse(source);
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list, got {:?}", blocks[0]);
        };
        let fence = &items[0].children[1];
        assert_eq!(fence.fenced_code_text(source).as_deref(), Some("code\n"));
    }

    #[test]
    fn task_lists_require_config() {
        let config = ParseConfig::builder().task_lists(true).build();
        let blocks = parse_with("- [x] done\n- [ ] todo\n- plain\n", &config);
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0].checked, Some(true));
        assert_eq!(items[1].checked, Some(false));
        assert_eq!(items[2].checked, None);
        assert_eq!(item_text(&items[0]), "done");

        let blocks = parse("- [x] done\n");
        let Block::List { items, .. } = &blocks[0] else {
            panic!("expected list");
        };
        assert_eq!(items[0].checked, None);
    }

    #[test]
    fn list_ends_at_unindented_paragraph_after_blank() {
        let blocks = parse("- item\n\nafter\n");
        assert_eq!(blocks.len(), 2);
        assert!(matches!(blocks[0], Block::List { .. }));
        assert!(matches!(blocks[1], Block::Paragraph { .. }));
    }
}
