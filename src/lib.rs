// Core modules
pub mod ast;
pub mod config;
pub mod directives;
pub mod dispatch;
pub mod error;
pub mod incremental;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod serialization;

// Re-export key types for public API
pub use ast::{
    plain_text, Alignment, Block, Document, HeadingStyle, Inline, ListItem, TableCell, TableRow,
    Visitor,
};
pub use config::{ParseConfig, ParseConfigBuilder, TextTransformer};
pub use directives::{
    DirectiveContract, DirectiveHandler, DirectiveInput, DirectiveOptions, DirectiveRegistry,
    DirectiveRegistryBuilder,
};
pub use dispatch::{classify, Complexity};
pub use error::{MarklyError, Result};
pub use incremental::{reparse, Edit};
pub use lexer::{Lexer, Token, TokenKind};
pub use location::Span;
pub use serialization::{from_json, to_json, to_json_pretty};

/// Parses Markdown text into a [`Document`] with the default configuration.
///
/// This is the simplest entry point: CommonMark only, no extensions.
///
/// # Examples
///
/// ```
/// use markly::{parse, Block};
///
/// let doc = parse("# Hello, World!").unwrap();
/// assert!(matches!(*doc.children[0], Block::Heading { level: 1, .. }));
/// ```
pub fn parse(source: &str) -> Result<Document> {
    dispatch::parse_document(source, &ParseConfig::default(), None)
}

/// Parses Markdown text with an explicit configuration.
///
/// `source_file` is attached to any errors for diagnostics; it does not
/// affect parsing.
///
/// # Examples
///
/// ```
/// use markly::{parse_with_config, Block, ParseConfig};
///
/// let config = ParseConfig::gfm();
/// let doc = parse_with_config("| a |\n| - |\n| 1 |\n", &config, None).unwrap();
/// assert!(matches!(*doc.children[0], Block::Table { .. }));
/// ```
pub fn parse_with_config(
    source: &str,
    config: &ParseConfig,
    source_file: Option<&str>,
) -> Result<Document> {
    dispatch::parse_document(source, config, source_file)
}
