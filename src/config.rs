/// Parse configuration.
///
/// A [`ParseConfig`] is built once and passed to the parser by reference;
/// nothing in the crate reads configuration from globals, so two parses with
/// different configs can run on different threads over the same process
/// without interfering.
use crate::directives::DirectiveRegistry;
use std::sync::Arc;

/// Callback applied to paragraph text lines before inline parsing.
///
/// Useful for template-variable substitution in static site pipelines.
pub type TextTransformer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Immutable parser configuration.
///
/// All syntax extensions default to off; [`ParseConfig::gfm`] enables the
/// GitHub-flavored set.
#[derive(Clone, Default)]
pub struct ParseConfig {
    /// Enable GFM table parsing.
    pub tables: bool,
    /// Enable `~~strikethrough~~`.
    pub strikethrough: bool,
    /// Enable `- [ ]` task list items.
    pub task_lists: bool,
    /// Enable `[^ref]` footnotes.
    pub footnotes: bool,
    /// Enable `$inline$` and `$$block$$` math.
    pub math: bool,
    /// Enable `<https://...>` and `<user@host>` autolinks.
    pub autolinks: bool,
    /// Raise on directive contract violations instead of ignoring them.
    pub strict_contracts: bool,
    /// Handlers for `:::{name}` directives.
    pub directive_registry: Option<DirectiveRegistry>,
    /// Optional transform for plain text lines.
    pub text_transformer: Option<TextTransformer>,
}

impl ParseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ParseConfigBuilder {
        ParseConfigBuilder::default()
    }

    /// GitHub-flavored preset: tables, strikethrough, task lists and
    /// autolinks.
    pub fn gfm() -> Self {
        Self::builder()
            .tables(true)
            .strikethrough(true)
            .task_lists(true)
            .autolinks(true)
            .build()
    }
}

impl std::fmt::Debug for ParseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseConfig")
            .field("tables", &self.tables)
            .field("strikethrough", &self.strikethrough)
            .field("task_lists", &self.task_lists)
            .field("footnotes", &self.footnotes)
            .field("math", &self.math)
            .field("autolinks", &self.autolinks)
            .field("strict_contracts", &self.strict_contracts)
            .field("directive_registry", &self.directive_registry)
            .field(
                "text_transformer",
                &self.text_transformer.as_ref().map(|_| "<fn>"),
            )
            .finish()
    }
}

/// Builder for [`ParseConfig`].
#[derive(Default)]
pub struct ParseConfigBuilder {
    config: ParseConfig,
}

impl ParseConfigBuilder {
    pub fn tables(mut self, enabled: bool) -> Self {
        self.config.tables = enabled;
        self
    }

    pub fn strikethrough(mut self, enabled: bool) -> Self {
        self.config.strikethrough = enabled;
        self
    }

    pub fn task_lists(mut self, enabled: bool) -> Self {
        self.config.task_lists = enabled;
        self
    }

    pub fn footnotes(mut self, enabled: bool) -> Self {
        self.config.footnotes = enabled;
        self
    }

    pub fn math(mut self, enabled: bool) -> Self {
        self.config.math = enabled;
        self
    }

    pub fn autolinks(mut self, enabled: bool) -> Self {
        self.config.autolinks = enabled;
        self
    }

    pub fn strict_contracts(mut self, enabled: bool) -> Self {
        self.config.strict_contracts = enabled;
        self
    }

    pub fn directive_registry(mut self, registry: DirectiveRegistry) -> Self {
        self.config.directive_registry = Some(registry);
        self
    }

    pub fn text_transformer(mut self, transformer: TextTransformer) -> Self {
        self.config.text_transformer = Some(transformer);
        self
    }

    pub fn build(self) -> ParseConfig {
        self.config
    }
}
