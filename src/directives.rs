/// Extensible block directives.
///
/// Directives are the block-level extension point:
///
/// ```markdown
/// :::{note} Optional title
/// :class: highlight
///
/// Body content, parsed as Markdown.
/// :::
/// ```
///
/// A [`DirectiveHandler`] turns the parsed pieces into an AST node; the
/// [`DirectiveRegistry`] maps directive names to handlers. Unknown names
/// still parse into a generic [`Block::Directive`] so documents never fail
/// on unregistered directives unless `strict_contracts` is set.
use crate::ast::Block;
use crate::error::{MarklyError, Result};
use crate::location::Span;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Options parsed from `:key: value` lines in a directive body.
///
/// Stored as an ordered string map; typed accessors coerce on read so
/// handlers stay stateless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveOptions {
    entries: BTreeMap<String, String>,
}

impl DirectiveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Boolean coercion: `true`, `yes`, `1` and the empty string are true.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "yes" | "1" | ""))
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for DirectiveOptions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Structural constraints a directive imposes on its surroundings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveContract {
    /// This directive must appear directly inside one of these directives.
    pub requires_parent: Option<Vec<String>>,
    /// Only these directive names may appear as direct children.
    pub allowed_children: Option<Vec<String>>,
}

impl DirectiveContract {
    /// Checks the parent requirement against the innermost enclosing
    /// directive name (`None` at top level).
    pub fn check_parent(&self, directive: &str, parent: Option<&str>, line: usize) -> Result<()> {
        let Some(required) = &self.requires_parent else {
            return Ok(());
        };
        match parent {
            Some(name) if required.iter().any(|r| r == name) => Ok(()),
            _ => Err(MarklyError::directive_contract(
                directive,
                format!("must be nested inside one of: {}", required.join(", ")),
                line,
            )),
        }
    }

    /// Checks that all direct directive children are allowed.
    pub fn check_children(&self, directive: &str, children: &[Block], line: usize) -> Result<()> {
        let Some(allowed) = &self.allowed_children else {
            return Ok(());
        };
        for child in children {
            if let Block::Directive { name, .. } = child {
                if !allowed.iter().any(|a| a == name) {
                    return Err(MarklyError::directive_contract(
                        directive,
                        format!("child directive '{name}' is not allowed here"),
                        line,
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Everything the parser extracted for one directive occurrence.
#[derive(Debug)]
pub struct DirectiveInput {
    pub name: String,
    pub title: Option<String>,
    pub options: DirectiveOptions,
    pub children: Vec<Block>,
    pub raw_content: Option<String>,
    pub span: Span,
}

impl DirectiveInput {
    /// Default AST construction shared by most handlers.
    pub fn into_block(self) -> Block {
        Block::Directive {
            name: self.name,
            title: self.title,
            options: self.options,
            children: self.children,
            raw_content: self.raw_content,
            span: self.span,
        }
    }
}

/// Handler for one or more directive names.
///
/// Handlers must be stateless; the same instance may serve concurrent
/// parses.
pub trait DirectiveHandler: Send + Sync {
    /// Directive names this handler responds to.
    fn names(&self) -> &[&'static str];

    /// Optional nesting contract, enforced when `strict_contracts` is on.
    fn contract(&self) -> Option<&DirectiveContract> {
        None
    }

    /// Whether the parser should keep the unparsed body text in
    /// `raw_content` alongside the parsed children.
    fn preserves_raw_content(&self) -> bool {
        false
    }

    /// Builds the AST node for one occurrence.
    fn parse(&self, input: DirectiveInput) -> Result<Block> {
        Ok(input.into_block())
    }
}

/// Immutable name-to-handler map shared by all parsers.
#[derive(Clone, Default)]
pub struct DirectiveRegistry {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl DirectiveRegistry {
    pub fn builder() -> DirectiveRegistryBuilder {
        DirectiveRegistryBuilder::default()
    }

    /// Registry preloaded with the builtin handlers.
    pub fn with_defaults() -> Self {
        let mut builder = Self::builder();
        builder.register_defaults();
        // Builtins never collide with each other.
        builder.build().unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DirectiveHandler>> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DirectiveRegistry")
            .field("names", &names)
            .finish()
    }
}

/// Builder collecting handlers before freezing them into a registry.
#[derive(Default)]
pub struct DirectiveRegistryBuilder {
    handlers: Vec<Arc<dyn DirectiveHandler>>,
}

impl DirectiveRegistryBuilder {
    pub fn register(&mut self, handler: Arc<dyn DirectiveHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Adds the builtin admonition, dropdown and tab handlers.
    pub fn register_defaults(&mut self) -> &mut Self {
        self.register(Arc::new(AdmonitionDirective));
        self.register(Arc::new(DropdownDirective));
        self.register(Arc::new(TabSetDirective));
        self.register(Arc::new(TabItemDirective));
        self
    }

    /// Freezes the builder. Duplicate names are a registration error.
    pub fn build(&mut self) -> Result<DirectiveRegistry> {
        let mut handlers: HashMap<String, Arc<dyn DirectiveHandler>> = HashMap::new();
        for handler in self.handlers.drain(..) {
            for name in handler.names() {
                if handlers
                    .insert(name.to_string(), Arc::clone(&handler))
                    .is_some()
                {
                    return Err(MarklyError::plugin(
                        *name,
                        "directive name registered twice",
                    ));
                }
            }
        }
        Ok(DirectiveRegistry { handlers })
    }
}

/// `:::{note}`, `:::{warning}` and friends.
pub struct AdmonitionDirective;

impl DirectiveHandler for AdmonitionDirective {
    fn names(&self) -> &[&'static str] {
        &[
            "note",
            "warning",
            "tip",
            "important",
            "caution",
            "danger",
            "attention",
            "hint",
            "error",
            "seealso",
            "example",
        ]
    }
}

/// Collapsible content section.
pub struct DropdownDirective;

impl DirectiveHandler for DropdownDirective {
    fn names(&self) -> &[&'static str] {
        &["dropdown"]
    }
}

/// Container for a group of tabs.
pub struct TabSetDirective;

impl DirectiveHandler for TabSetDirective {
    fn names(&self) -> &[&'static str] {
        &["tab-set"]
    }

    fn contract(&self) -> Option<&DirectiveContract> {
        static CONTRACT: std::sync::OnceLock<DirectiveContract> = std::sync::OnceLock::new();
        Some(CONTRACT.get_or_init(|| DirectiveContract {
            requires_parent: None,
            allowed_children: Some(vec!["tab-item".to_string()]),
        }))
    }
}

/// A single tab; only valid inside `tab-set`.
pub struct TabItemDirective;

impl DirectiveHandler for TabItemDirective {
    fn names(&self) -> &[&'static str] {
        &["tab-item"]
    }

    fn contract(&self) -> Option<&DirectiveContract> {
        static CONTRACT: std::sync::OnceLock<DirectiveContract> = std::sync::OnceLock::new();
        Some(CONTRACT.get_or_init(|| DirectiveContract {
            requires_parent: Some(vec!["tab-set".to_string()]),
            allowed_children: None,
        }))
    }
}
