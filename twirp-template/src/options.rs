//! Generation options

use std::str::FromStr;

use crate::schema::MessageId;

/// Default maximum message nesting depth for templates and optional paths
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default number of times one message type may appear along a single path
pub const DEFAULT_RECURSION_LIMIT: usize = 3;

/// Default number of message objects one request template may expand
pub const DEFAULT_EXPANSION_LIMIT: usize = 4096;

/// How catalog entries are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    /// Bare method name. Methods with the same name in different services
    /// collide and the one visited last wins.
    #[default]
    Method,
    /// `<package>.<Service>.<Method>`
    Qualified,
}

impl FromStr for KeyStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "method" | "bare" => Ok(KeyStyle::Method),
            "qualified" | "full" => Ok(KeyStyle::Qualified),
            other => Err(format!("unknown key style: {other}")),
        }
    }
}

/// Options shared by the template generator, optional-field extractor and
/// catalog builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Message nesting levels below the request root before recursion is cut
    /// off and the field rendered as `""`
    pub max_depth: usize,
    /// Times one message type may appear along a single path (the root
    /// included) before a self-referencing field is rendered as `""`
    pub recursion_limit: usize,
    /// Message objects one request may expand in total, the root included.
    /// Once spent, every further message-typed field renders as `""`.
    pub expansion_limit: usize,
    /// Catalog key style
    pub key_style: KeyStyle,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            expansion_limit: DEFAULT_EXPANSION_LIMIT,
            key_style: KeyStyle::default(),
        }
    }
}

impl TemplateOptions {
    /// Set the nesting bound
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set how often a message type may recur along one path
    pub fn recursion_limit(mut self, recursion_limit: usize) -> Self {
        self.recursion_limit = recursion_limit;
        self
    }

    /// Set the total number of message objects one request may expand
    pub fn expansion_limit(mut self, expansion_limit: usize) -> Self {
        self.expansion_limit = expansion_limit;
        self
    }

    /// Set the catalog key style
    pub fn key_style(mut self, key_style: KeyStyle) -> Self {
        self.key_style = key_style;
        self
    }
}

/// Tracks one depth-first walk from a request root and decides whether a
/// message-typed field may be expanded
///
/// The template generator and the optional-field extractor make the same
/// sequence of `enter` calls for a given root, so both stop at exactly the
/// same fields.
#[derive(Debug)]
pub(crate) struct DescentGuard<'a> {
    options: &'a TemplateOptions,
    path: Vec<MessageId>,
    expanded: usize,
}

impl<'a> DescentGuard<'a> {
    /// Start a walk at `root`
    pub(crate) fn new(options: &'a TemplateOptions, root: MessageId) -> Self {
        Self {
            options,
            path: vec![root],
            expanded: 1,
        }
    }

    /// Current nesting depth below the root
    pub(crate) fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Try to expand `child`. On success the walk is inside `child` until the
    /// matching [`leave`](Self::leave).
    pub(crate) fn enter(&mut self, child: MessageId) -> bool {
        let repeats = self.path.iter().filter(|seen| **seen == child).count();
        let allowed = self.depth() < self.options.max_depth
            && repeats < self.options.recursion_limit
            && self.expanded < self.options.expansion_limit;
        if allowed {
            self.path.push(child);
            self.expanded += 1;
        }
        allowed
    }

    /// Return to the parent of the message entered last
    pub(crate) fn leave(&mut self) {
        self.path.pop();
    }
}
