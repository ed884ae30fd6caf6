use std::sync::LazyLock;

use regex::Regex;

/// Duplicate-key template for MySQL-style driver text.
pub const DUPLICATE_ENTRY_PATTERN: &str =
    r".*1062 Duplicate entry.*for key '[A-Za-z0-9_.]+\.(?P<field>[A-Za-z0-9_.\s]+)'";
/// Foreign-key template for MySQL-style driver text.
pub const FOREIGN_KEY_PATTERN: &str =
    r"a foreign key constraint fails.*FOREIGN KEY \(`(?P<field>[a-z_]+)`\)";

static SHIPPED: LazyLock<Vec<FriendlyErrorRule>> = LazyLock::new(|| {
    vec![
        FriendlyErrorRule::new(DUPLICATE_ENTRY_PATTERN, "{field} already exists")
            .expect("duplicate entry pattern is valid"),
        FriendlyErrorRule::new(FOREIGN_KEY_PATTERN, "Incorrect value for {field}")
            .expect("foreign key pattern is valid"),
    ]
});

/// A raw-error pattern with named groups and the message it renders to.
#[derive(Debug, Clone)]
pub struct FriendlyErrorRule {
    pattern: Regex,
    template: String,
}

impl FriendlyErrorRule {
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            template: template.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Render the template for `raw`, or `None` when the pattern does not match.
    ///
    /// Every named group is substituted into its `{name}` placeholder; a
    /// group that did not participate in the match renders as empty.
    pub fn render(&self, raw: &str) -> Option<String> {
        let caps = self.pattern.captures(raw)?;
        let mut message = self.template.clone();
        for name in self.pattern.capture_names().flatten() {
            let value = caps.name(name).map_or("", |m| m.as_str());
            message = message.replace(&format!("{{{name}}}"), value.trim());
        }
        Some(message)
    }
}

/// Ordered list of friendly-error rules; the first match wins.
#[derive(Debug, Clone)]
pub struct ErrorTranslator {
    rules: Vec<FriendlyErrorRule>,
}

impl Default for ErrorTranslator {
    /// The duplicate-entry and foreign-key rules.
    fn default() -> Self {
        Self::new(SHIPPED.clone())
    }
}

impl ErrorTranslator {
    pub fn new(rules: Vec<FriendlyErrorRule>) -> Self {
        Self { rules }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_rule(mut self, rule: FriendlyErrorRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[FriendlyErrorRule] {
        &self.rules
    }

    /// Friendly message for `raw`, or `raw` itself when no rule matches.
    pub fn translate(&self, raw: &str) -> String {
        self.rules
            .iter()
            .find_map(|rule| rule.render(raw))
            .unwrap_or_else(|| raw.to_string())
    }
}
