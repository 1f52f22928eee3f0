use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for a node handed out by an accessibility provider
/// - macOS: key into the adapter's AXUIElement registry
/// - tests: node id inside the fake tree
pub type ElementId = String;

/// Opaque reference to a node in the accessibility tree
///
/// Carries no attributes of its own; everything is read lazily through the
/// provider. Handles are not meant to be cached across polls: a wait
/// re-resolves from an ancestor on every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: ElementId,
}

impl ElementHandle {
    pub fn new(id: impl Into<ElementId>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)
    }
}

/// Element kinds the storefront workflows search for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Application,
    StandardWindow,
    Sheet,
    WebArea,
    Toolbar,
    MenuBarItem,
    MenuItem,
    Button,
    Link,
    Table,
    Row,
    StaticText,
    TextField,
    SecureTextField,
    Group,
}

impl ElementKind {
    /// AX role reported by the platform for this kind
    pub fn ax_role(&self) -> &'static str {
        match self {
            Self::Application => "AXApplication",
            Self::StandardWindow => "AXWindow",
            Self::Sheet => "AXSheet",
            Self::WebArea => "AXWebArea",
            Self::Toolbar => "AXToolbar",
            Self::MenuBarItem => "AXMenuBarItem",
            Self::MenuItem => "AXMenuItem",
            Self::Button => "AXButton",
            Self::Link => "AXLink",
            Self::Table => "AXTable",
            Self::Row => "AXRow",
            Self::StaticText => "AXStaticText",
            Self::TextField | Self::SecureTextField => "AXTextField",
            Self::Group => "AXGroup",
        }
    }

    /// AX subrole that must also match, if any
    pub fn ax_subrole(&self) -> Option<&'static str> {
        match self {
            Self::StandardWindow => Some("AXStandardWindow"),
            Self::SecureTextField => Some("AXSecureTextField"),
            _ => None,
        }
    }

    /// Whether a node with the given role/subrole is of this kind
    pub fn matches_role(&self, role: &str, subrole: Option<&str>) -> bool {
        if role != self.ax_role() {
            return false;
        }
        match self.ax_subrole() {
            Some(required) => subrole == Some(required),
            None => true,
        }
    }
}

/// Textual attributes a search can filter on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Title,
    Description,
    Value,
}

impl Attribute {
    pub fn ax_name(&self) -> &'static str {
        match self {
            Self::Title => "AXTitle",
            Self::Description => "AXDescription",
            Self::Value => "AXValue",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::Value => "value",
        };
        f.write_str(name)
    }
}

/// Predicate on one attribute: exact string equality or a regex
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Pattern(Regex),
}

impl Matcher {
    pub fn exact(value: impl Into<String>) -> Self {
        Self::Exact(value.into())
    }

    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Pattern(Regex::new(pattern)?))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Exact(expected) => candidate == expected,
            Self::Pattern(regex) => regex.is_match(candidate),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(expected) => write!(f, "== {:?}", expected),
            Self::Pattern(regex) => write!(f, "=~ /{}/", regex.as_str()),
        }
    }
}

/// Declarative description of the element to look for below an ancestor
///
/// Evaluated against live tree state every time it is used; it never
/// remembers a previous match.
#[derive(Debug, Clone)]
pub struct SearchSpec {
    pub kind: ElementKind,
    pub predicates: Vec<(Attribute, Matcher)>,
}

impl SearchSpec {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            predicates: Vec::new(),
        }
    }

    pub fn with(mut self, attribute: Attribute, matcher: Matcher) -> Self {
        self.predicates.push((attribute, matcher));
        self
    }

    pub fn title(self, title: impl Into<String>) -> Self {
        self.with(Attribute::Title, Matcher::exact(title))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.with(Attribute::Description, Matcher::exact(description))
    }

    pub fn value(self, value: impl Into<String>) -> Self {
        self.with(Attribute::Value, Matcher::exact(value))
    }

    /// Check a candidate node. `read` supplies the node's attributes on demand;
    /// a missing attribute never satisfies a predicate.
    pub fn matches<F>(&self, kind_matches: bool, mut read: F) -> bool
    where
        F: FnMut(Attribute) -> Option<String>,
    {
        kind_matches
            && self.predicates.iter().all(|(attribute, matcher)| {
                read(*attribute)
                    .map(|actual| matcher.matches(&actual))
                    .unwrap_or(false)
            })
    }
}

impl fmt::Display for SearchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if self.predicates.is_empty() {
            return Ok(());
        }
        let predicates: Vec<String> = self
            .predicates
            .iter()
            .map(|(attribute, matcher)| format!("{} {}", attribute, matcher))
            .collect();
        write!(f, "[{}]", predicates.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_requires_subrole_when_declared() {
        assert!(ElementKind::StandardWindow.matches_role("AXWindow", Some("AXStandardWindow")));
        assert!(!ElementKind::StandardWindow.matches_role("AXWindow", Some("AXDialog")));
        assert!(!ElementKind::StandardWindow.matches_role("AXWindow", None));
        assert!(ElementKind::TextField.matches_role("AXTextField", Some("AXSecureTextField")));
        assert!(ElementKind::SecureTextField.matches_role("AXTextField", Some("AXSecureTextField")));
        assert!(!ElementKind::Button.matches_role("AXLink", None));
    }

    #[test]
    fn test_exact_and_pattern_matchers() {
        let exact = Matcher::exact("Purchases");
        assert!(exact.matches("Purchases"));
        assert!(!exact.matches("Purchases "));

        let pattern = Matcher::pattern("^(Installed,|Open,)").unwrap();
        assert!(pattern.matches("Open, Some App"));
        assert!(pattern.matches("Installed, Some App"));
        assert!(!pattern.matches("Install, Some App"));
    }

    #[test]
    fn test_spec_needs_every_predicate() {
        let spec = SearchSpec::new(ElementKind::Button)
            .title("Sign In")
            .with(Attribute::Description, Matcher::pattern("^Sign").unwrap());

        assert!(spec.matches(true, |attribute| match attribute {
            Attribute::Title => Some("Sign In".to_string()),
            Attribute::Description => Some("Sign in to the store".to_string()),
            Attribute::Value => None,
        }));
        assert!(!spec.matches(true, |attribute| match attribute {
            Attribute::Title => Some("Sign In".to_string()),
            _ => None,
        }));
        assert!(!spec.matches(false, |_| Some("Sign In".to_string())));
    }

    #[test]
    fn test_spec_display() {
        let spec = SearchSpec::new(ElementKind::Table).description("Purchases");
        assert_eq!(spec.to_string(), "Table[description == \"Purchases\"]");
        assert_eq!(SearchSpec::new(ElementKind::Toolbar).to_string(), "Toolbar");
    }
}
