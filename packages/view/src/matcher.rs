//! Element patterns used by upcast converters.
//!
//! A pattern lists what an element must have: a name, attributes, classes
//! and styles. A successful match reports which parts matched so the caller
//! can consume exactly those.

use crate::node::{ViewElement, ViewNodeId, ViewTree};

#[derive(Debug, Clone, PartialEq)]
pub enum ValuePattern {
    /// Present with any value
    Any,
    Exact(String),
    OneOf(Vec<String>),
}

impl ValuePattern {
    fn matches(&self, value: &str) -> bool {
        match self {
            ValuePattern::Any => true,
            ValuePattern::Exact(expected) => expected == value,
            ValuePattern::OneOf(options) => options.iter().any(|option| option == value),
        }
    }
}

impl From<&str> for ValuePattern {
    fn from(value: &str) -> Self {
        ValuePattern::Exact(value.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatcherPattern {
    pub name: Option<ValuePattern>,
    pub attributes: Vec<(String, ValuePattern)>,
    pub classes: Vec<String>,
    pub styles: Vec<(String, ValuePattern)>,
}

impl MatcherPattern {
    pub fn name(name: &str) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn names(names: &[&str]) -> Self {
        Self {
            name: Some(ValuePattern::OneOf(names.iter().map(|name| name.to_string()).collect())),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, key: &str, value: ValuePattern) -> Self {
        self.attributes.push((key.to_string(), value));
        self
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    pub fn with_style(mut self, property: &str, value: ValuePattern) -> Self {
        self.styles.push((property.to_string(), value));
        self
    }

    fn match_element(&self, element: &ViewElement) -> Option<MatchResult> {
        let mut result = MatchResult::default();

        if let Some(name) = &self.name {
            if !name.matches(&element.name) {
                return None;
            }
            result.name = true;
        }
        for (key, pattern) in &self.attributes {
            let value = element.attributes.get(key)?;
            if !pattern.matches(value) {
                return None;
            }
            result.attributes.push(key.clone());
        }
        for class in &self.classes {
            if !element.classes.contains(class) {
                return None;
            }
            result.classes.push(class.clone());
        }
        for (property, pattern) in &self.styles {
            let value = element.styles.get(property)?;
            if !pattern.matches(value) {
                return None;
            }
            result.styles.push(property.clone());
        }
        Some(result)
    }
}

/// The parts of an element a pattern matched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    pub name: bool,
    pub attributes: Vec<String>,
    pub classes: Vec<String>,
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    patterns: Vec<MatcherPattern>,
}

impl Matcher {
    pub fn new(patterns: Vec<MatcherPattern>) -> Self {
        Self { patterns }
    }

    pub fn add(&mut self, pattern: MatcherPattern) {
        self.patterns.push(pattern);
    }

    /// First pattern matching the node, if it is an element
    pub fn match_node(&self, tree: &ViewTree, node: ViewNodeId) -> Option<(MatchResult, &MatcherPattern)> {
        let element = tree.element(node)?;
        self.patterns
            .iter()
            .find_map(|pattern| pattern.match_element(element).map(|result| (result, pattern)))
    }

    pub fn match_all(&self, tree: &ViewTree, node: ViewNodeId) -> Vec<MatchResult> {
        let Some(element) = tree.element(node) else {
            return Vec::new();
        };
        self.patterns
            .iter()
            .filter_map(|pattern| pattern.match_element(element))
            .collect()
    }

    /// Element names this matcher can match, when every pattern names them
    pub fn element_names(&self) -> Option<Vec<String>> {
        let mut names = Vec::new();
        for pattern in &self.patterns {
            match &pattern.name {
                Some(ValuePattern::Exact(name)) => names.push(name.clone()),
                Some(ValuePattern::OneOf(options)) => names.extend(options.iter().cloned()),
                _ => return None,
            }
        }
        Some(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ElementCategory;

    #[test]
    fn test_match_reports_matched_parts() {
        let mut tree = ViewTree::new();
        let span = tree.create_element(
            "span",
            ElementCategory::Attribute,
            [("class", "marker big"), ("style", "color: red"), ("title", "x")],
        );
        let matcher = Matcher::new(vec![MatcherPattern::name("span")
            .with_class("marker")
            .with_style("color", ValuePattern::Any)]);

        let (result, _) = matcher.match_node(&tree, span).unwrap();
        assert!(result.name);
        assert_eq!(result.classes, vec!["marker".to_string()]);
        assert_eq!(result.styles, vec!["color".to_string()]);
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_match_fails_on_missing_part() {
        let mut tree = ViewTree::new();
        let a = tree.create_element("a", ElementCategory::Attribute, [("href", "x")]);
        let text = tree.create_text("a");
        let pattern = MatcherPattern::name("a").with_attribute("target", ValuePattern::Any);
        let matcher = Matcher::new(vec![pattern]);
        assert!(matcher.match_node(&tree, a).is_none());
        assert!(matcher.match_node(&tree, text).is_none());

        let matcher = Matcher::new(vec![MatcherPattern::names(&["b", "strong"])]);
        assert_eq!(matcher.element_names().unwrap(), vec!["b", "strong"]);
    }
}
