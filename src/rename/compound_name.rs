//! `CompoundDeclName` parsing: `base(label1:label2:)` or a bare `base`.

/// One parameter of a compound name: either a named external label or a
/// wildcard (`_`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterLabel {
    Named(String),
    Wildcard,
}

impl ParameterLabel {
    pub fn as_label_or_underscore(&self) -> &str {
        match self {
            ParameterLabel::Named(name) => name,
            ParameterLabel::Wildcard => "_",
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ParameterLabel::Wildcard)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundDeclName {
    pub base_name: String,
    pub parameters: Vec<ParameterLabel>,
}

impl CompoundDeclName {
    /// Parses a name of the form `base(label1:label2:)` or `base`.
    /// Tolerates a missing closing parenthesis (boundary case in §8):
    /// parameters after the malformed list are simply not produced, so
    /// callers see fewer parameters than intended rather than an error.
    pub fn parse(name: &str) -> Self {
        let Some(open_paren) = name.find('(') else {
            return Self { base_name: name.to_string(), parameters: Vec::new() };
        };
        let base_name = name[..open_paren].to_string();
        let rest = &name[open_paren + 1..];
        let body = rest.strip_suffix(')').unwrap_or(rest);
        let mut parameters = Vec::new();
        for label in body.split(':') {
            if label.is_empty() {
                continue;
            }
            if label == "_" {
                parameters.push(ParameterLabel::Wildcard);
            } else {
                parameters.push(ParameterLabel::Named(label.to_string()));
            }
        }
        Self { base_name, parameters }
    }

    pub fn parameter(&self, index: usize) -> Option<&ParameterLabel> {
        self.parameters.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base_name_only() {
        let name = CompoundDeclName::parse("foo");
        assert_eq!(name.base_name, "foo");
        assert!(name.parameters.is_empty());
    }

    #[test]
    fn parses_labels_and_wildcards() {
        let name = CompoundDeclName::parse("foo(bar:_:)");
        assert_eq!(name.base_name, "foo");
        assert_eq!(
            name.parameters,
            vec![ParameterLabel::Named("bar".into()), ParameterLabel::Wildcard]
        );
    }

    #[test]
    fn missing_closing_paren_is_tolerated() {
        let name = CompoundDeclName::parse("foo(bar:baz");
        assert_eq!(name.base_name, "foo");
        assert_eq!(name.parameters.len(), 2);
    }
}
