//! Prompt templates with `{name}` placeholders
//!
//! `{{` and `}}` are literal braces. Any other brace that does not form a
//! placeholder is a template error.

use std::collections::BTreeSet;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// Parsed prompt template
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template string
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        match c {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(Error::template("Nested '{' in placeholder")),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(Error::template("Unclosed '{' in template"));
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(Error::template("Empty placeholder '{}' in template"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name.to_string()));
                }
                '}' => return Err(Error::template("Unmatched '}' in template")),
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Placeholder names in the template
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Substitute every placeholder. Values must cover exactly the placeholders.
    pub fn render(&self, values: &[(&str, &str)]) -> Result<String> {
        let placeholders = self.placeholders();

        for (name, _) in values {
            if !placeholders.contains(name) {
                return Err(Error::template(format!(
                    "Value supplied for unknown placeholder '{}'",
                    name
                )));
            }
        }

        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            Error::template(format!("Missing value for placeholder '{}'", name))
                        })?;
                    output.push_str(value);
                }
            }
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_PROMPT_TEMPLATE;

    #[test]
    fn test_default_template_renders() {
        let template = PromptTemplate::parse(DEFAULT_PROMPT_TEMPLATE).unwrap();
        assert_eq!(
            template.placeholders().into_iter().collect::<Vec<_>>(),
            vec!["contexts", "question"]
        );

        let prompt = template
            .render(&[("contexts", "A\n\n -- \n\nB"), ("question", "Why?")])
            .unwrap();
        assert_eq!(
            prompt,
            "Given the following contexts, answer the question:\n\nContexts:\n -- \n\nA\n\n -- \n\nB\n\nQuestion: Why?\n\nAnswer:"
        );
    }

    #[test]
    fn test_escaped_braces() {
        let template = PromptTemplate::parse("{{json}} {x} }}").unwrap();
        assert_eq!(template.render(&[("x", "1")]).unwrap(), "{json} 1 }");
    }

    #[test]
    fn test_values_are_not_reinterpreted() {
        let template = PromptTemplate::parse("Q: {question}").unwrap();
        assert_eq!(
            template.render(&[("question", "{contexts}")]).unwrap(),
            "Q: {contexts}"
        );
    }

    #[test]
    fn test_missing_and_extra_values() {
        let template = PromptTemplate::parse("{a} and {b}").unwrap();
        assert!(matches!(
            template.render(&[("a", "1")]),
            Err(Error::Template(_))
        ));
        assert!(matches!(
            template.render(&[("a", "1"), ("b", "2"), ("c", "3")]),
            Err(Error::Template(_))
        ));
    }

    #[test]
    fn test_malformed_templates() {
        for bad in ["{unclosed", "stray }", "{}", "{a{b}}"] {
            assert!(PromptTemplate::parse(bad).is_err(), "{}", bad);
        }
    }
}
