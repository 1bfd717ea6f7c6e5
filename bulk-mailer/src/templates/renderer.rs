//! Template rendering with variable substitution

use std::collections::HashMap;
use thiserror::Error;

/// Template rendering failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A placeholder has no value in the variable map
    #[error("missing template variable `{0}`")]
    MissingVariable(String),
}

/// Renders templates by substituting `{name}` placeholders
///
/// A placeholder is `{`, one or more ASCII letters, digits or underscores,
/// then `}`. Any other brace is copied through unchanged, so inline CSS such
/// as `p { margin: 0 }` survives rendering. Substituted values are inserted
/// verbatim and never re-scanned.
pub struct TemplateRenderer;

impl TemplateRenderer {
    /// Render a template with provided variables
    ///
    /// # Arguments
    /// * `template` - Template text containing `{name}` placeholders
    /// * `vars` - HashMap of variable names to values
    ///
    /// # Errors
    /// [`TemplateError::MissingVariable`] naming the first placeholder that
    /// has no entry in `vars`.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut rendered = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            rendered.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match placeholder_name(after) {
                Some(name) => {
                    let value = vars
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingVariable(name.to_string()))?;
                    rendered.push_str(value);
                    // skip the name and its closing brace
                    rest = &after[name.len() + 1..];
                }
                None => {
                    rendered.push('{');
                    rest = after;
                }
            }
        }

        rendered.push_str(rest);
        Ok(rendered)
    }

    /// Extract all variable names from a template string
    ///
    /// Returns the distinct names, sorted.
    pub fn extract_variables(template: &str) -> Vec<String> {
        let mut variables = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match placeholder_name(after) {
                Some(name) => {
                    variables.push(name.to_string());
                    rest = &after[name.len() + 1..];
                }
                None => rest = after,
            }
        }

        variables.sort();
        variables.dedup();
        variables
    }

    /// Names referenced by `template` that `vars` does not provide
    pub fn missing_variables(template: &str, vars: &HashMap<String, String>) -> Vec<String> {
        Self::extract_variables(template)
            .into_iter()
            .filter(|name| !vars.contains_key(name))
            .collect()
    }
}

/// Name of the placeholder starting right after a `{`, if `s` begins with one
fn placeholder_name(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    if end > 0 && s[end..].starts_with('}') {
        Some(&s[..end])
    } else {
        None
    }
}
