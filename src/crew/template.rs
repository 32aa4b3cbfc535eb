//! Placeholder substitution for agent and task templates
//!
//! Templates reference run-time inputs as `{name}` where `name` is an
//! identifier (`[A-Za-z_][A-Za-z0-9_]*`). Braces that do not wrap an
//! identifier, such as JSON snippets in a description, are copied through
//! untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

/// Template rendering errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("Unresolved placeholder: {{{placeholder}}}")]
    UnresolvedPlaceholder { placeholder: String },
}

/// Names referenced by `template`, in order of first appearance
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Substitute every placeholder in `template` with its input value
pub fn render(template: &str, inputs: &HashMap<String, String>) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = inputs
            .get(name.as_str())
            .ok_or_else(|| TemplateError::UnresolvedPlaceholder {
                placeholder: name.as_str().to_string(),
            })?;

        rendered.push_str(&template[last..whole.start()]);
        rendered.push_str(value);
        last = whole.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}

/// Input keys that none of `templates` reference, sorted
pub fn unused_inputs<'a, I>(templates: I, inputs: &HashMap<String, String>) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let referenced: BTreeSet<String> = templates.into_iter().flat_map(placeholders).collect();

    let mut unused: Vec<String> = inputs
        .keys()
        .filter(|key| !referenced.contains(key.as_str()))
        .cloned()
        .collect();
    unused.sort();
    unused
}
