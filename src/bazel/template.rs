//! Rendering of user-supplied query templates.
//!
//! A query template narrows the impacted set, e.g. `kind(".*_test", set({{ targets }}))` to
//! keep only tests. Templates are rendered with Tera and two variables:
//!
//! - `targets`: the impacted labels joined by spaces
//! - `target_list`: the impacted labels as an array, for `{% for %}` loops
//!
//! The Go-template placeholder `{{.Targets}}` is accepted as an alias for `{{ targets }}` so
//! templates written for older tooling keep working.

use std::borrow::Cow;
use std::error::Error as _;
use std::sync::LazyLock;

use regex::Regex;
use tera::{Context as TeraContext, Tera};

use crate::core::DifferError;
use crate::impact::ImpactSet;

/// Go-template spelling of the targets placeholder, whitespace inside the braces allowed.
static GO_TARGETS_PLACEHOLDER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*\.Targets\s*\}\}").ok());

/// Renders `template` against the impacted labels.
///
/// # Errors
///
/// Returns [`DifferError::QueryTemplateError`] if Tera rejects the template.
pub fn render_query(template: &str, targets: &ImpactSet) -> Result<String, DifferError> {
    let normalized = rewrite_go_placeholders(template);

    let mut context = TeraContext::new();
    let labels: Vec<&str> = targets.iter().map(String::as_str).collect();
    context.insert("targets", &labels.join(" "));
    context.insert("target_list", &labels);

    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());
    tera.render_str(&normalized, &context).map_err(|e| DifferError::QueryTemplateError {
        template: template.to_string(),
        reason: tera_error_chain(&e),
    })
}

/// Replaces every `{{.Targets}}` with `{{ targets }}`.
fn rewrite_go_placeholders(template: &str) -> Cow<'_, str> {
    match GO_TARGETS_PLACEHOLDER.as_ref() {
        Some(re) => re.replace_all(template, "{{ targets }}"),
        None => Cow::Borrowed(template),
    }
}

/// Tera nests the useful message in the error's source chain.
fn tera_error_chain(error: &tera::Error) -> String {
    let mut messages = vec![error.to_string()];
    let mut source = error.source();
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    messages.join(": ")
}
