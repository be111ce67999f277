//! Placeholder discovery in rendered compose manifests.
//!
//! Recognizes:
//! - `${NAME}` - a required variable
//! - `${NAME:default}` - a variable with a default; the default is ignored
//!
//! This is a syntactic scan of the manifest text, not a parse of its
//! structure. Anything between `${` and the first `:` or `}` is a name.

use lighthouse_core::secret::SecretRequirement;
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}:]+)(?::[^}]*)?\}").unwrap());

/// Collect the distinct variable names referenced in `text`.
pub fn find_placeholders(text: &str) -> SecretRequirement {
    PLACEHOLDER_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}
