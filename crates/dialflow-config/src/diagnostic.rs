// SPDX-FileCopyrightText: 2026 Dialflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge with "did you mean?" suggestions.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a key to be offered as a correction.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error carrying enough context for miette to render source
/// spans, suggestions, and the list of valid keys.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no configuration section declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(dialflow::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The key as written in the file or environment.
        key: String,
        /// Closest valid key, when one is similar enough.
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the enclosing section.
        valid_keys: String,
        /// Byte span of the key inside `src`.
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        /// The TOML file the key came from; `None` for environment keys.
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value whose TOML type does not match the field.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(dialflow::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the offending key, e.g. `scheduler.max_wait_secs`.
        key: String,
        /// What was found and what was wanted.
        detail: String,
        /// The expected type, as figment describes it.
        expected: String,
    },

    /// A value that parsed but is not one of the accepted variants
    /// (e.g. `telephony.mode = "sip"`).
    #[error("invalid value for key `{key}`: {detail}")]
    #[diagnostic(code(dialflow::config::invalid_value))]
    InvalidValue {
        /// Dotted path of the offending key.
        key: String,
        /// The rejected value and the accepted variants.
        detail: String,
    },

    /// A field with no default that the merged configuration never set.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(dialflow::config::missing_key),
        help("add `{key} = <value>` to your dialflow.toml")
    )]
    MissingKey {
        /// Name of the missing field.
        key: String,
    },

    /// A value that deserialized but breaks a semantic rule, such as an
    /// out-of-range UTC offset.
    #[error("validation error: {message}")]
    #[diagnostic(code(dialflow::config::validation))]
    Validation {
        /// The rule that failed, naming the key.
        message: String,
    },

    /// Any other figment failure, such as an unreadable file.
    #[error("configuration error: {0}")]
    #[diagnostic(code(dialflow::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert every error inside a `figment::Error` into a [`ConfigError`].
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let key = error
                .path
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(".");
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let suggestion = suggest_key(field, expected);
                    let (span, src) = locate_key(&error, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion,
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: field.to_string(),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.clone(),
                },
                Kind::UnknownVariant(found, variants) => ConfigError::InvalidValue {
                    key,
                    detail: format!("`{found}` is not one of: {}", variants.join(", ")),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Resolve the file and byte span an unknown key came from, if it was a file.
fn locate_key(
    error: &figment::error::Error,
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some(path) = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        })
    else {
        return (None, None);
    };

    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == path) else {
        return (None, None);
    };

    match find_key_offset(content, &error.path, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` in TOML `content`, searching after the `[section]`
/// header named by the first element of `path` (or from the top when empty).
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(after) = trimmed.strip_prefix(field) {
            if after.starts_with([' ', '\t', '=']) {
                return Some(offset + (line.len() - trimmed.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Best Jaro-Winkler match above the threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        if handler.render_report(&mut buf, error as &dyn Diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_keys() {
        let valid = &["calls_per_hour", "start_time", "end_time"];
        assert_eq!(
            suggest_key("calls_per_hr", valid),
            Some("calls_per_hour".to_string())
        );
        assert_eq!(suggest_key("strat_time", valid), Some("start_time".to_string()));
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["mode", "endpoint", "api_token"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn find_key_offset_in_section() {
        let content = "[service]\nname = \"x\"\n[scheduler]\n  max_wiat_secs = 5\n";
        let path = vec!["scheduler".to_string()];
        let offset = find_key_offset(content, &path, "max_wiat_secs").unwrap();
        assert_eq!(&content[offset..offset + 13], "max_wiat_secs");
    }

    #[test]
    fn find_key_offset_ignores_prefix_matches() {
        let content = "[telephony]\nmode_x = 1\nmode = \"http\"\n";
        let path = vec!["telephony".to_string()];
        let offset = find_key_offset(content, &path, "mode").unwrap();
        assert!(content[offset..].starts_with("mode = "));
    }
}
