use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::ConfigError;

/// Matches `{{ env.NAME }}` and `{{ env.NAME | default("value") }}`
fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
    })
}

/// Substitute environment placeholders in raw TOML text
///
/// Comment lines are left untouched, so commented-out secrets never
/// require their variable to be set.
pub fn expand_env(input: &str) -> Result<String, ConfigError> {
    let mut expanded: Vec<String> = Vec::new();

    for line in input.split('\n') {
        if line.trim_start().starts_with('#') {
            expanded.push(line.to_owned());
            continue;
        }

        let mut failure = None;
        let replaced = placeholder().replace_all(line, |caps: &Captures<'_>| {
            match resolve(caps) {
                Ok(value) => value,
                Err(e) => {
                    failure.get_or_insert(e);
                    String::new()
                }
            }
        });

        if let Some(e) = failure {
            return Err(e);
        }

        expanded.push(replaced.into_owned());
    }

    Ok(expanded.join("\n"))
}

/// Resolve one placeholder to its value
fn resolve(caps: &Captures<'_>) -> Result<String, ConfigError> {
    let key = &caps[1];
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(ConfigError::Load(format!("unsupported placeholder `{key}`, expected `env.NAME`")));
    };

    match (std::env::var(name), caps.get(2)) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.as_str().to_owned()),
        (Err(_), None) => Err(ConfigError::Load(format!("environment variable `{name}` is not set"))),
    }
}
