use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Matches `{{ env.NAME }}` and `{{ env.NAME | default("value") }}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
});

/// Substitute environment placeholders in raw TOML text
///
/// Comment lines are copied verbatim so that commented-out secrets never
/// have to be present in the environment.
pub fn expand_env(input: &str) -> Result<String, String> {
    let mut lines = Vec::new();

    for line in input.split('\n') {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
        } else {
            lines.push(expand_line(line)?);
        }
    }

    Ok(lines.join("\n"))
}

fn expand_line(line: &str) -> Result<String, String> {
    let mut failure = None;

    let expanded = PLACEHOLDER.replace_all(line, |caps: &Captures<'_>| {
        match resolve(&caps[1], caps.get(2).map(|m| m.as_str())) {
            Ok(value) => value,
            Err(e) => {
                failure.get_or_insert(e);
                String::new()
            }
        }
    });

    match failure {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

fn resolve(key: &str, fallback: Option<&str>) -> Result<String, String> {
    let Some(name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(format!("only variables scoped with 'env.' are supported: `{key}`"));
    };

    match (std::env::var(name), fallback) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(fallback)) => Ok(fallback.to_owned()),
        (Err(_), None) => Err(format!("environment variable not found: `{name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_without_placeholders_is_untouched() {
        let input = "key = \"value\"\n";
        assert_eq!(expand_env(input).unwrap(), input);
    }

    #[test]
    fn substitutes_variables_on_several_lines() {
        let vars = [("MOSAIC_A", Some("one")), ("MOSAIC_B", Some("two"))];
        temp_env::with_vars(vars, || {
            let result = expand_env("a = \"{{ env.MOSAIC_A }}\"\nb = \"{{env.MOSAIC_B}}\"").unwrap();
            assert_eq!(result, "a = \"one\"\nb = \"two\"");
        });
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        temp_env::with_var_unset("MOSAIC_MISSING", || {
            let err = expand_env("key = \"{{ env.MOSAIC_MISSING }}\"").unwrap_err();
            assert!(err.contains("MOSAIC_MISSING"));
        });
    }

    #[test]
    fn default_applies_only_when_unset() {
        temp_env::with_var_unset("MOSAIC_OPTIONAL", || {
            let result = expand_env("key = \"{{ env.MOSAIC_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"fallback\"");
        });
        temp_env::with_var("MOSAIC_OPTIONAL", Some("set"), || {
            let result = expand_env("key = \"{{ env.MOSAIC_OPTIONAL | default(\"fallback\") }}\"").unwrap();
            assert_eq!(result, "key = \"set\"");
        });
    }

    #[test]
    fn non_env_scope_is_rejected() {
        let err = expand_env("key = \"{{ vault.TOKEN }}\"").unwrap_err();
        assert!(err.contains("only variables scoped with 'env.'"));
    }

    #[test]
    fn comments_are_not_expanded() {
        temp_env::with_var_unset("MOSAIC_MISSING", || {
            let input = "  # api_key = \"{{ env.MOSAIC_MISSING }}\"";
            assert_eq!(expand_env(input).unwrap(), input);
        });
    }
}
