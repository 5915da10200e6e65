// Composite instance keys: {profile}-{app}-{suffix}

use regex::Regex;

/// Profile names may carry spaces; keys never do.
pub fn sanitize_profile(profile: &str) -> String {
    let cleaned: String = profile
        .trim()
        .chars()
        .map(|c| if c.is_whitespace() || c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if cleaned.is_empty() {
        "Default".to_string()
    } else {
        cleaned
    }
}

pub fn key_prefix(profile: &str, app: &str) -> String {
    format!("{}-{}-", sanitize_profile(profile), app)
}

/// Next free numeric key for `profile`/`app`: one past the highest numeric
/// suffix among `existing`, zero padded to two digits.
pub fn next_key(profile: &str, app: &str, existing: &[String]) -> String {
    let prefix = key_prefix(profile, app);
    let highest = match Regex::new(&format!(r"^{}(\d+)$", regex::escape(&prefix))) {
        Ok(pattern) => existing
            .iter()
            .filter_map(|key| pattern.captures(key))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<u64>().ok())
            .max()
            .unwrap_or(0),
        // the pattern is built from an escaped literal
        Err(_) => 0,
    };
    format!("{prefix}{:02}", highest + 1)
}

/// Expand a user-entered key: bare suffixes get the profile/app prefix.
pub fn normalize_key(profile: &str, app: &str, raw: &str) -> String {
    let raw = raw.trim();
    let prefix = key_prefix(profile, app);
    if raw.starts_with(&prefix) {
        raw.to_string()
    } else {
        format!("{prefix}{}", raw.replace(char::is_whitespace, "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_key_starts_at_01() {
        assert_eq!(next_key("Default", "hello", &[]), "Default-hello-01");
    }

    #[test]
    fn test_next_key_skips_past_highest_numeric_suffix() {
        let existing = vec![
            "Default-hello-01".to_string(),
            "Default-hello-07".to_string(),
            "Default-hello-custom".to_string(),
            "Default-other-42".to_string(),
        ];
        assert_eq!(next_key("Default", "hello", &existing), "Default-hello-08");
    }

    #[test]
    fn test_profile_spaces_sanitized() {
        assert_eq!(key_prefix("Acme Corp", "hello"), "Acme_Corp-hello-");
        assert_eq!(sanitize_profile("   "), "Default");
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Default", "hello", "run 2"), "Default-hello-run_2");
        assert_eq!(
            normalize_key("Default", "hello", " Default-hello-05 "),
            "Default-hello-05"
        );
    }
}
