//! `${NAME}` token substitution
//!
//! A token is `${KEY}` or `${KEY,ALT,...}`. Each key is looked up in the
//! supplied values first and in the process environment otherwise; the
//! first non-empty result replaces the token. A token nothing resolves is
//! left verbatim, or removed when `empty` is requested.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Value set available to substitution, e.g. `CONF_DIR`
pub type Values = HashMap<String, String>;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{[^}]*\}").expect("token pattern is valid"))
}

/// Replace every token in `input`
pub fn substitute(values: &Values, input: &str, empty: bool) -> String {
    token_pattern()
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let token = &caps[0];
            let inner = token.trim_matches(|c| matches!(c, '$' | '{' | '}' | '\t' | ' '));
            for key in inner.split(',') {
                let value = match values.get(key) {
                    Some(v) => v.clone(),
                    None => std::env::var(key).unwrap_or_default(),
                };
                if !value.is_empty() {
                    return value;
                }
            }
            if empty {
                String::new()
            } else {
                token.to_string()
            }
        })
        .into_owned()
}
