//! `{key}` template substitution for download URLs and archive sub-paths.
//!
//! The grammar is fixed: `{`, optional whitespace, a name, optional
//! whitespace, `}`. Only names present in the variable map are replaced.
//! Everything else, including unknown names, unbalanced braces and
//! `${...}` sequences, is copied through byte for byte. Substituted values
//! are emitted as-is and never scanned again.

use std::collections::BTreeMap;

/// Template variables, e.g. `name`, `version`, `os`, `arch`, `ext`.
pub type Variables = BTreeMap<String, String>;

/// Substitute every `{ name }` token whose name is in `vars`.
#[must_use]
pub fn interpolate(template: &str, vars: &Variables) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(end) = after.find(['{', '}']) else {
            // No closing brace anywhere: the remainder is literal
            out.push_str(&rest[open..]);
            return out;
        };

        if after.as_bytes()[end] == b'{' {
            // `{{name}`: the first brace is literal, rescan from the inner one
            out.push_str(&rest[open..=open + end]);
            rest = &after[end..];
            continue;
        }

        let token = &after[..end];
        match lookup(token, vars) {
            Some(value) => out.push_str(value),
            None => out.push_str(&rest[open..open + end + 2]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn lookup<'v>(token: &str, vars: &'v Variables) -> Option<&'v str> {
    let name = token.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    vars.get(name).map(String::as_str)
}
