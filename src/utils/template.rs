//! String template rendering utilities.
//!
//! Placeholders look like `{{name}}` or `{{?name}}`. Names may contain word
//! characters plus `/`, `.`, `:` and `-` (so `{{bin/docker}}` is one name).
//! The `?` marker asks for the value to be shell-quoted on substitution.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// A placeholder found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub quoted: bool,
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*(\?)?\s*([A-Za-z0-9_./:-]+)\s*\}\}").expect("placeholder regex is valid")
    })
}

/// Replace every placeholder using `resolve`. The first error aborts rendering.
pub fn try_render<E, F>(template: &str, mut resolve: F) -> Result<String, E>
where
    F: FnMut(&Placeholder) -> Result<String, E>,
{
    let mut error = None;

    let rendered = placeholder_regex().replace_all(template, |caps: &Captures| {
        if error.is_some() {
            return String::new();
        }
        let placeholder = Placeholder {
            name: caps[2].to_string(),
            quoted: caps.get(1).is_some(),
        };
        match resolve(&placeholder) {
            Ok(value) => value,
            Err(e) => {
                error = Some(e);
                String::new()
            }
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(rendered.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(template: &str) -> Vec<Placeholder> {
        let mut found = Vec::new();
        let _ = try_render::<(), _>(template, |p| {
            found.push(p.clone());
            Ok(String::new())
        });
        found
    }

    #[test]
    fn finds_plain_and_quoted_placeholders() {
        let found = collect("{{bin/docker}} exec -i {{container}} bash -c {{?command}}");
        assert_eq!(
            found,
            vec![
                Placeholder { name: "bin/docker".to_string(), quoted: false },
                Placeholder { name: "container".to_string(), quoted: false },
                Placeholder { name: "command".to_string(), quoted: true },
            ]
        );
    }

    #[test]
    fn text_outside_placeholders_is_kept() {
        let out: Result<String, ()> =
            try_render("[ -x \"$(command -v {{ name }})\" ]", |p| Ok(p.name.to_uppercase()));
        assert_eq!(out.unwrap(), "[ -x \"$(command -v NAME)\" ]");
    }

    #[test]
    fn try_render_stops_at_first_error() {
        let result: Result<String, String> = try_render("{{a}} {{missing}} {{b}}", |p| {
            if p.name == "missing" {
                Err(p.name.clone())
            } else {
                Ok("x".to_string())
            }
        });
        assert_eq!(result.unwrap_err(), "missing");
    }
}
