//! Argument normalization utilities.

use serde_json::{json, Value};

/// One or many names, in caller order.
///
/// A single string is treated as a one-element list, so both
/// `run_task_in_containers(.., "app", ..)` and `.., vec!["app", "worker"], ..`
/// read naturally at call sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameList(Vec<String>);

impl NameList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }
}

impl From<&str> for NameList {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for NameList {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for NameList {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<Vec<&str>> for NameList {
    fn from(names: Vec<&str>) -> Self {
        Self(names.into_iter().map(str::to_string).collect())
    }
}

impl From<&[String]> for NameList {
    fn from(names: &[String]) -> Self {
        Self(names.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for NameList {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<'a> IntoIterator for &'a NameList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parse a string value into appropriate JSON type.
/// Order: JSON literal → bool → number → string
pub fn parse_value(s: &str) -> Value {
    // JSON first (arrays, objects, quoted strings, numbers, booleans, null)
    if let Ok(v) = serde_json::from_str(s) {
        return v;
    }
    if s == "true" {
        return json!(true);
    }
    if s == "false" {
        return json!(false);
    }
    json!(s)
}

/// Split a `key=value` assignment. The value is parsed with [`parse_value`].
pub fn parse_assignment(raw: &str) -> Option<(String, Value)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), parse_value(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_name_becomes_one_element_list() {
        let names = NameList::from("app");
        assert_eq!(names.as_slice(), &["app".to_string()]);
    }

    #[test]
    fn list_keeps_input_order() {
        let names = NameList::from(vec!["web", "worker", "cron"]);
        let collected: Vec<&str> = names.iter().map(String::as_str).collect();
        assert_eq!(collected, vec!["web", "worker", "cron"]);
    }

    #[test]
    fn parse_assignment_types_values() {
        assert_eq!(parse_assignment("replicas=3"), Some(("replicas".to_string(), json!(3))));
        assert_eq!(parse_assignment("debug=true"), Some(("debug".to_string(), json!(true))));
        assert_eq!(
            parse_assignment("cwd=/var/www/app"),
            Some(("cwd".to_string(), json!("/var/www/app")))
        );
        assert_eq!(
            parse_assignment("cmd=a=b"),
            Some(("cmd".to_string(), json!("a=b")))
        );
    }

    #[test]
    fn parse_assignment_rejects_missing_key() {
        assert_eq!(parse_assignment("=value"), None);
        assert_eq!(parse_assignment("novalue"), None);
    }
}
