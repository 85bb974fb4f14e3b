use serde_json::Value;
use url::Url;
use crate::error::{ResearchError, Result};

/// Appends percent-encoded path segments to an endpoint base URL
///
/// Each segment is encoded on its own, so `/`, `?` and `#` inside a package
/// name never change the shape of the request.
fn endpoint_url<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| ResearchError::Config(format!("invalid endpoint {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| ResearchError::Config(format!("endpoint {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

/// Registry metadata URL; scoped names keep their `@` and encode the slash
pub fn npm_registry_url(registry: &str, package: &str) -> Result<String> {
    endpoint_url(registry, [package])
}

/// Last-week download count URL for an npm package
pub fn npm_downloads_url(api: &str, package: &str) -> Result<String> {
    endpoint_url(api, ["downloads", "point", "last-week"].into_iter().chain(package.split('/')))
}

/// PyPI JSON API URL
pub fn pypi_json_url(pypi: &str, package: &str) -> Result<String> {
    endpoint_url(pypi, ["pypi", package, "json"])
}

/// PyPI project page URL
pub fn pypi_page_url(pypi_web: &str, package: &str) -> Result<String> {
    endpoint_url(pypi_web, ["project", package, ""])
}

/// RubyGems JSON API URL
pub fn rubygems_json_url(rubygems: &str, package: &str) -> Result<String> {
    let file = format!("{package}.json");
    endpoint_url(rubygems, ["api", "v1", "gems", file.as_str()])
}

/// Registry placeholder strings that mean "not provided"
const PLACEHOLDERS: [&str; 3] = ["unknown", "none", "null"];

/// Trims `value` and drops empty strings and registry placeholders
pub fn clean(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed.to_lowercase().as_str()) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// String field of a JSON object, cleaned
pub fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).and_then(clean)
}

/// Splits a keyword string on commas, or on whitespace when there are none
pub fn split_keywords(raw: &str) -> Vec<String> {
    let parts: Vec<&str> = if raw.contains(',') {
        raw.split(',').collect()
    } else {
        raw.split_whitespace().collect()
    };
    parts.into_iter().filter_map(clean).collect()
}

/// Keywords given either as a JSON array or as one delimited string
pub fn keywords_field(value: &Value, key: &str) -> Vec<String> {
    match value.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).filter_map(clean).collect(),
        Some(Value::String(raw)) => split_keywords(raw),
        _ => Vec::new(),
    }
}

/// Appends a `"Label: url"` resource unless the URL is already listed
pub fn push_resource(resources: &mut Vec<String>, label: &str, url: Option<&str>) {
    let Some(url) = url.and_then(clean) else {
        return;
    };
    if resources.iter().any(|existing| existing.ends_with(&format!(": {url}"))) {
        return;
    }
    resources.push(format!("{label}: {url}"));
}

/// Truncates to `max` characters, appending `...` when anything was cut
pub fn truncate_with_marker(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_urls() {
        assert_eq!(
            npm_registry_url("https://registry.npmjs.org/", "@types/node").unwrap(),
            "https://registry.npmjs.org/@types%2Fnode"
        );
        assert_eq!(
            npm_downloads_url("https://api.npmjs.org", "@types/node").unwrap(),
            "https://api.npmjs.org/downloads/point/last-week/@types/node"
        );
        assert_eq!(pypi_json_url("https://pypi.org", "requests").unwrap(), "https://pypi.org/pypi/requests/json");
        assert_eq!(
            rubygems_json_url("https://rubygems.org", "rack").unwrap(),
            "https://rubygems.org/api/v1/gems/rack.json"
        );
        assert_eq!(pypi_page_url("https://pypi.org", "six").unwrap(), "https://pypi.org/project/six/");
        assert_eq!(
            pypi_json_url("http://127.0.0.1:1234/mirror/", "six").unwrap(),
            "http://127.0.0.1:1234/mirror/pypi/six/json"
        );
    }

    #[test_case("x?admin=1", "https://pypi.org/pypi/x%3Fadmin=1/json" ; "query")]
    #[test_case("x#frag", "https://pypi.org/pypi/x%23frag/json" ; "fragment")]
    #[test_case("../simple", "https://pypi.org/pypi/..%2Fsimple/json" ; "traversal")]
    #[test_case("a b", "https://pypi.org/pypi/a%20b/json" ; "space")]
    fn test_names_cannot_reshape_urls(name: &str, expected: &str) {
        assert_eq!(pypi_json_url("https://pypi.org", name).unwrap(), expected);
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        assert!(matches!(pypi_json_url("not a url", "six"), Err(ResearchError::Config(_))));
    }

    #[test_case("  MIT ", Some("MIT"))]
    #[test_case("UNKNOWN", None)]
    #[test_case("None", None)]
    #[test_case("   ", None)]
    fn test_clean(input: &str, expected: Option<&str>) {
        assert_eq!(clean(input).as_deref(), expected);
    }

    #[test]
    fn test_keywords() {
        assert_eq!(split_keywords("http, client ,requests"), vec!["http", "client", "requests"]);
        assert_eq!(split_keywords("http client"), vec!["http", "client"]);
        assert_eq!(keywords_field(&json!({"keywords": ["pad", ""]}), "keywords"), vec!["pad"]);
        assert!(keywords_field(&json!({"keywords": null}), "keywords").is_empty());
    }

    #[test]
    fn test_push_resource_deduplicates_urls() {
        let mut resources = Vec::new();
        push_resource(&mut resources, "Homepage", Some("https://example.com"));
        push_resource(&mut resources, "Documentation", Some("https://example.com"));
        push_resource(&mut resources, "Source", Some(""));
        assert_eq!(resources, vec!["Homepage: https://example.com"]);
    }

    #[test]
    fn test_truncate_with_marker() {
        assert_eq!(truncate_with_marker("short", 200), "short");
        let long = "é".repeat(250);
        let cut = truncate_with_marker(&long, 200);
        assert_eq!(cut.chars().count(), 203);
        assert!(cut.ends_with("..."));
    }
}
