//! Route extraction from generated controller code.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static ROUTE_ATTRIBUTE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"\[(?:Route|HttpGet|HttpPost|HttpPut|HttpDelete|HttpPatch)\(\s*"([^"]+)"\s*\)\]"#).ok()
});

/// Route templates from `[Route]` and `[Http*]` attributes, sorted and
/// deduplicated.
#[must_use]
pub fn extract_routes(code: &str) -> Vec<String> {
    let Some(pattern) = ROUTE_ATTRIBUTE.as_ref() else {
        return Vec::new();
    };
    pattern
        .captures_iter(code)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_every_attribute_kind_once() {
        let code = r#"
[ApiController]
[Route("api/orders")]
public class OrdersController : ControllerBase
{
    [HttpGet("{id}")]
    public IActionResult Get(int id) => Ok();

    [HttpPost("")]
    [HttpPost("bulk")]
    public IActionResult Create() => Ok();

    [HttpPut("{id}")]
    [HttpDelete("{id}")]
    [HttpPatch( "{id}/status" )]
    [HttpGet("{id}")]
    public IActionResult Other() => Ok();
}"#;
        assert_eq!(
            extract_routes(code),
            vec!["api/orders", "bulk", "{id}", "{id}/status"]
        );
    }

    #[test]
    fn code_without_routes_yields_nothing() {
        assert!(extract_routes("[HttpGet]\npublic class A {}").is_empty());
    }
}
