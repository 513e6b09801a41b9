//! Built-in travel tools for Wayfarer.
//!
//! Tools give the assistant something to reason over: flight options,
//! weather forecasts and points of interest. All of them return
//! deterministic mock data derived from their arguments, so the
//! orchestration loop can be exercised end-to-end without network access.

pub mod attractions;
pub mod flights;
pub mod weather;

use wayfarer_core::error::ToolError;
use wayfarer_core::tool::ToolRegistry;

pub use attractions::FindAttractionsTool;
pub use flights::SearchFlightsTool;
pub use weather::GetWeatherTool;

/// Travel date used when the caller gives none.
pub const DEFAULT_DATE: &str = "2025-12-01";

/// Create the registry with all built-in tools.
pub fn default_registry() -> Result<ToolRegistry, ToolError> {
    ToolRegistry::builder()
        .register(SearchFlightsTool)
        .register(GetWeatherTool)
        .register(FindAttractionsTool)
        .build()
}

/// Simple string hash for deterministic but varied results.
pub(crate) fn seed(parts: &[&str]) -> u32 {
    parts.iter().fold(0u32, |acc, part| {
        part.to_lowercase()
            .bytes()
            .fold(acc.wrapping_mul(37), |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
    })
}

/// Read a required, non-blank string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::InvalidArguments(format!("Missing '{key}' argument")))
}

/// Read an optional string argument, falling back to `default`.
pub(crate) fn optional_str<'a>(
    arguments: &'a serde_json::Value,
    key: &str,
    default: &'a str,
) -> &'a str {
    arguments[key]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_has_travel_tools() {
        let registry = default_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec!["find_attractions", "get_weather", "search_flights"]
        );
    }

    #[test]
    fn seed_is_case_insensitive_and_order_sensitive() {
        assert_eq!(seed(&["Tokyo"]), seed(&["tokyo"]));
        assert_ne!(seed(&["NYC", "LAX"]), seed(&["LAX", "NYC"]));
    }
}
