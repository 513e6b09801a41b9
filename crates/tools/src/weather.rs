//! Weather forecast tool: returns mock three-day forecasts.
//!
//! In production this would call a real weather API. The mock derives its
//! numbers from the location and date so repeated calls agree.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::Tool;

use crate::{DEFAULT_DATE, optional_str, required_str, seed};

const CONDITIONS: [&str; 5] = ["Sunny", "Partly Cloudy", "Clear", "Cloudy", "Light Rain"];

pub struct GetWeatherTool;

#[async_trait]
impl Tool for GetWeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get a three-day weather forecast for a location. Returns daily conditions, high/low temperatures in °C and chance of precipitation, plus humidity and wind speed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City name"
                },
                "date": {
                    "type": "string",
                    "description": "First forecast day (YYYY-MM-DD)",
                    "default": DEFAULT_DATE
                }
            },
            "required": ["location"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let location = required_str(&arguments, "location")?;
        let date = optional_str(&arguments, "date", DEFAULT_DATE);

        let forecast = generate_forecast(location, date);
        info!(location, date, "Retrieved weather forecast");

        serde_json::to_value(&forecast).map_err(|e| ToolError::ExecutionFailed {
            tool_name: self.name().into(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct DailyForecast {
    day: String,
    condition: &'static str,
    high_c: u32,
    low_c: u32,
    precipitation: String,
}

#[derive(Debug, Serialize)]
struct Forecast {
    location: String,
    date: String,
    forecast: Vec<DailyForecast>,
    humidity: String,
    wind_speed: String,
}

/// Pick a value in `lo..=hi` from a hash.
fn pick(hash: u32, lo: u32, hi: u32) -> u32 {
    lo + hash % (hi - lo + 1)
}

fn generate_forecast(location: &str, date: &str) -> Forecast {
    let base = seed(&[location, date]);

    let forecast = (1..=3u32)
        .map(|day| {
            let hash = base.wrapping_add(day.wrapping_mul(0x9E37_79B9)).rotate_left(day * 7);
            DailyForecast {
                day: format!("Day {day}"),
                condition: CONDITIONS[(hash as usize / 11) % CONDITIONS.len()],
                high_c: pick(hash, 20, 32),
                low_c: pick(hash / 13, 12, 20),
                precipitation: format!("{}%", pick(hash / 17, 5, 30)),
            }
        })
        .collect();

    Forecast {
        location: location.to_string(),
        date: date.to_string(),
        forecast,
        humidity: format!("{}%", pick(base / 3, 50, 80)),
        wind_speed: format!("{} km/h", pick(base / 5, 10, 25)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn forecast_covers_three_days() {
        let result = GetWeatherTool
            .execute(json!({"location": "Tokyo"}))
            .await
            .unwrap();

        assert_eq!(result["location"], "Tokyo");
        assert_eq!(result["date"], DEFAULT_DATE);
        let days = result["forecast"].as_array().unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[2]["day"], "Day 3");

        for day in days {
            let high = day["high_c"].as_u64().unwrap();
            let low = day["low_c"].as_u64().unwrap();
            assert!((20..=32).contains(&high));
            assert!((12..=20).contains(&low));
            assert!(CONDITIONS.contains(&day["condition"].as_str().unwrap()));
        }
        assert!(result["wind_speed"].as_str().unwrap().ends_with("km/h"));
    }

    #[tokio::test]
    async fn deterministic_results() {
        let args = json!({"location": "London", "date": "2025-12-15"});
        let r1 = GetWeatherTool.execute(args.clone()).await.unwrap();
        let r2 = GetWeatherTool.execute(args).await.unwrap();
        assert_eq!(r1, r2);
    }

    #[tokio::test]
    async fn missing_location_returns_error() {
        let result = GetWeatherTool.execute(json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn tool_definition() {
        let def = GetWeatherTool.to_definition();
        assert_eq!(def.name, "get_weather");
        assert_eq!(def.parameters["required"][0], "location");
    }
}
