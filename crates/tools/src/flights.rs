//! Flight search tool: returns mock direct-flight options.
//!
//! Prices are derived from the route so the same query always yields the
//! same fares. Destinations without a commercial airport get road and rail
//! alternatives instead.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;
use wayfarer_core::error::ToolError;
use wayfarer_core::tool::Tool;

use crate::{DEFAULT_DATE, optional_str, required_str, seed};

/// Towns served only by road and rail.
const NO_AIRPORT: &[&str] = &[
    "mancheriyal",
    "karimnagar",
    "nizamabad",
    "adilabad",
    "khammam",
    "warangal",
    "nalgonda",
    "mahbubnagar",
    "medak",
    "rangareddy",
];

pub struct SearchFlightsTool;

#[async_trait]
impl Tool for SearchFlightsTool {
    fn name(&self) -> &str {
        "search_flights"
    }

    fn description(&self) -> &str {
        "Search for flight options between an origin and a destination city on a given date. Returns airlines, prices in USD and schedules, or ground alternatives when the destination has no airport."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "origin": {
                    "type": "string",
                    "description": "Departure city"
                },
                "destination": {
                    "type": "string",
                    "description": "Arrival city"
                },
                "date": {
                    "type": "string",
                    "description": "Travel date (YYYY-MM-DD)",
                    "default": DEFAULT_DATE
                }
            },
            "required": ["origin", "destination"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let origin = required_str(&arguments, "origin")?;
        let destination = required_str(&arguments, "destination")?;
        let date = optional_str(&arguments, "date", DEFAULT_DATE);

        let result = if has_no_airport(destination) {
            info!(origin, destination, "No commercial flights to destination");
            no_flights(origin, destination, date)
        } else {
            let result = flight_options(origin, destination, date);
            info!(origin, destination, date, count = result.flights.len(), "Found flights");
            serde_json::to_value(result).map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.name().into(),
                reason: e.to_string(),
            })?
        };

        Ok(result)
    }
}

fn has_no_airport(city: &str) -> bool {
    let city = city.to_lowercase();
    NO_AIRPORT.contains(&city.as_str())
}

#[derive(Debug, Serialize)]
struct Flight {
    airline: &'static str,
    flight_number: &'static str,
    price_usd: u32,
    departure_time: &'static str,
    arrival_time: &'static str,
    duration: &'static str,
    stops: &'static str,
}

#[derive(Debug, Serialize)]
struct FlightSearch {
    flights: Vec<Flight>,
    origin: String,
    destination: String,
    date: String,
}

fn flight_options(origin: &str, destination: &str, date: &str) -> FlightSearch {
    // 350..=700 USD, stable per route and date
    let base_price = 350 + seed(&[origin, destination, date]) % 351;

    let flight = |airline: &'static str,
                  flight_number: &'static str,
                  price_usd: u32,
                  departure_time: &'static str,
                  arrival_time: &'static str| Flight {
        airline,
        flight_number,
        price_usd,
        departure_time,
        arrival_time,
        duration: "6h 30m",
        stops: "Direct",
    };

    FlightSearch {
        flights: vec![
            flight("Direct Airlines", "DA101", base_price, "07:00 AM", "02:30 PM"),
            flight("Express Air", "EA202", base_price - 30, "11:30 AM", "07:00 PM"),
            flight("Sky Connect", "SC303", base_price + 30, "09:15 AM", "04:45 PM"),
        ],
        origin: origin.to_string(),
        destination: destination.to_string(),
        date: date.to_string(),
    }
}

fn no_flights(origin: &str, destination: &str, date: &str) -> serde_json::Value {
    serde_json::json!({
        "message": format!(
            "No commercial flights available to {destination}. This destination does not have a commercial airport."
        ),
        "alternatives": [
            {
                "option": "Road Transport",
                "description": format!(
                    "Consider travelling by bus or car from {origin}. Estimated journey time: 3-5 hours."
                ),
                "recommended": true
            },
            {
                "option": "Train",
                "description": format!(
                    "Check Indian Railways for train services from {origin} to nearby stations."
                ),
                "recommended": true
            }
        ],
        "origin": origin,
        "destination": destination,
        "date": date,
    })
}
