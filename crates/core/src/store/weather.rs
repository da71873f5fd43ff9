//! Weather-domain helpers over the store.
//!
//! Current conditions and forecasts are keyed by coordinates rounded to two
//! decimal places, so requests for nearby points share one entry.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::Store;
use crate::Error;

pub const WEATHER_PREFIX: &str = "weather";
pub const FORECAST_PREFIX: &str = "forecast";
pub const LAST_LOCATION_KEY: &str = "lastLocation";

/// Lifetime of cached weather and forecast payloads.
pub const WEATHER_TTL: Duration = Duration::from_secs(60 * 60);

/// Lifetime of the remembered location.
pub const LAST_LOCATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A place the user has looked at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Store key for a payload kind at a rounded coordinate.
pub fn coordinate_key(prefix: &str, lat: f64, lon: f64) -> String {
    format!("{prefix}_{lat:.2}_{lon:.2}")
}

impl Store {
    pub async fn get_cached_weather<T: DeserializeOwned>(&self, lat: f64, lon: f64) -> Option<T> {
        self.get_as(&coordinate_key(WEATHER_PREFIX, lat, lon)).await
    }

    pub async fn set_cached_weather<T: Serialize + ?Sized>(&self, lat: f64, lon: f64, data: &T) -> Result<(), Error> {
        self.set(&coordinate_key(WEATHER_PREFIX, lat, lon), data, Some(WEATHER_TTL)).await
    }

    pub async fn get_cached_forecast<T: DeserializeOwned>(&self, lat: f64, lon: f64) -> Option<T> {
        self.get_as(&coordinate_key(FORECAST_PREFIX, lat, lon)).await
    }

    pub async fn set_cached_forecast<T: Serialize + ?Sized>(&self, lat: f64, lon: f64, data: &T) -> Result<(), Error> {
        self.set(&coordinate_key(FORECAST_PREFIX, lat, lon), data, Some(WEATHER_TTL)).await
    }

    /// Drop cached weather and forecast for a coordinate so the next read
    /// goes to the network.
    pub async fn invalidate_weather(&self, lat: f64, lon: f64) -> Result<(), Error> {
        self.remove(&coordinate_key(WEATHER_PREFIX, lat, lon)).await?;
        self.remove(&coordinate_key(FORECAST_PREFIX, lat, lon)).await
    }

    pub async fn get_last_location(&self) -> Option<Location> {
        self.get_as(LAST_LOCATION_KEY).await
    }

    pub async fn set_last_location(&self, location: &Location) -> Result<(), Error> {
        self.set(LAST_LOCATION_KEY, location, Some(LAST_LOCATION_TTL)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FlatBackend, StoreBackend};
    use serde_json::{Value, json};

    fn store() -> Store {
        Store::with_backend(StoreBackend::Secondary(FlatBackend::new()), Duration::from_secs(60))
    }

    #[test]
    fn test_coordinate_key_rounds() {
        assert_eq!(coordinate_key(WEATHER_PREFIX, 51.5074, -0.1278), "weather_51.51_-0.13");
        assert_eq!(coordinate_key(FORECAST_PREFIX, 40.0, 7.0), "forecast_40.00_7.00");
    }

    #[tokio::test]
    async fn test_nearby_points_share_entry() {
        let store = store();
        store.set_cached_weather(51.5074, -0.1278, &json!({"name": "London"})).await.unwrap();

        let hit: Option<Value> = store.get_cached_weather(51.5091, -0.1301).await;
        assert_eq!(hit, Some(json!({"name": "London"})));

        let miss: Option<Value> = store.get_cached_weather(51.52, -0.13).await;
        assert_eq!(miss, None);
    }

    #[tokio::test]
    async fn test_weather_and_forecast_are_separate() {
        let store = store();
        store.set_cached_weather(1.0, 2.0, &json!("now")).await.unwrap();
        store.set_cached_forecast(1.0, 2.0, &json!(["later"])).await.unwrap();

        assert_eq!(store.get_cached_weather::<Value>(1.0, 2.0).await, Some(json!("now")));
        assert_eq!(store.get_cached_forecast::<Value>(1.0, 2.0).await, Some(json!(["later"])));
    }

    #[tokio::test]
    async fn test_invalidate_weather() {
        let store = store();
        store.set_cached_weather(1.0, 2.0, &json!("now")).await.unwrap();
        store.set_cached_forecast(1.0, 2.0, &json!("later")).await.unwrap();

        store.invalidate_weather(1.001, 1.999).await.unwrap();

        assert_eq!(store.get_cached_weather::<Value>(1.0, 2.0).await, None);
        assert_eq!(store.get_cached_forecast::<Value>(1.0, 2.0).await, None);
    }

    #[tokio::test]
    async fn test_last_location_round_trip() {
        let store = store();
        assert_eq!(store.get_last_location().await, None);

        let london = Location { lat: 51.5074, lon: -0.1278, name: Some("London".into()), country: Some("GB".into()) };
        store.set_last_location(&london).await.unwrap();
        assert_eq!(store.get_last_location().await, Some(london));
    }

    #[tokio::test]
    async fn test_weather_ttl_is_one_hour() {
        let store = store();
        store.set_cached_weather(1.0, 2.0, &json!(1)).await.unwrap();

        let entry = store.backend().await.get("weather_1.00_2.00").await.unwrap().unwrap();
        assert_eq!(entry.ttl_ms, 3_600_000);
    }
}
