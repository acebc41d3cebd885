//! Weather tool: current conditions from wttr.in.
//!
//! Queries `{base_url}/{city}?format=%C+%t`, which answers with a one-line
//! plain-text summary such as `Partly cloudy +12°C`.

use std::time::Duration;

use async_trait::async_trait;
use stepwise_core::error::ToolError;
use stepwise_core::tool::{InputShape, Tool, ToolInput};
use tracing::{debug, warn};

const FAILURE_TEXT: &str = "Something went wrong while fetching the weather data.";

pub struct WeatherTool {
    base_url: String,
    client: reqwest::Client,
}

impl WeatherTool {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
        }
    }

    fn url_for(&self, city: &str) -> Option<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url).ok()?;
        url.path_segments_mut().ok()?.pop_if_empty().push(city);
        url.set_query(Some("format=%C+%t"));
        Some(url)
    }

    async fn fetch(&self, city: &str) -> Result<String, String> {
        let url = self
            .url_for(city)
            .ok_or_else(|| format!("invalid weather base url '{}'", self.base_url))?;

        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(body.trim().to_string())
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Takes a city name as an input and returns the current weather for the city"
    }

    fn input_shape(&self) -> InputShape {
        InputShape::text("city name, e.g. \"new york\"")
    }

    async fn invoke(&self, input: ToolInput) -> Result<String, ToolError> {
        let city = input
            .text_or_field("city")
            .ok_or_else(|| ToolError::InvalidInput {
                tool_name: self.name().into(),
                reason: format!("expected a city name, got {input}"),
            })?;

        debug!(city, "Fetching weather");

        match self.fetch(city).await {
            Ok(conditions) => Ok(format!("The weather in {city} is {conditions}.")),
            Err(reason) => {
                warn!(city, %reason, "Weather lookup failed");
                Ok(FAILURE_TEXT.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use axum::{Router, extract::{Path, RawQuery}, routing::get};

    #[test]
    fn url_encodes_city() {
        let tool = WeatherTool::new("https://wttr.in/");
        let url = tool.url_for("new york").unwrap();
        assert_eq!(url.as_str(), "https://wttr.in/new%20york?format=%C+%t");
    }

    #[tokio::test]
    async fn formats_conditions() {
        let app = Router::new().route(
            "/{city}",
            get(|Path(city): Path<String>, RawQuery(q): RawQuery| async move {
                assert_eq!(q.as_deref(), Some("format=%C+%t"));
                format!("Sunny +21°C ({city})\n")
            }),
        );
        let base = serve(app).await;

        let tool = WeatherTool::new(base);
        let out = tool.invoke(ToolInput::text("Paris")).await.unwrap();
        assert_eq!(out, "The weather in Paris is Sunny +21°C (Paris).");
    }

    #[tokio::test]
    async fn record_input_with_city_field() {
        let app = Router::new().route("/{city}", get(|| async { "Fog +3°C" }));
        let base = serve(app).await;

        let tool = WeatherTool::new(base);
        let input: ToolInput = serde_json::from_str(r#"{"city":"Oslo"}"#).unwrap();
        let out = tool.invoke(input).await.unwrap();
        assert_eq!(out, "The weather in Oslo is Fog +3°C.");
    }

    #[tokio::test]
    async fn upstream_failure_becomes_apology() {
        let app = Router::new().route(
            "/{city}",
            get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
        );
        let base = serve(app).await;

        let tool = WeatherTool::new(base);
        let out = tool.invoke(ToolInput::text("Paris")).await.unwrap();
        assert_eq!(out, FAILURE_TEXT);
    }

    #[tokio::test]
    async fn missing_city_is_invalid_input() {
        let tool = WeatherTool::new("http://127.0.0.1:1");
        let err = tool.invoke(ToolInput::Empty).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput { .. }));
    }
}
