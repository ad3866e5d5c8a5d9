// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Weather domain, backed by wttr.in's JSON format. Kept deliberately thin:
//! the spec treats individual domain algorithms as replaceable external
//! collaborators, so this domain's job is only to prove the `Domain`
//! contract works end to end for an HTTP-backed task.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};

const COLOR_HEX: u32 = 0xFF03_A9F4;

pub struct WeatherDomain {
    client: reqwest::Client,
}

impl Default for WeatherDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherDomain {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn fetch_wttr(&self, location: &str) -> Result<Value, String> {
        let url = format!("https://wttr.in/{}?format=j1", urlencoding::encode(location));
        let resp = self.client.get(&url).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("wttr.in returned status {}", resp.status()));
        }
        resp.json::<Value>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Domain for WeatherDomain {
    fn id(&self) -> &str {
        "weather"
    }

    fn name(&self) -> &str {
        "Weather"
    }

    fn task_types(&self) -> Vec<String> {
        vec!["weather_current".to_string(), "weather_forecast".to_string()]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "weather_current".to_string(),
            DisplayConfig {
                card_type: "weather".to_string(),
                title_template: "Weather".to_string(),
                subtitle_template: None,
                icon: "cloud".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "weather_forecast".to_string(),
            DisplayConfig {
                card_type: "weather".to_string(),
                title_template: "Forecast".to_string(),
                subtitle_template: None,
                icon: "wb_sunny".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map
    }

    async fn execute_task(
        &self,
        task_type: &str,
        task_data: &TaskData,
    ) -> Result<TaskResult, CoreError> {
        let location = task_data.get("location").and_then(Value::as_str).unwrap_or("").to_string();
        let result = match task_type {
            "weather_current" => self.current_weather(&location).await,
            "weather_forecast" => self.forecast(&location).await,
            other => TaskResult::err(format!("Unknown weather task: {other}")),
        };
        Ok(result)
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key)?.as_array()?.first()?.as_str().map(str::to_string)
}

fn nested_str(value: &Value, array_key: &str, field: &str) -> Option<String> {
    value.get(array_key)?.as_array()?.first()?.get(field)?.as_str().map(str::to_string)
}

impl WeatherDomain {
    async fn current_weather(&self, location: &str) -> TaskResult {
        let json = match self.fetch_wttr(location).await {
            Ok(json) => json,
            Err(err) => return with_domain(TaskResult::err(format!("Weather error: {err}"))),
        };

        let Some(current) = json.get("current_condition").and_then(Value::as_array).and_then(|a| a.first())
        else {
            return with_domain(TaskResult::err("No weather data available"));
        };

        let city = nested_str(&json, "nearest_area", "areaName")
            .or_else(|| {
                json.get("nearest_area")
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(|area| area.get("areaName"))
                    .and_then(Value::as_array)
                    .and_then(|a| a.first())
                    .and_then(|v| v.get("value"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| location.to_string());

        let mut fields = Map::new();
        fields.insert("location".to_string(), Value::String(city));
        fields.insert("temperature_c".to_string(), current.get("temp_C").cloned().unwrap_or(Value::Null));
        fields.insert("temperature_f".to_string(), current.get("temp_F").cloned().unwrap_or(Value::Null));
        fields.insert(
            "feels_like_c".to_string(),
            current.get("FeelsLikeC").cloned().unwrap_or(Value::Null),
        );
        fields.insert(
            "condition".to_string(),
            Value::String(str_field(current, "weatherDesc").unwrap_or_default()),
        );
        fields.insert("humidity".to_string(), current.get("humidity").cloned().unwrap_or(Value::Null));
        fields.insert(
            "wind_mph".to_string(),
            current.get("windspeedMiles").cloned().unwrap_or(Value::Null),
        );
        fields.insert(
            "wind_dir".to_string(),
            current.get("winddir16Point").cloned().unwrap_or(Value::Null),
        );
        fields.insert("domain".to_string(), Value::String("weather".to_string()));
        fields.insert("card_type".to_string(), Value::String("weather".to_string()));
        TaskResult::ok(fields)
    }

    async fn forecast(&self, location: &str) -> TaskResult {
        let json = match self.fetch_wttr(location).await {
            Ok(json) => json,
            Err(err) => return with_domain(TaskResult::err(format!("Forecast error: {err}"))),
        };

        let Some(weather) = json.get("weather").and_then(Value::as_array) else {
            return with_domain(TaskResult::err("No forecast data available"));
        };
        if weather.is_empty() {
            return with_domain(TaskResult::err("No forecast data available"));
        }

        let city = json
            .get("nearest_area")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|area| str_field(area, "areaName"))
            .unwrap_or_else(|| location.to_string());

        let days: Vec<Value> = weather
            .iter()
            .map(|day| {
                let hourly = day.get("hourly").and_then(Value::as_array);
                let condition = hourly
                    .and_then(|h| h.get(4))
                    .and_then(|slot| str_field(slot, "weatherDesc"))
                    .unwrap_or_default();
                let mut entry = Map::new();
                entry.insert("date".to_string(), day.get("date").cloned().unwrap_or(Value::Null));
                entry.insert("max_c".to_string(), day.get("maxtempC").cloned().unwrap_or(Value::Null));
                entry.insert("min_c".to_string(), day.get("mintempC").cloned().unwrap_or(Value::Null));
                entry.insert("max_f".to_string(), day.get("maxtempF").cloned().unwrap_or(Value::Null));
                entry.insert("min_f".to_string(), day.get("mintempF").cloned().unwrap_or(Value::Null));
                entry.insert("condition".to_string(), Value::String(condition));
                Value::Object(entry)
            })
            .collect();

        let mut fields = Map::new();
        fields.insert("location".to_string(), Value::String(city));
        fields.insert("days".to_string(), Value::Array(days));
        fields.insert("domain".to_string(), Value::String("weather".to_string()));
        fields.insert("card_type".to_string(), Value::String("weather".to_string()));
        TaskResult::ok(fields)
    }
}

fn with_domain(mut result: TaskResult) -> TaskResult {
    result.0.insert("domain".to_string(), Value::String("weather".to_string()));
    result
}
