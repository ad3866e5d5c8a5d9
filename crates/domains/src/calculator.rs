// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Calculator & Conversions domain: arithmetic, unit conversion, timezone
//! lookup, and date math. These task types are exercised directly by the
//! pipeline engine's own test scenarios, so unlike the daemon's other
//! built-in domains this one is a full reimplementation rather than a thin
//! stand-in.

use std::collections::HashMap;

use async_trait::async_trait;
use opencli_core::domain::DisplayConfig;
use opencli_core::{CoreError, Domain, TaskData, TaskResult};
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};

const COLOR_HEX: u32 = 0xFF3F51B5;

#[derive(Default)]
pub struct CalculatorDomain;

#[async_trait]
impl Domain for CalculatorDomain {
    fn id(&self) -> &str {
        "calculator"
    }

    fn name(&self) -> &str {
        "Calculator & Conversions"
    }

    fn task_types(&self) -> Vec<String> {
        vec![
            "calculator_eval".to_string(),
            "calculator_convert".to_string(),
            "calculator_timezone".to_string(),
            "calculator_date_math".to_string(),
        ]
    }

    fn display_configs(&self) -> HashMap<String, DisplayConfig> {
        let mut map = HashMap::new();
        map.insert(
            "calculator_eval".to_string(),
            DisplayConfig {
                card_type: "calculator".to_string(),
                title_template: "Calculator".to_string(),
                subtitle_template: None,
                icon: "calculate".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "calculator_convert".to_string(),
            DisplayConfig {
                card_type: "calculator".to_string(),
                title_template: "Conversion".to_string(),
                subtitle_template: None,
                icon: "swap_horiz".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "calculator_timezone".to_string(),
            DisplayConfig {
                card_type: "calculator".to_string(),
                title_template: "Timezone".to_string(),
                subtitle_template: None,
                icon: "public".to_string(),
                color_hex: COLOR_HEX,
            },
        );
        map.insert(
            "calculator_date_math".to_string(),
            DisplayConfig {
                card_type: "calculator".to_string(),
                title_template: "Date Calculation".to_string(),
                subtitle_template: None,
                icon: "date_range".to_string(),
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
        let result = match task_type {
            "calculator_eval" => evaluate(task_data),
            "calculator_convert" => convert(task_data),
            "calculator_timezone" => timezone(task_data),
            "calculator_date_math" => date_math(task_data),
            other => TaskResult::err(format!("Unknown calculator task: {other}")),
        };
        Ok(result)
    }
}

fn fmt_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        Value::from((n * 100.0).round() / 100.0)
    }
}

fn eval_ok(expr: &str, result: f64) -> TaskResult {
    let mut fields = Map::new();
    fields.insert("expression".to_string(), Value::String(expr.to_string()));
    fields.insert("result".to_string(), fmt_number(result));
    fields.insert("domain".to_string(), Value::String("calculator".to_string()));
    fields.insert("card_type".to_string(), Value::String("calculator".to_string()));
    TaskResult::ok(fields)
}

fn eval_err(expr: &str, message: impl Into<String>) -> TaskResult {
    let mut result = TaskResult::err(message);
    result.0.insert("expression".to_string(), Value::String(expr.to_string()));
    result.0.insert("domain".to_string(), Value::String("calculator".to_string()));
    result
}

fn evaluate(data: &TaskData) -> TaskResult {
    let expr = data.get("expression").and_then(Value::as_str).unwrap_or("").to_string();
    let trimmed = expr.trim();

    if let Some((pct, val)) = parse_percentage_of(trimmed) {
        return eval_ok(&expr, (pct / 100.0) * val);
    }
    if let Some(arg) = parse_sqrt(trimmed) {
        return eval_ok(&expr, arg.sqrt());
    }
    if let Some((base, exp)) = parse_power(trimmed) {
        return eval_ok(&expr, base.powf(exp));
    }

    match ArithmeticParser::new(trimmed).parse_expr() {
        Some(result) => eval_ok(&expr, result),
        None => eval_err(&expr, "Could not evaluate expression"),
    }
}

fn parse_percentage_of(expr: &str) -> Option<(f64, f64)> {
    let idx = expr.find('%')?;
    let pct: f64 = expr[..idx].trim().parse().ok()?;
    let rest = expr[idx + 1..].trim();
    let rest = rest.strip_prefix("of")?.trim();
    let val: f64 = rest.parse().ok()?;
    Some((pct, val))
}

fn parse_sqrt(expr: &str) -> Option<f64> {
    let rest = expr.strip_prefix("sqrt")?.trim();
    let rest = rest.strip_prefix('(').unwrap_or(rest);
    let rest = rest.strip_suffix(')').unwrap_or(rest);
    rest.trim().parse().ok()
}

fn parse_power(expr: &str) -> Option<(f64, f64)> {
    let idx = expr.find('^')?;
    let base: f64 = expr[..idx].trim().parse().ok()?;
    let exp: f64 = expr[idx + 1..].trim().parse().ok()?;
    Some((base, exp))
}

/// Recursive-descent parser for `+ - * / ( )` over floating point literals,
/// the safe subset of arithmetic the original evaluated with a sandboxed
/// `eval`. Standard precedence, left-associative.
struct ArithmeticParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> ArithmeticParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { chars: input.chars().peekable() }
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn parse_expr(&mut self) -> Option<f64> {
        let result = self.parse_additive()?;
        self.skip_ws();
        if self.chars.peek().is_some() {
            return None;
        }
        Some(result)
    }

    fn parse_additive(&mut self) -> Option<f64> {
        let mut value = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some('+') => {
                    self.chars.next();
                    value += self.parse_multiplicative()?;
                }
                Some('-') => {
                    self.chars.next();
                    value -= self.parse_multiplicative()?;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_multiplicative(&mut self) -> Option<f64> {
        let mut value = self.parse_unary()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some('*') => {
                    self.chars.next();
                    value *= self.parse_unary()?;
                }
                Some('/') => {
                    self.chars.next();
                    let divisor = self.parse_unary()?;
                    if divisor == 0.0 {
                        return None;
                    }
                    value /= divisor;
                }
                _ => break,
            }
        }
        Some(value)
    }

    fn parse_unary(&mut self) -> Option<f64> {
        self.skip_ws();
        if matches!(self.chars.peek(), Some('-')) {
            self.chars.next();
            return Some(-self.parse_unary()?);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Option<f64> {
        self.skip_ws();
        if matches!(self.chars.peek(), Some('(')) {
            self.chars.next();
            let value = self.parse_additive()?;
            self.skip_ws();
            if self.chars.next() != Some(')') {
                return None;
            }
            return Some(value);
        }
        let mut digits = String::new();
        while matches!(self.chars.peek(), Some(c) if c.is_ascii_digit() || *c == '.') {
            digits.push(self.chars.next()?);
        }
        if digits.is_empty() {
            return None;
        }
        digits.parse().ok()
    }
}

const CONVERSIONS: &[(&str, &[(&str, f64)])] = &[
    ("miles", &[("km", 1.60934), ("meters", 1609.34), ("feet", 5280.0)]),
    ("km", &[("miles", 0.621371), ("meters", 1000.0), ("feet", 3280.84)]),
    (
        "meters",
        &[("feet", 3.28084), ("miles", 0.000621371), ("km", 0.001), ("inches", 39.3701)],
    ),
    ("feet", &[("meters", 0.3048), ("miles", 0.000189394), ("km", 0.0003048), ("inches", 12.0)]),
    ("inches", &[("cm", 2.54), ("meters", 0.0254), ("feet", 0.0833333)]),
    ("cm", &[("inches", 0.393701), ("meters", 0.01), ("feet", 0.0328084)]),
    ("kg", &[("lbs", 2.20462), ("pounds", 2.20462), ("oz", 35.274), ("grams", 1000.0)]),
    ("lbs", &[("kg", 0.453592), ("oz", 16.0), ("grams", 453.592)]),
    ("pounds", &[("kg", 0.453592), ("oz", 16.0), ("grams", 453.592)]),
    ("oz", &[("grams", 28.3495), ("kg", 0.0283495), ("lbs", 0.0625)]),
    ("grams", &[("oz", 0.035274), ("kg", 0.001), ("lbs", 0.00220462)]),
    ("liters", &[("gallons", 0.264172), ("cups", 4.22675), ("ml", 1000.0)]),
    ("gallons", &[("liters", 3.78541), ("cups", 16.0), ("ml", 3785.41)]),
    ("cups", &[("ml", 236.588), ("liters", 0.236588), ("gallons", 0.0625)]),
];

fn lookup_conversion(from: &str, to: &str) -> Option<f64> {
    CONVERSIONS
        .iter()
        .find(|(unit, _)| *unit == from)
        .and_then(|(_, targets)| targets.iter().find(|(unit, _)| *unit == to))
        .map(|(_, factor)| *factor)
}

fn is_temp_unit(unit: &str) -> bool {
    matches!(unit, "fahrenheit" | "celsius" | "kelvin" | "f" | "c" | "k")
}

fn convert_temp(value: f64, from: &str, to: &str) -> Option<f64> {
    let f = if from.starts_with('f') {
        'f'
    } else if from.starts_with('c') {
        'c'
    } else {
        'k'
    };
    let t = if to.starts_with('f') {
        'f'
    } else if to.starts_with('c') {
        'c'
    } else {
        'k'
    };
    if f == t {
        return Some(value);
    }
    match (f, t) {
        ('f', 'c') => Some((value - 32.0) * 5.0 / 9.0),
        ('c', 'f') => Some(value * 9.0 / 5.0 + 32.0),
        ('c', 'k') => Some(value + 273.15),
        ('k', 'c') => Some(value - 273.15),
        ('f', 'k') => Some((value - 32.0) * 5.0 / 9.0 + 273.15),
        ('k', 'f') => Some((value - 273.15) * 9.0 / 5.0 + 32.0),
        _ => None,
    }
}

fn convert(data: &TaskData) -> TaskResult {
    let value = data.get("value").and_then(Value::as_f64).unwrap_or(0.0);
    let from = data.get("from").and_then(Value::as_str).unwrap_or("").to_lowercase();
    let to = data.get("to").and_then(Value::as_str).unwrap_or("").to_lowercase();

    let result = if is_temp_unit(&from) && is_temp_unit(&to) {
        convert_temp(value, &from, &to)
    } else {
        lookup_conversion(&from, &to).map(|factor| value * factor)
    };

    match result {
        Some(result) => {
            let mut fields = Map::new();
            fields.insert("value".to_string(), fmt_number(value));
            fields.insert("from".to_string(), Value::String(from.clone()));
            fields.insert("to".to_string(), Value::String(to.clone()));
            fields.insert("result".to_string(), fmt_number(result));
            fields.insert(
                "display".to_string(),
                Value::String(format!(
                    "{} {from} = {} {to}",
                    display_number(value),
                    display_number(result)
                )),
            );
            fields.insert("domain".to_string(), Value::String("calculator".to_string()));
            fields.insert("card_type".to_string(), Value::String("calculator".to_string()));
            TaskResult::ok(fields)
        }
        None => {
            let mut result = TaskResult::err(format!("Unknown conversion: {from} to {to}"));
            result.0.insert("domain".to_string(), Value::String("calculator".to_string()));
            result
        }
    }
}

fn display_number(n: f64) -> String {
    match fmt_number(n) {
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

const TZ_OFFSETS: &[(&str, i64)] = &[
    ("tokyo", 9),
    ("japan", 9),
    ("jst", 9),
    ("london", 0),
    ("uk", 0),
    ("gmt", 0),
    ("utc", 0),
    ("new york", -5),
    ("nyc", -5),
    ("est", -5),
    ("eastern", -5),
    ("los angeles", -8),
    ("la", -8),
    ("pst", -8),
    ("pacific", -8),
    ("chicago", -6),
    ("cst", -6),
    ("central", -6),
    ("denver", -7),
    ("mst", -7),
    ("mountain", -7),
    ("paris", 1),
    ("france", 1),
    ("cet", 1),
    ("berlin", 1),
    ("germany", 1),
    ("sydney", 11),
    ("australia", 11),
    ("aest", 11),
    ("beijing", 8),
    ("china", 8),
    ("shanghai", 8),
    ("mumbai", 5),
    ("india", 5),
    ("ist", 5),
    ("delhi", 5),
    ("dubai", 4),
    ("uae", 4),
    ("singapore", 8),
    ("hong kong", 8),
    ("seoul", 9),
    ("korea", 9),
    ("bangkok", 7),
    ("thailand", 7),
    ("moscow", 3),
    ("russia", 3),
    ("sao paulo", -3),
    ("brazil", -3),
    ("hawaii", -10),
    ("hst", -10),
];

fn timezone(data: &TaskData) -> TaskResult {
    let location = data.get("location").and_then(Value::as_str).unwrap_or("").to_lowercase();
    let location = location.trim();

    let Some(offset) = TZ_OFFSETS.iter().find(|(name, _)| *name == location).map(|(_, o)| *o)
    else {
        let mut result = TaskResult::err(format!("Unknown timezone/city: {location}"));
        result.0.insert("domain".to_string(), Value::String("calculator".to_string()));
        return result;
    };

    let local_time = OffsetDateTime::now_utc() + Duration::hours(offset);
    let time_str = format!("{:02}:{:02}", local_time.hour(), local_time.minute());
    let date_str = format!(
        "{:04}-{:02}-{:02}",
        local_time.year(),
        u8::from(local_time.month()),
        local_time.day()
    );
    let sign = if offset >= 0 { "+" } else { "" };
    let title_cased = title_case(location);

    let mut fields = Map::new();
    fields.insert("location".to_string(), Value::String(location.to_string()));
    fields.insert("time".to_string(), Value::String(time_str.clone()));
    fields.insert("date".to_string(), Value::String(date_str.clone()));
    fields.insert("offset".to_string(), Value::String(format!("UTC{sign}{offset}")));
    fields.insert(
        "display".to_string(),
        Value::String(format!(
            "It's {time_str} in {title_cased} ({date_str}, UTC{sign}{offset})"
        )),
    );
    fields.insert("domain".to_string(), Value::String("calculator".to_string()));
    fields.insert("card_type".to_string(), Value::String("calculator".to_string()));
    TaskResult::ok(fields)
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn date_math(data: &TaskData) -> TaskResult {
    let operation = data.get("operation").and_then(Value::as_str).unwrap_or("");
    let now = OffsetDateTime::now_utc();

    match operation {
        "days_from_now" => {
            let days = data.get("days").and_then(Value::as_i64).unwrap_or(0);
            let target = now + Duration::days(days);
            let date_str = format!(
                "{:04}-{:02}-{:02}",
                target.year(),
                u8::from(target.month()),
                target.day()
            );
            let mut fields = Map::new();
            fields.insert("days".to_string(), Value::from(days));
            fields.insert("date".to_string(), Value::String(date_str.clone()));
            fields.insert(
                "display".to_string(),
                Value::String(format!("{days} days from now is {date_str}")),
            );
            fields.insert("domain".to_string(), Value::String("calculator".to_string()));
            fields.insert("card_type".to_string(), Value::String("calculator".to_string()));
            TaskResult::ok(fields)
        }
        "days_until" => {
            let target_str = data.get("target").and_then(Value::as_str).unwrap_or("");
            match parse_date(target_str, now) {
                Some(target_date) => {
                    let days = (target_date - now).whole_days();
                    let mut fields = Map::new();
                    fields.insert("target".to_string(), Value::String(target_str.to_string()));
                    fields.insert("days".to_string(), Value::from(days));
                    fields.insert(
                        "display".to_string(),
                        Value::String(format!("{days} days until {target_str}")),
                    );
                    fields
                        .insert("domain".to_string(), Value::String("calculator".to_string()));
                    fields.insert(
                        "card_type".to_string(),
                        Value::String("calculator".to_string()),
                    );
                    TaskResult::ok(fields)
                }
                None => {
                    let mut result =
                        TaskResult::err(format!("Could not parse date: {target_str}"));
                    result
                        .0
                        .insert("domain".to_string(), Value::String("calculator".to_string()));
                    result
                }
            }
        }
        _ => {
            let mut result = TaskResult::err("Unknown date operation");
            result.0.insert("domain".to_string(), Value::String("calculator".to_string()));
            result
        }
    }
}

const HOLIDAYS: &[(&str, u8, u8)] = &[
    ("christmas", 12, 25),
    ("new year", 1, 1),
    ("new years", 1, 1),
    ("valentines", 2, 14),
    ("valentine", 2, 14),
    ("halloween", 10, 31),
    ("thanksgiving", 11, 28),
];

const MONTHS: &[(&str, u8)] = &[
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

fn parse_date(text: &str, now: OffsetDateTime) -> Option<OffsetDateTime> {
    let lower = text.to_lowercase();
    let lower = lower.trim();
    let year = now.year();

    if let Some((_, month, day)) = HOLIDAYS.iter().find(|(name, _, _)| *name == lower) {
        let holiday_year = if lower == "new year" || lower == "new years" { year + 1 } else { year };
        let mut dt = build_date(holiday_year, *month, *day)?;
        if dt < now {
            dt = build_date(holiday_year + 1, *month, *day)?;
        }
        return Some(dt);
    }

    for (name, month_num) in MONTHS {
        if let Some(idx) = lower.find(name) {
            let rest = lower[idx + name.len()..].trim_start();
            let day_str: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(day) = day_str.parse::<u8>() {
                let mut dt = build_date(year, *month_num, day)?;
                if dt < now {
                    dt = build_date(year + 1, *month_num, day)?;
                }
                return Some(dt);
            }
        }
    }
    None
}

fn build_date(year: i32, month: u8, day: u8) -> Option<OffsetDateTime> {
    let month = time::Month::try_from(month).ok()?;
    let date = time::Date::from_calendar_date(year, month, day).ok()?;
    Some(date.midnight().assume_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(obj: Value) -> TaskData {
        obj.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn eval_simple_arithmetic() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"expression": "2+2"}));
        let result = domain.execute_task("calculator_eval", &task_data).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.field("result"), Some(&Value::from(4)));
    }

    #[tokio::test]
    async fn eval_respects_precedence_and_parens() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"expression": "(2 + 3) * 4 - 1"}));
        let result = domain.execute_task("calculator_eval", &task_data).await.unwrap();
        assert_eq!(result.field("result"), Some(&Value::from(19)));
    }

    #[tokio::test]
    async fn eval_percentage_of() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"expression": "15% of 234"}));
        let result = domain.execute_task("calculator_eval", &task_data).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.field("result"), Some(&Value::from(35)));
    }

    #[tokio::test]
    async fn eval_unparseable_expression_fails_without_panicking() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"expression": "banana"}));
        let result = domain.execute_task("calculator_eval", &task_data).await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn convert_distance() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"value": 10, "from": "miles", "to": "km"}));
        let result = domain.execute_task("calculator_convert", &task_data).await.unwrap();
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn convert_temperature() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"value": 100, "from": "celsius", "to": "fahrenheit"}));
        let result = domain.execute_task("calculator_convert", &task_data).await.unwrap();
        assert_eq!(result.field("result"), Some(&Value::from(212)));
    }

    #[tokio::test]
    async fn convert_unknown_units_fails() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"value": 1, "from": "parsecs", "to": "furlongs"}));
        let result = domain.execute_task("calculator_convert", &task_data).await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn timezone_lookup_for_known_city() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"location": "tokyo"}));
        let result = domain.execute_task("calculator_timezone", &task_data).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.field("offset"), Some(&Value::String("UTC+9".to_string())));
    }

    #[tokio::test]
    async fn timezone_lookup_for_unknown_city_fails() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"location": "atlantis"}));
        let result = domain.execute_task("calculator_timezone", &task_data).await.unwrap();
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn date_math_days_from_now() {
        let domain = CalculatorDomain;
        let task_data = data(json!({"operation": "days_from_now", "days": 10}));
        let result = domain.execute_task("calculator_date_math", &task_data).await.unwrap();
        assert!(result.is_success());
    }
}
