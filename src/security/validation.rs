//! Request body validation.
//!
//! # Responsibilities
//! - Parse and bound numeric identifiers
//! - Dispatch per request kind to a field-level validator
//! - Collect every violation, producing a sanitized copy of the accepted fields
//!
//! # Design Decisions
//! - Request kinds are a closed enum; adding one forces a validator
//! - Validators never fail; problems are reported in `ValidationOutcome::errors`
//! - Unknown fields are dropped from kind-specific bodies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::security::sanitize::{detect_suspicious_pattern, sanitize_str, DEFAULT_MAX_LENGTH};

pub const SUBNET_ID_MIN: i64 = 1;
pub const SUBNET_ID_MAX: i64 = 118;
pub const PROMPT_MAX_LENGTH: usize = 4000;
const METRIC_STRING_MAX_LENGTH: usize = 200;
const VALID_TIMEFRAMES: &[&str] = &["1h", "24h", "7d", "30d"];
const DEFAULT_TIMEFRAME: &str = "24h";

/// Largest integer a JSON consumer can represent exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Numeric metric fields and their accepted inclusive ranges.
const NUMERIC_METRICS: &[(&str, f64, f64)] = &[
    ("overall_score", 0.0, 100.0),
    ("current_yield", 0.0, 200.0),
    ("credibility_score", 0.0, 100.0),
    ("activity_score", 0.0, 100.0),
    ("emission_rate", 0.0, 100.0),
    ("total_stake", 0.0, MAX_SAFE_INTEGER),
    ("validator_count", 0.0, 10_000.0),
    ("yield_change_24h", -100.0, 100.0),
];

const STRING_METRICS: &[&str] = &["activity_level", "status", "name", "description"];

/// Result of bounding an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntValidation {
    pub is_valid: bool,
    pub value: Option<i64>,
    pub error: Option<String>,
}

/// Closed set of request kinds the gate knows how to validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    Score,
    Forecast,
    Prompt,
    Generic,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Score => "score",
            RequestKind::Forecast => "forecast",
            RequestKind::Prompt => "prompt",
            RequestKind::Generic => "generic",
        }
    }

    /// Kinds that hit expensive downstream work and get the stricter limit.
    pub fn is_compute_intensive(&self) -> bool {
        !matches!(self, RequestKind::Generic)
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "score" => Ok(RequestKind::Score),
            "forecast" => Ok(RequestKind::Forecast),
            "prompt" => Ok(RequestKind::Prompt),
            "generic" => Ok(RequestKind::Generic),
            other => Err(format!("unknown request kind '{}'", other)),
        }
    }
}

/// Outcome of validating a request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub sanitized: Map<String, Value>,
    /// At least one field matched a suspicious-text heuristic.
    #[serde(skip)]
    pub suspicious: bool,
}

#[derive(Default)]
struct Collector {
    errors: Vec<String>,
    sanitized: Map<String, Value>,
    suspicious: bool,
}

impl Collector {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn finish(self) -> ValidationOutcome {
        ValidationOutcome {
            is_valid: self.errors.is_empty(),
            errors: self.errors,
            sanitized: self.sanitized,
            suspicious: self.suspicious,
        }
    }
}

/// Lenient integer parse: leading integer of a string, truncation of a number.
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < MAX_SAFE_INTEGER)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim_start();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (-1, rest),
                None => (1, s.strip_prefix('+').unwrap_or(s)),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            digits[..end].parse::<i64>().ok().map(|n| sign * n)
        }
        _ => None,
    }
}

/// Lenient float parse: longest numeric prefix of a string, or the number itself.
fn parse_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim_start();
            let bytes = s.as_bytes();
            let mut end = 0;
            if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
                end = 1;
            }
            let digits_start = end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end < bytes.len() && bytes[end] == b'.' {
                end += 1;
                while end < bytes.len() && bytes[end].is_ascii_digit() {
                    end += 1;
                }
            }
            if end == digits_start || &s[digits_start..end] == "." {
                return None;
            }
            // Exponent only counts when followed by digits.
            if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
                let mut exp_end = end + 1;
                if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
                    exp_end += 1;
                }
                let exp_digits = exp_end;
                while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
                    exp_end += 1;
                }
                if exp_end > exp_digits {
                    end = exp_end;
                }
            }
            s[..end].parse::<f64>().ok()
        }
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

/// Parse `value` as an integer within `[min, max]`.
pub fn validate_bounded_int(value: &Value, min: i64, max: i64) -> IntValidation {
    validate_named_int("Value", value, min, max)
}

/// Like [`validate_bounded_int`], naming the field in the error message.
pub fn validate_named_int(label: &str, value: &Value, min: i64, max: i64) -> IntValidation {
    match parse_int(value) {
        None => IntValidation {
            is_valid: false,
            value: None,
            error: Some(format!("{} must be a valid number", label)),
        },
        Some(n) if n < min || n > max => IntValidation {
            is_valid: false,
            value: None,
            error: Some(format!("{} must be between {} and {}", label, min, max)),
        },
        Some(n) => IntValidation {
            is_valid: true,
            value: Some(n),
            error: None,
        },
    }
}

/// Validate a request body for `kind`, reporting every violation.
pub fn validate_request_body(body: &Value, kind: RequestKind) -> ValidationOutcome {
    let Some(fields) = body.as_object() else {
        return ValidationOutcome {
            is_valid: false,
            errors: vec!["Request body must be a valid object".to_string()],
            sanitized: Map::new(),
            suspicious: false,
        };
    };

    let mut out = Collector::default();
    match kind {
        RequestKind::Score => validate_score(fields, &mut out),
        RequestKind::Forecast => validate_forecast(fields, &mut out),
        RequestKind::Prompt => validate_prompt(fields, &mut out),
        RequestKind::Generic => validate_generic(fields, &mut out),
    }
    out.finish()
}

fn validate_subnet_id(fields: &Map<String, Value>, out: &mut Collector) {
    let subnet = validate_named_int(
        "Subnet ID",
        fields.get("subnet_id").unwrap_or(&Value::Null),
        SUBNET_ID_MIN,
        SUBNET_ID_MAX,
    );
    match (subnet.value, subnet.error) {
        (Some(id), _) => {
            out.sanitized.insert("subnet_id".into(), Value::from(id));
        }
        (None, Some(error)) => out.error(error),
        (None, None) => {}
    }
}

fn validate_score(fields: &Map<String, Value>, out: &mut Collector) {
    validate_subnet_id(fields, out);

    match fields.get("metrics") {
        Some(Value::Object(metrics)) => {
            out.sanitized
                .insert("metrics".into(), Value::Object(sanitize_metrics(metrics)));
        }
        _ => out.error("Metrics must be a valid object"),
    }

    match fields.get("timeframe").filter(|v| is_truthy(v)) {
        None => {
            out.sanitized
                .insert("timeframe".into(), Value::from(DEFAULT_TIMEFRAME));
        }
        Some(Value::String(tf)) if VALID_TIMEFRAMES.contains(&tf.as_str()) => {
            out.sanitized.insert("timeframe".into(), Value::from(tf.as_str()));
        }
        Some(_) => out.error(format!(
            "Timeframe must be one of: {}",
            VALID_TIMEFRAMES.join(", ")
        )),
    }
}

fn validate_forecast(fields: &Map<String, Value>, out: &mut Collector) {
    validate_subnet_id(fields, out);

    match fields.get("current_metrics") {
        Some(v) if !is_truthy(v) => {}
        None => {}
        Some(Value::Object(metrics)) => {
            out.sanitized.insert(
                "current_metrics".into(),
                Value::Object(sanitize_metrics(metrics)),
            );
        }
        Some(_) => out.error("Current metrics must be a valid object"),
    }

    if let Some(flag) = fields.get("include_market_context") {
        out.sanitized
            .insert("include_market_context".into(), Value::Bool(is_truthy(flag)));
    }
}

fn validate_prompt(fields: &Map<String, Value>, out: &mut Collector) {
    let input = match fields.get("input") {
        Some(Value::String(s)) if !s.is_empty() => s.trim(),
        _ => {
            out.error("Input must be a non-empty string");
            return;
        }
    };

    if input.is_empty() {
        out.error("Input cannot be empty");
    } else if input.chars().count() > PROMPT_MAX_LENGTH {
        out.error(format!("Input too long (max {} characters)", PROMPT_MAX_LENGTH));
    } else if detect_suspicious_pattern(input) {
        out.suspicious = true;
        out.error("Input contains potentially harmful content");
    } else {
        out.sanitized
            .insert("input".into(), Value::from(sanitize_str(input, PROMPT_MAX_LENGTH)));
    }
}

fn validate_generic(fields: &Map<String, Value>, out: &mut Collector) {
    for (key, value) in fields {
        match value {
            Value::String(s) => {
                if detect_suspicious_pattern(s) {
                    out.suspicious = true;
                    out.error(format!("Suspicious content detected in field: {}", key));
                } else {
                    out.sanitized
                        .insert(key.clone(), Value::from(sanitize_str(s, DEFAULT_MAX_LENGTH)));
                }
            }
            // JSON numbers are always finite; booleans, nulls and nested values pass through.
            other => {
                out.sanitized.insert(key.clone(), other.clone());
            }
        }
    }
}

/// Keep known metric fields that parse and fall within range; drop the rest.
fn sanitize_metrics(metrics: &Map<String, Value>) -> Map<String, Value> {
    let mut sanitized = Map::new();
    for (key, value) in metrics {
        if let Some((_, min, max)) = NUMERIC_METRICS.iter().find(|(name, _, _)| name == key) {
            if let Some(n) = parse_float(value).filter(|n| n.is_finite() && *n >= *min && *n <= *max) {
                sanitized.insert(key.clone(), number_value(n));
            }
        } else if STRING_METRICS.contains(&key.as_str()) {
            if let Value::String(s) = value {
                sanitized.insert(key.clone(), Value::from(sanitize_str(s, METRIC_STRING_MAX_LENGTH)));
            }
        }
    }
    sanitized
}
