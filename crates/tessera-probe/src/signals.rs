//! Signal evaluation against a received response.
//!
//! Evaluation never fails: a body that is not JSON simply matches no
//! `json_path` signal.

use crate::transport::HttpResponse;
use serde_json::Value;
use tessera_descriptor::{value_to_string, Endpoint, Signal, SignalKind};

/// Net confidence contribution of one response.
///
/// Matching success signals add `weight × 100`, matching failure signals
/// subtract it.
#[must_use]
pub fn evaluate(endpoint: &Endpoint, response: &HttpResponse) -> f64 {
    let json = serde_json::from_str::<Value>(&response.body).ok();

    let gained: f64 = endpoint
        .success_signals
        .iter()
        .filter(|s| matches(s, response, json.as_ref()))
        .map(Signal::score)
        .sum();

    let lost: f64 = endpoint
        .failure_signals
        .iter()
        .filter(|s| matches(s, response, json.as_ref()))
        .map(Signal::score)
        .sum();

    gained - lost
}

/// Whether one signal matches the response.
#[must_use]
pub fn matches(signal: &Signal, response: &HttpResponse, json: Option<&Value>) -> bool {
    match signal.kind {
        SignalKind::Status => signal
            .equals
            .as_ref()
            .is_some_and(|target| value_to_string(target) == response.status.to_string()),
        SignalKind::JsonPath => {
            let (Some(target), Some(key), Some(Value::Object(map))) =
                (signal.equals.as_ref(), signal.json_key(), json)
            else {
                return false;
            };
            map.get(key).is_some_and(|found| values_equal(found, target))
        }
        SignalKind::Regex => signal
            .compiled_regex()
            .is_some_and(|re| re.is_match(&response.body)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => x == y,
        },
        _ => a == b,
    }
}
