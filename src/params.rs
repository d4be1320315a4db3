//! Flattening of serverless request events into one parameter map.
//!
//! Precedence, lowest to highest: single-value query, multi-value query
//! (first element), body fields (only keys still unset), path parameters.
//! Keys are lower-cased on the way in. Within one source, keys that collide
//! after lower-casing are applied in byte order, so the all-lower-case
//! spelling wins over `Sport` or `SPORT`.

use std::collections::{BTreeMap, HashMap};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

pub type Params = BTreeMap<String, String>;

/// The parts of an API Gateway / function URL event the handlers read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, Option<String>>>,
    #[serde(default)]
    pub multi_value_query_string_parameters: Option<HashMap<String, Vec<String>>>,
    #[serde(default)]
    pub path_parameters: Option<HashMap<String, Option<String>>>,
    /// A JSON string (possibly base64) from gateways, or an object on
    /// direct invocation.
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub is_base64_encoded: Option<bool>,
}

/// A body field the endpoint accepts, and the parameter it fills.
#[derive(Debug, Clone, Copy)]
pub struct BodyField {
    pub key: &'static str,
    pub param: &'static str,
}

impl BodyField {
    pub const fn new(key: &'static str, param: &'static str) -> Self {
        Self { key, param }
    }
}

pub fn extract_params(request: &ApiRequest, body_fields: &[BodyField]) -> Params {
    let mut params = Params::new();

    if let Some(query) = &request.query_string_parameters {
        for (key, value) in sorted(query) {
            if let Some(value) = value {
                params.insert(key.to_lowercase(), value.clone());
            }
        }
    }

    if let Some(multi) = &request.multi_value_query_string_parameters {
        for (key, values) in sorted(multi) {
            if let Some(first) = values.first() {
                params.insert(key.to_lowercase(), first.clone());
            }
        }
    }

    if let Some(body) = decode_body(request) {
        for field in body_fields {
            let Some(value) = body.get(field.key).and_then(truthy_string) else {
                continue;
            };
            params.entry(field.param.to_string()).or_insert(value);
        }
    }

    if let Some(path) = &request.path_parameters {
        for (key, value) in sorted(path) {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                params.insert(key.to_lowercase(), value.to_string());
            }
        }
    }

    params
}

fn sorted<V>(map: &HashMap<String, V>) -> Vec<(&String, &V)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Non-empty string value of a param, treating blanks as unset.
pub fn param<'a>(params: &'a Params, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| params.get(*key))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

fn decode_body(request: &ApiRequest) -> Option<serde_json::Map<String, Value>> {
    let raw = match request.body.as_ref()? {
        Value::Object(map) => return Some(map.clone()),
        Value::String(raw) if !raw.is_empty() => raw,
        _ => return None,
    };

    let text = if request.is_base64_encoded.unwrap_or(false) {
        match BASE64.decode(raw.trim().as_bytes()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                debug!(error = %err, "unable to decode base64 request body");
                return None;
            }
        }
    } else {
        raw.to_string()
    };

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => None,
        Err(err) => {
            debug!(error = %err, "unable to parse request body");
            None
        }
    }
}

fn truthy_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELDS: &[BodyField] = &[
        BodyField::new("sport", "sport"),
        BodyField::new("gameId", "gameid"),
    ];

    fn query(pairs: &[(&str, &str)]) -> Option<HashMap<String, Option<String>>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn query_keys_are_lower_cased() {
        let request = ApiRequest {
            query_string_parameters: query(&[("Sport", "nfl"), ("GameId", "1")]),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("sport").map(String::as_str), Some("nfl"));
        assert_eq!(params.get("gameid").map(String::as_str), Some("1"));
    }

    #[test]
    fn colliding_keys_resolve_to_the_lower_case_spelling() {
        for _ in 0..8 {
            let request = ApiRequest {
                query_string_parameters: query(&[("SPORT", "nhl"), ("sport", "nfl"), ("Sport", "nba")]),
                ..Default::default()
            };
            let params = extract_params(&request, FIELDS);
            assert_eq!(params.get("sport").map(String::as_str), Some("nfl"));
        }
    }

    #[test]
    fn multi_value_overrides_single_value() {
        let mut multi = HashMap::new();
        multi.insert("sport".to_string(), vec!["nba".to_string(), "nhl".to_string()]);
        multi.insert("empty".to_string(), Vec::new());
        let request = ApiRequest {
            query_string_parameters: query(&[("sport", "nfl")]),
            multi_value_query_string_parameters: Some(multi),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("sport").map(String::as_str), Some("nba"));
        assert!(!params.contains_key("empty"));
    }

    #[test]
    fn body_only_fills_unset_keys() {
        let request = ApiRequest {
            query_string_parameters: query(&[("sport", "nfl")]),
            body: Some(Value::String(r#"{"sport":"nba","gameId":401772834}"#.to_string())),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("sport").map(String::as_str), Some("nfl"));
        assert_eq!(params.get("gameid").map(String::as_str), Some("401772834"));
    }

    #[test]
    fn base64_body_is_decoded() {
        let encoded = BASE64.encode(r#"{"sport":"nhl","gameId":"77"}"#);
        let request = ApiRequest {
            body: Some(Value::String(encoded)),
            is_base64_encoded: Some(true),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("sport").map(String::as_str), Some("nhl"));
        assert_eq!(params.get("gameid").map(String::as_str), Some("77"));
    }

    #[test]
    fn unparsable_body_is_ignored() {
        let request = ApiRequest {
            query_string_parameters: query(&[("sport", "nfl")]),
            body: Some(Value::String("not json".to_string())),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn object_body_is_used_as_is() {
        let request = ApiRequest {
            body: Some(serde_json::json!({"sport": "nfl", "gameId": "12"})),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("gameid").map(String::as_str), Some("12"));
    }

    #[test]
    fn path_parameters_override_everything() {
        let mut path = HashMap::new();
        path.insert("Sport".to_string(), Some("mlb".to_string()));
        path.insert("gameId".to_string(), None);
        let request = ApiRequest {
            query_string_parameters: query(&[("sport", "nfl"), ("gameid", "5")]),
            path_parameters: Some(path),
            ..Default::default()
        };
        let params = extract_params(&request, FIELDS);
        assert_eq!(params.get("sport").map(String::as_str), Some("mlb"));
        assert_eq!(params.get("gameid").map(String::as_str), Some("5"));
    }

    #[test]
    fn event_json_deserializes_with_nulls() {
        let raw = r#"{"httpMethod":"GET","queryStringParameters":null,"multiValueQueryStringParameters":null,"pathParameters":{"sport":"nfl","gameId":"9"},"body":null,"isBase64Encoded":false}"#;
        let request: ApiRequest = serde_json::from_str(raw).expect("event json");
        let params = extract_params(&request, FIELDS);
        assert_eq!(param(&params, &["gameid", "game_id"]), Some("9"));
    }
}
