//! Wire schema for the structured extraction call.
//!
//! The provider's strict mode needs `additionalProperties: false`, every
//! property listed in `required` (nullable ones included), and fully
//! inlined schemas with no `$ref`, so the schemars output is post-processed
//! before it goes on the wire.

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::types::{CategorySlug, CitySlug};

/// One event listing as the model must produce it. Every field is
/// mandatory; only `Price` and `image_url` may be null.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MinedEvent {
    pub source_url: String,
    pub event_url: String,
    pub title: String,
    pub description: String,
    /// Civil calendar date, `YYYY-MM-DD`.
    pub date: String,
    /// Civil 24h clock time, `HH:MM`.
    pub time: String,
    pub location: String,
    pub address: String,
    pub category_slug: CategorySlug,
    pub city_slug: CitySlug,
    #[serde(rename = "Price")]
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

/// Root of the extraction response.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct MinedEventsResponse {
    pub events: Vec<MinedEvent>,
}

/// Generate the provider-ready JSON schema for `T`.
pub fn strict_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_default();

    fix_object_schemas(&mut value);
    inline_refs(&mut value);

    if let serde_json::Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
    }

    value
}

/// Add `additionalProperties: false` to every object schema and list all of
/// its properties as required.
fn fix_object_schemas(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type") == Some(&serde_json::Value::String("object".to_string())) {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );
                if let Some(serde_json::Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<serde_json::Value> = props
                        .keys()
                        .map(|k| serde_json::Value::String(k.clone()))
                        .collect();
                    map.insert("required".to_string(), serde_json::Value::Array(all_keys));
                }
            }
            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

/// Replace `$ref` references with their definitions; strict mode does not
/// follow refs.
fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }
            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn events_schema() -> serde_json::Value {
        strict_schema_for::<MinedEventsResponse>()
    }

    #[test]
    fn schema_is_inlined_and_strict() {
        let schema = events_schema();
        let text = serde_json::to_string(&schema).unwrap();
        assert!(!text.contains("$ref"));
        assert!(!schema.as_object().unwrap().contains_key("definitions"));
        assert!(text.contains("\"additionalProperties\":false"));
    }

    #[test]
    fn city_enum_is_closed_to_known_slugs() {
        let schema = events_schema();
        let text = serde_json::to_string(&schema).unwrap();
        for slug in CitySlug::ALL {
            assert!(text.contains(slug.as_str()), "missing city {}", slug.as_str());
        }
        for slug in CategorySlug::ALL {
            assert!(
                text.contains(slug.as_str()),
                "missing category {}",
                slug.as_str()
            );
        }
    }

    #[test]
    fn nullable_fields_are_still_required() {
        let schema = events_schema();
        let event_schema = &schema["properties"]["events"]["items"];
        let required: Vec<&str> = event_schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert!(required.contains(&"Price"));
        assert!(required.contains(&"image_url"));
        assert!(required.contains(&"title"));
        assert_eq!(required.len(), 12);
    }
}
