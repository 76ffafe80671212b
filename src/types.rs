/// Core data structures for work-order records
///
/// This module defines the raw input unit consumed by the report pipeline,
/// the field names the pipeline understands, and helpers for reading loosely
/// typed values out of a record.
use serde_json::{Map, Value};

/// Field names as they appear in the work-order payloads.
pub mod fields {
    pub const WORK_ORDER_ID: &str = "workOrderId";
    pub const UNIQUE_ID: &str = "uniqueId";

    pub const BUILDING: &str = "building";
    pub const LOCATION_DESCRIPTION: &str = "locationDescription";
    pub const SPACE_NAME: &str = "spaceName";
    pub const CONFINED_SPACE_DESCRIPTION: &str = "confinedSpaceDescription";

    pub const ATMOSPHERIC_HAZARD: &str = "atmosphericHazard";
    pub const ENGULFMENT_HAZARD: &str = "engulfmentHazard";
    pub const CONFIGURATION_HAZARD: &str = "configurationHazard";
    pub const OTHER_HAZARD: &str = "otherRecognizedHazards";

    pub const ATMOSPHERIC_HAZARD_DESCRIPTION: &str = "atmosphericHazardDescription";
    pub const ENGULFMENT_HAZARD_DESCRIPTION: &str = "engulfmentHazardDescription";
    pub const CONFIGURATION_HAZARD_DESCRIPTION: &str = "configurationHazardDescription";
    pub const OTHER_HAZARD_DESCRIPTION: &str = "otherHazardsDescription";

    pub const PPE_REQUIRED: &str = "ppeRequired";
    pub const PPE_LIST: &str = "ppeList";
    pub const VENTILATION: &str = "forcedAirVentilationSufficient";
    pub const AIR_MONITOR: &str = "dedicatedContinuousAirMonitor";
    pub const WARNING_SIGN: &str = "warningSignPosted";

    pub const OTHERS_WORKING_NEAR: &str = "otherPeopleWorkingNearSpace";
    pub const CAN_OTHERS_SEE_IN: &str = "canOthersSeeIntoSpace";
    pub const CONTRACTORS_ENTER: &str = "contractorsEnterSpace";

    pub const IS_CONFINED_SPACE: &str = "isConfinedSpace";
    pub const PERMIT_REQUIRED: &str = "permitRequired";
    pub const ENTRY_POINTS: &str = "numberOfEntryPoints";

    pub const SURVEY_DATE: &str = "surveyDate";
    pub const CREATED_AT: &str = "createdAt";

    pub const IMAGE_URLS: &str = "imageUrls";
    pub const IMAGES: &str = "images";
    pub const PICTURES: &str = "pictures";

    pub const NOTES: &str = "notes";
    pub const ENTRY_REQUIREMENTS: &str = "entryRequirements";

    pub const STATUS: &str = "status";
    pub const PRIORITY: &str = "priority";
    pub const TECHNICIAN: &str = "technician";
    pub const SURVEYORS: &str = "surveyors";

    /// Hazard flags. A record reports a hazard if any of these is true.
    pub const HAZARD_FLAGS: &[&str] = &[ATMOSPHERIC_HAZARD, ENGULFMENT_HAZARD, CONFIGURATION_HAZARD, OTHER_HAZARD];

    /// Array fields holding image references.
    pub const IMAGE_FIELDS: &[&str] = &[IMAGE_URLS, IMAGES, PICTURES];
}

/// A single work-order record as supplied by the surrounding application.
///
/// Records are loosely typed: any field may be absent or carry an unexpected
/// JSON type. The pipeline only ever reads from a record.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct WorkOrderRecord {
    fields: Map<String, Value>,
}

impl WorkOrderRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON value. Non-object values yield an empty record.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Trimmed, non-empty text representation of a field.
    pub fn text(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_text)
    }

    /// First non-empty text among several candidate keys.
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.text(k))
    }

    /// Truthiness of a field; absent or unrecognised values are false.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).map(value_truthy).unwrap_or(false)
    }

    /// Whether any hazard flag is set on this record.
    pub fn has_hazard(&self) -> bool {
        fields::HAZARD_FLAGS.iter().any(|f| self.flag(f))
    }

    /// Image references across all image array fields, in field then element order.
    pub fn image_refs(&self) -> Vec<String> {
        let mut refs: Vec<String> = Vec::new();
        for field in fields::IMAGE_FIELDS {
            for item in value_items(self.get(field)) {
                if let Some(r) = image_ref(item)
                    && !refs.contains(&r)
                {
                    refs.push(r);
                }
            }
        }
        refs
    }
}

/// Trimmed text representation of a scalar value.
///
/// Strings are trimmed, numbers and booleans render with `to_string`, and
/// null, empty strings, arrays and objects produce `None`.
pub fn value_text(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if s.is_empty() { None } else { Some(s) }
}

/// Interpret a value as a boolean flag.
///
/// Accepts JSON booleans, non-zero numbers, and the strings "true", "yes",
/// "y" and "1" (case-insensitive).
pub fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "y" | "1"),
        _ => false,
    }
}

/// Elements of an array field. A scalar is treated as a one-element array.
pub fn value_items(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other],
    }
}

/// Extract an image reference from an array element.
///
/// Elements are either plain strings or objects carrying the reference under
/// `url`, `src`, `imageUrl` or `path`.
pub fn image_ref(item: &Value) -> Option<String> {
    match item {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
        Value::Object(map) => ["url", "src", "imageUrl", "path"].iter().find_map(|k| map.get(*k).and_then(value_text)),
        _ => None,
    }
}

/// Parse the record payload handed over by the surrounding application.
///
/// Accepts a bare JSON array or a paginated REST envelope holding the array
/// under `data`, `workOrders`, `items` or `results`.
pub fn parse_records(json: &str) -> Result<Vec<WorkOrderRecord>, String> {
    let value: Value = serde_json::from_str(json).map_err(|e| format!("Failed to parse records JSON: {}", e))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = ["data", "workOrders", "items", "results"]
                .iter()
                .find(|k| matches!(map.get(**k), Some(Value::Array(_))))
                .ok_or_else(|| "Expected a JSON array or an object with a data/workOrders/items/results array".to_string())?;
            match map.remove(*key) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => return Err("Expected a JSON array of work-order records".to_string()),
    };

    Ok(items.into_iter().map(WorkOrderRecord::from_value).collect())
}
