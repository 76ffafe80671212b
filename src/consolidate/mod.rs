//! Consolidation of duplicate surveys into single report entries.
//!
//! This module handles:
//! - Grouping records by the physical space they describe (`group`)
//! - Per-type field merge rules (`strategies`)
//! - Merging each group into one [`ConsolidatedEntry`]
//!
//! Consolidation is a pure transform computed on every report request;
//! merged entries are never written back to the data store.
//!
//! # Merge rules
//!
//! ```text
//! hazard/safety/personnel flags  → true if any member is true
//! notes, descriptions, PPE list  → unique text joined with ". "
//! imageUrls, images, pictures    → array union, first-seen order
//! workOrderId, uniqueId, spaceName → every member's value joined with ", "
//! surveyDate, createdAt          → most recent date
//! anything else                  → first member, gaps filled in member order
//! ```

pub mod group;
pub mod strategies;

pub use group::{ConsolidatedGroup, GroupKey, Grouping, IndexedRecord, UNSPECIFIED, group};
pub use strategies::MergeStrategy;

use crate::types::{WorkOrderRecord, fields, value_text};
use log::debug;
use serde_json::{Map, Value};
use strategies::{merge_any_true, merge_array_union, merge_identifiers, merge_most_recent_date, merge_unique_text};

/// Metadata keys attached to merged entries.
pub const CONSOLIDATED_KEY: &str = "_consolidated";
pub const ORIGINAL_COUNT_KEY: &str = "_originalEntryCount";
pub const ORIGINAL_INDEXES_KEY: &str = "_originalIndexes";

/// Fields with an explicit merge strategy.
const FIELD_STRATEGIES: &[(&str, MergeStrategy)] = &[
    (fields::ATMOSPHERIC_HAZARD, MergeStrategy::AnyTrue),
    (fields::ENGULFMENT_HAZARD, MergeStrategy::AnyTrue),
    (fields::CONFIGURATION_HAZARD, MergeStrategy::AnyTrue),
    (fields::OTHER_HAZARD, MergeStrategy::AnyTrue),
    (fields::PPE_REQUIRED, MergeStrategy::AnyTrue),
    (fields::VENTILATION, MergeStrategy::AnyTrue),
    (fields::AIR_MONITOR, MergeStrategy::AnyTrue),
    (fields::WARNING_SIGN, MergeStrategy::AnyTrue),
    (fields::OTHERS_WORKING_NEAR, MergeStrategy::AnyTrue),
    (fields::CAN_OTHERS_SEE_IN, MergeStrategy::AnyTrue),
    (fields::CONTRACTORS_ENTER, MergeStrategy::AnyTrue),
    (fields::IS_CONFINED_SPACE, MergeStrategy::AnyTrue),
    (fields::PERMIT_REQUIRED, MergeStrategy::AnyTrue),
    (fields::NOTES, MergeStrategy::UniqueText),
    (fields::ATMOSPHERIC_HAZARD_DESCRIPTION, MergeStrategy::UniqueText),
    (fields::ENGULFMENT_HAZARD_DESCRIPTION, MergeStrategy::UniqueText),
    (fields::CONFIGURATION_HAZARD_DESCRIPTION, MergeStrategy::UniqueText),
    (fields::OTHER_HAZARD_DESCRIPTION, MergeStrategy::UniqueText),
    (fields::ENTRY_REQUIREMENTS, MergeStrategy::UniqueText),
    (fields::PPE_LIST, MergeStrategy::UniqueText),
    (fields::IMAGE_URLS, MergeStrategy::ArrayUnion),
    (fields::IMAGES, MergeStrategy::ArrayUnion),
    (fields::PICTURES, MergeStrategy::ArrayUnion),
    (fields::WORK_ORDER_ID, MergeStrategy::JoinIdentifiers),
    (fields::UNIQUE_ID, MergeStrategy::JoinIdentifiers),
    (fields::SPACE_NAME, MergeStrategy::JoinIdentifiers),
    (fields::SURVEY_DATE, MergeStrategy::MostRecentDate),
    (fields::CREATED_AT, MergeStrategy::MostRecentDate),
];

/// Look up the explicit strategy for a field.
pub fn strategy_for(field: &str) -> Option<MergeStrategy> {
    FIELD_STRATEGIES.iter().find(|(name, _)| *name == field).map(|(_, s)| *s)
}

/// Provenance of a merged entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MergeInfo {
    pub original_entry_count: usize,
    pub original_indexes: Vec<usize>,
}

/// One render-ready entry: a record verbatim, or the merge of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedEntry {
    pub key: GroupKey,
    pub record: WorkOrderRecord,
    /// `None` for single-member groups.
    pub merge: Option<MergeInfo>,
}

impl ConsolidatedEntry {
    pub fn is_consolidated(&self) -> bool {
        self.merge.is_some()
    }

    /// Number of raw records behind this entry.
    pub fn original_entry_count(&self) -> usize {
        self.merge.as_ref().map(|m| m.original_entry_count).unwrap_or(1)
    }
}

/// Merge one group into a [`ConsolidatedEntry`].
///
/// Single-member groups pass through unchanged. Multi-member groups apply
/// the field strategies in member order and carry `_consolidated`,
/// `_originalEntryCount` and `_originalIndexes`.
pub fn consolidate(group: &ConsolidatedGroup<'_>) -> ConsolidatedEntry {
    if group.members.len() <= 1 {
        let record = group.members.first().map(|m| m.record.clone()).unwrap_or_default();
        return ConsolidatedEntry { key: group.key.clone(), record, merge: None };
    }

    let members: Vec<&WorkOrderRecord> = group.members.iter().map(|m| m.record).collect();

    // Every key seen on any member, first-seen order
    let mut keys: Vec<&str> = Vec::new();
    for member in &members {
        for key in member.fields().keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key.as_str());
            }
        }
    }

    let mut merged: Map<String, Value> = members[0].fields().clone();

    for key in keys {
        let values = || members.iter().map(move |m| m.get(key));

        let strategy = strategy_for(key).or_else(|| {
            // Any field carrying a boolean on some member is merged as a flag
            values().flatten().any(Value::is_boolean).then_some(MergeStrategy::AnyTrue)
        });

        let value = match strategy {
            Some(MergeStrategy::AnyTrue) => Some(Value::Bool(merge_any_true(values()))),
            Some(MergeStrategy::UniqueText) => merge_unique_text(values()).map(Value::String),
            Some(MergeStrategy::ArrayUnion) => Some(Value::Array(merge_array_union(values()))),
            Some(MergeStrategy::JoinIdentifiers) => merge_identifiers(values()).map(Value::String),
            Some(MergeStrategy::MostRecentDate) => merge_most_recent_date(values()),
            None => first_present(values()),
        };

        if let Some(value) = value {
            merged.insert(key.to_string(), value);
        }
    }

    let indexes = group.indexes();
    merged.insert(CONSOLIDATED_KEY.to_string(), Value::Bool(true));
    merged.insert(ORIGINAL_COUNT_KEY.to_string(), Value::from(members.len()));
    merged.insert(ORIGINAL_INDEXES_KEY.to_string(), Value::from(indexes.clone()));

    debug!("consolidated {} records for {}", members.len(), group.key.label());

    ConsolidatedEntry {
        key: group.key.clone(),
        record: WorkOrderRecord::new(merged),
        merge: Some(MergeInfo { original_entry_count: members.len(), original_indexes: indexes }),
    }
}

/// First member's value when present, otherwise the first present value from
/// a later member.
fn first_present<'a>(values: impl Iterator<Item = Option<&'a Value>>) -> Option<Value> {
    let mut fallback: Option<&Value> = None;
    for (i, value) in values.enumerate() {
        let Some(value) = value else { continue };
        if is_present(value) {
            return Some(value.clone());
        }
        if i == 0 {
            fallback = Some(value);
        }
    }
    fallback.cloned()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        other => value_text(other).is_some(),
    }
}

/// Group and merge a record collection, one entry per distinct space.
pub fn consolidate_all(records: &[WorkOrderRecord]) -> Vec<ConsolidatedEntry> {
    group(records).groups().iter().map(consolidate).collect()
}

/// One entry per raw record, without merging.
pub fn passthrough_all(records: &[WorkOrderRecord]) -> Vec<ConsolidatedEntry> {
    records
        .iter()
        .map(|r| ConsolidatedEntry { key: GroupKey::for_record(r), record: r.clone(), merge: None })
        .collect()
}
