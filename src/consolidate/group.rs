//! Grouping of records that describe the same physical space.
//!
//! Records are partitioned by [`GroupKey`]. Group order follows the first
//! occurrence of each key and members keep their input order, so the
//! partition is stable across runs given the same input order.

use crate::types::{WorkOrderRecord, fields};
use log::debug;
use std::collections::HashMap;

/// Key segment used when a location field is absent or empty.
pub const UNSPECIFIED: &str = "(unspecified)";

/// Composite key identifying a physical confined space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
pub struct GroupKey {
    pub building: String,
    pub location: String,
    pub space: String,
}

impl GroupKey {
    /// Derive the key for a record. Missing segments map to [`UNSPECIFIED`];
    /// no record is ever excluded for missing data.
    pub fn for_record(record: &WorkOrderRecord) -> Self {
        let segment = |value: Option<String>| value.unwrap_or_else(|| UNSPECIFIED.to_string());
        Self {
            building: segment(record.text(fields::BUILDING)),
            location: segment(record.text(fields::LOCATION_DESCRIPTION)),
            space: segment(record.text_any(&[fields::SPACE_NAME, fields::CONFINED_SPACE_DESCRIPTION])),
        }
    }

    /// Human-readable form, e.g. "A / Hall 1 / Tank 1".
    pub fn label(&self) -> String {
        format!("{} / {} / {}", self.building, self.location, self.space)
    }
}

/// A record together with its position in the input.
#[derive(Debug, Clone, Copy)]
pub struct IndexedRecord<'a> {
    pub index: usize,
    pub record: &'a WorkOrderRecord,
}

/// Records sharing one [`GroupKey`], in input order.
#[derive(Debug, Clone)]
pub struct ConsolidatedGroup<'a> {
    pub key: GroupKey,
    pub members: Vec<IndexedRecord<'a>>,
}

impl<'a> ConsolidatedGroup<'a> {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Original input positions of the members.
    pub fn indexes(&self) -> Vec<usize> {
        self.members.iter().map(|m| m.index).collect()
    }
}

/// Result of grouping: groups in first-occurrence order.
#[derive(Debug, Clone, Default)]
pub struct Grouping<'a> {
    groups: Vec<ConsolidatedGroup<'a>>,
    positions: HashMap<GroupKey, usize>,
}

impl<'a> Grouping<'a> {
    pub fn groups(&self) -> &[ConsolidatedGroup<'a>] {
        &self.groups
    }
}

/// Partition records by [`GroupKey`].
///
/// Every input record appears in exactly one group.
pub fn group(records: &[WorkOrderRecord]) -> Grouping<'_> {
    let mut grouping = Grouping::default();

    for (index, record) in records.iter().enumerate() {
        let key = GroupKey::for_record(record);
        let member = IndexedRecord { index, record };

        match grouping.positions.get(&key) {
            Some(&pos) => grouping.groups[pos].members.push(member),
            None => {
                grouping.positions.insert(key.clone(), grouping.groups.len());
                grouping.groups.push(ConsolidatedGroup { key, members: vec![member] });
            }
        }
    }

    debug!("grouped {} records into {} spaces", records.len(), grouping.groups.len());

    grouping
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(values: Vec<serde_json::Value>) -> Vec<WorkOrderRecord> {
        values.into_iter().map(WorkOrderRecord::from_value).collect()
    }

    #[test]
    fn test_missing_fields_use_sentinel() {
        let rs = records(vec![json!({})]);
        let key = GroupKey::for_record(&rs[0]);
        assert_eq!(key.building, UNSPECIFIED);
        assert_eq!(key.location, UNSPECIFIED);
        assert_eq!(key.space, UNSPECIFIED);
    }

    #[test]
    fn test_space_falls_back_to_description() {
        let rs = records(vec![json!({"spaceName": " ", "confinedSpaceDescription": "Pit 3"})]);
        assert_eq!(GroupKey::for_record(&rs[0]).space, "Pit 3");
    }

    #[test]
    fn test_keys_are_trimmed_and_case_sensitive() {
        let rs = records(vec![
            json!({"building": "A ", "locationDescription": "Hall", "spaceName": "Tank"}),
            json!({"building": "A", "locationDescription": " Hall", "spaceName": "Tank"}),
            json!({"building": "a", "locationDescription": "Hall", "spaceName": "Tank"}),
        ]);
        let grouping = group(&rs);
        assert_eq!(grouping.groups().len(), 2);
        assert_eq!(grouping.groups()[0].indexes(), vec![0, 1]);
        assert_eq!(grouping.groups()[1].indexes(), vec![2]);
    }

    #[test]
    fn test_first_occurrence_order_and_total_coverage() {
        let rs = records(vec![
            json!({"building": "B"}),
            json!({"building": "A"}),
            json!({"building": "B"}),
            json!({"building": "C"}),
            json!({"building": "A"}),
        ]);
        let grouping = group(&rs);
        let order: Vec<&str> = grouping.groups().iter().map(|g| g.key.building.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);

        let total: usize = grouping.groups().iter().map(|g| g.len()).sum();
        assert_eq!(total, rs.len());
    }

    #[test]
    fn test_grouping_is_idempotent() {
        let rs = records(vec![
            json!({"building": "A", "spaceName": "T1"}),
            json!({"building": "B"}),
            json!({"building": "A", "spaceName": "T1"}),
        ]);
        let first: Vec<(GroupKey, Vec<usize>)> = group(&rs).groups().iter().map(|g| (g.key.clone(), g.indexes())).collect();
        let second: Vec<(GroupKey, Vec<usize>)> =
            group(&rs).groups().iter().map(|g| (g.key.clone(), g.indexes())).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_input() {
        let grouping = group(&[]);
        assert!(grouping.groups().is_empty());
    }
}
