//! Cell drafts and bulk request construction for the edit orchestrator.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use crate::model::{ApplyScope, BulkEditRequest, EditRecord, RowPage};

/// In-progress cell input, keyed by (row_id, column). A draft only becomes an
/// edit record on commit, and only when it differs from the cell it shadows.
#[derive(Debug, Default)]
pub struct DraftBuffer {
    drafts: HashMap<(String, String), String>,
}

impl DraftBuffer {
    pub fn set(&mut self, row_id: &str, column: &str, text: impl Into<String>) {
        self.drafts.insert((row_id.to_string(), column.to_string()), text.into());
    }

    pub fn get(&self, row_id: &str, column: &str) -> Option<&str> {
        self.drafts
            .get(&(row_id.to_string(), column.to_string()))
            .map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }

    pub fn discard_all(&mut self) {
        self.drafts.clear();
    }

    /// Field exit: remove the draft and turn it into an edit record unless it
    /// matches the original value (null original reads as "").
    pub fn take_commit(&mut self, row_id: &str, column: &str, page: Option<&RowPage>) -> Option<EditRecord> {
        let draft = self.drafts.remove(&(row_id.to_string(), column.to_string()))?;
        let original = page
            .and_then(|p| p.row(row_id))
            .map(|r| r.cell_text(column))
            .unwrap_or("");
        if draft == original {
            return None;
        }
        Some(EditRecord { row_id: row_id.to_string(), column: column.to_string(), value: draft })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMode {
    Map,
    Replace,
}

impl FromStr for BulkMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "map" => Ok(BulkMode::Map),
            "replace" => Ok(BulkMode::Replace),
            other => Err(format!("unknown bulk mode '{}' (expected map|replace)", other)),
        }
    }
}

/// Form-style bulk input. With `mode` unset the request shape is inferred: a
/// non-empty `replace_from` selects Replace and the mapping is ignored,
/// otherwise Map is sent even when the mapping is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkForm {
    pub column: String,
    pub apply_to: ApplyScope,
    pub mode: Option<BulkMode>,
    pub mapping: BTreeMap<String, Option<String>>,
    pub default: Option<String>,
    pub replace_from: Option<String>,
    pub replace_to: Option<String>,
}

impl BulkForm {
    pub fn resolved_mode(&self) -> BulkMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        match self.replace_from.as_deref() {
            Some(from) if !from.is_empty() => BulkMode::Replace,
            _ => BulkMode::Map,
        }
    }

    pub fn into_request(self) -> BulkEditRequest {
        match self.resolved_mode() {
            BulkMode::Replace => BulkEditRequest::Replace {
                column: self.column,
                apply_to: self.apply_to,
                from: self.replace_from.unwrap_or_default(),
                to: self.replace_to.unwrap_or_default(),
            },
            BulkMode::Map => BulkEditRequest::Map {
                column: self.column,
                apply_to: self.apply_to,
                mapping: self.mapping,
                default: self.default.unwrap_or_default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::rows::tests::page_of;

    #[test]
    fn commit_of_changed_draft_yields_single_record() {
        let page = page_of(0, 10, 12, None);
        let mut drafts = DraftBuffer::default();
        drafts.set("r5", "Salary", "55000");
        let rec = drafts.take_commit("r5", "Salary", Some(&page)).unwrap();
        assert_eq!(rec, EditRecord { row_id: "r5".into(), column: "Salary".into(), value: "55000".into() });
        assert!(drafts.is_empty());
    }

    #[test]
    fn commit_of_unchanged_draft_is_skipped() {
        let page = page_of(0, 10, 12, None);
        let mut drafts = DraftBuffer::default();
        // r5 holds 50004 in the fixture
        drafts.set("r5", "Salary", "50004");
        assert!(drafts.take_commit("r5", "Salary", Some(&page)).is_none());
        assert!(drafts.is_empty());
    }

    #[test]
    fn empty_draft_over_null_cell_is_a_noop() {
        let page = page_of(0, 10, 12, None);
        let mut drafts = DraftBuffer::default();
        drafts.set("r1", "Email", "");
        assert!(drafts.take_commit("r1", "Email", Some(&page)).is_none());
    }

    #[test]
    fn commit_without_draft_is_nothing() {
        let mut drafts = DraftBuffer::default();
        assert!(drafts.take_commit("r1", "Salary", None).is_none());
    }

    #[test]
    fn drafts_are_bound_to_their_cell() {
        let mut drafts = DraftBuffer::default();
        drafts.set("r1", "Salary", "1");
        drafts.set("r1", "Email", "a@b.c");
        assert_eq!(drafts.get("r1", "Salary"), Some("1"));
        assert_eq!(drafts.get("r2", "Salary"), None);
        assert_eq!(drafts.len(), 2);
    }

    #[test]
    fn replace_from_wins_over_mapping() {
        let form = BulkForm {
            column: "Gender".into(),
            mapping: BTreeMap::from([("F".to_string(), Some("Female".to_string()))]),
            default: Some("Unknown".into()),
            replace_from: Some("M".into()),
            replace_to: Some("Male".into()),
            ..Default::default()
        };
        assert_eq!(
            form.into_request(),
            BulkEditRequest::Replace { column: "Gender".into(), apply_to: ApplyScope::All, from: "M".into(), to: "Male".into() }
        );
    }

    #[test]
    fn empty_replace_from_falls_back_to_map() {
        for from in [None, Some(String::new())] {
            let form = BulkForm {
                column: "Department".into(),
                apply_to: ApplyScope::Missing,
                replace_from: from,
                replace_to: Some("ignored".into()),
                ..Default::default()
            };
            assert_eq!(
                form.into_request(),
                BulkEditRequest::Map {
                    column: "Department".into(),
                    apply_to: ApplyScope::Missing,
                    mapping: BTreeMap::new(),
                    default: String::new(),
                }
            );
        }
    }

    #[test]
    fn explicit_mode_allows_replacing_empty_string() {
        let form = BulkForm {
            column: "Email".into(),
            mode: Some(BulkMode::Replace),
            replace_from: Some(String::new()),
            replace_to: Some("n/a".into()),
            ..Default::default()
        };
        assert_eq!(form.resolved_mode(), BulkMode::Replace);
        assert!(matches!(form.into_request(), BulkEditRequest::Replace { from, .. } if from.is_empty()));
    }

    #[test]
    fn explicit_map_ignores_replace_from() {
        let form = BulkForm {
            column: "Email".into(),
            mode: Some(BulkMode::Map),
            replace_from: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(form.into_request().action_type(), "map");
    }
}
