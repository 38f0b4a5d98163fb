//! Filters for `find_many` and hook queries.
//!
//! Filters are deliberately narrow: equality on top-level fields, an optional
//! excluded identifier, one sort key and limit/skip.

use crate::{Document, DocumentId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Explicit ordering for results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// A query over one collection.
///
/// Without a sort, results come back in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Field equality conditions, all of which must hold
    pub conditions: Map<String, Value>,
    /// Identifier to leave out of the results
    pub exclude_id: Option<DocumentId>,
    pub sort: Option<Sort>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl Filter {
    /// Match every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.insert(field.into(), value.into());
        self
    }

    /// Leave one document out.
    pub fn excluding(mut self, id: impl Into<DocumentId>) -> Self {
        self.exclude_id = Some(id.into());
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Whether a document satisfies the conditions and exclusion.
    ///
    /// A condition on a missing field never matches, even when it asks for `null`.
    pub fn matches(&self, document: &Document) -> bool {
        if self.exclude_id.as_deref() == Some(document.id.as_str()) {
            return false;
        }
        self.conditions
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    /// Apply sort, skip and limit to already-matched documents.
    pub fn arrange(&self, mut documents: Vec<Document>) -> Vec<Document> {
        if let Some(sort) = &self.sort {
            documents.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&sort.field).unwrap_or(&Value::Null),
                    b.get(&sort.field).unwrap_or(&Value::Null),
                );
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        documents
            .into_iter()
            .skip(self.skip.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Total order over JSON values: null, booleans, numbers, strings, arrays, objects.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x.len().cmp(&y.len()),
        _ => rank(a).cmp(&rank(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document::new(id, value.as_object().cloned().unwrap())
    }

    #[test]
    fn equality_and_exclusion() {
        let filter = Filter::new().eq("storeId", "S1").eq("isDefault", true);
        assert!(filter.matches(&doc("a", json!({"storeId": "S1", "isDefault": true}))));
        assert!(!filter.matches(&doc("b", json!({"storeId": "S1", "isDefault": false}))));
        assert!(!filter.matches(&doc("c", json!({"storeId": "S2", "isDefault": true}))));

        let excluding = filter.excluding("a");
        assert!(!excluding.matches(&doc("a", json!({"storeId": "S1", "isDefault": true}))));
    }

    #[test]
    fn null_condition_needs_explicit_null() {
        let filter = Filter::new().eq("deletedAt", Value::Null);
        assert!(filter.matches(&doc("a", json!({"deletedAt": null}))));
        assert!(!filter.matches(&doc("b", json!({}))));
    }

    #[test]
    fn arrange_sorts_then_pages() {
        let docs = vec![
            doc("a", json!({"price": 30})),
            doc("b", json!({"price": 10})),
            doc("c", json!({"price": 20.5})),
            doc("d", json!({})),
        ];

        let asc = Filter::new().sort_by("price", SortDirection::Asc).arrange(docs.clone());
        let ids: Vec<_> = asc.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "b", "c", "a"]);

        let page = Filter::new()
            .sort_by("price", SortDirection::Desc)
            .skip(1)
            .limit(2)
            .arrange(docs);
        let ids: Vec<_> = page.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b"]);
    }

    #[test]
    fn unsorted_keeps_input_order() {
        let docs = vec![doc("x", json!({})), doc("y", json!({})), doc("z", json!({}))];
        let ids: Vec<_> = Filter::new()
            .limit(2)
            .arrange(docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
