//! Sort operator
//!
//! Stable: documents equal on every key keep their input order.

use crate::document::Comparator;

use super::data::OperatorData;

pub(crate) fn execute(comparator: &Comparator, mut input: OperatorData) -> OperatorData {
    input
        .documents_mut()
        .sort_by(|a, b| comparator.compare(a, b));
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentId, SortKey};
    use serde_json::json;

    #[test]
    fn test_multi_key_stable_sort() {
        let docs = [
            (1, json!({"a": 2, "b": "x"})),
            (2, json!({"a": 1, "b": "y"})),
            (3, json!({"a": 2, "b": "x"})),
            (4, json!({"b": "z"})),
        ]
        .into_iter()
        .map(|(i, body)| Document::with_id(DocumentId::from_parts(1, i), body).unwrap().into_ref())
        .collect();

        let comparator = Comparator::new(vec![SortKey::desc("a"), SortKey::asc("b")]);
        let sorted = execute(&comparator, OperatorData::from_documents(docs));
        let order: Vec<_> = sorted.documents().iter().map(|d| d.id()).collect();
        assert_eq!(
            order,
            vec![
                DocumentId::from_parts(1, 1),
                DocumentId::from_parts(1, 3),
                DocumentId::from_parts(1, 2),
                DocumentId::from_parts(1, 4),
            ]
        );
    }
}
