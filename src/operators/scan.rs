//! Scan operators
//!
//! All scans are read-only. Store iteration is in identifier order, so
//! limited scans return the oldest matching documents.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::document::{DocumentId, DocumentRef};
use crate::predicate::BoundPredicate;
use crate::storage::{CollectionContext, CollectionStore};

use super::data::{Limit, OperatorData};
use super::errors::ExecutorResult;

/// How a primary-key scan treats the identifiers it looks up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKeyMode {
    /// Uniqueness guard: fail the whole batch if any identifier of the
    /// input already exists, or repeats within the input
    RejectExisting,
    /// Fetch each listed identifier, skipping those not found
    Fetch(Vec<DocumentId>),
}

/// Literal document list
pub(crate) fn raw_data(documents: &[DocumentRef]) -> OperatorData {
    OperatorData::from_documents(documents.to_vec())
}

/// Predicate scan over the whole store.
///
/// A zero limit returns before touching the store. Otherwise scanning
/// stops right after the match that reaches the limit.
pub(crate) fn full_scan(
    store: &CollectionStore,
    predicate: &BoundPredicate,
    limit: Limit,
    scanned: &mut usize,
) -> OperatorData {
    let mut output = OperatorData::new();
    if limit.is_zero() {
        return output;
    }

    for doc in store.values() {
        *scanned += 1;
        if predicate.matches(doc) {
            output.append(doc.clone());
            if !limit.check(output.len()) {
                break;
            }
        }
    }
    output
}

/// Unfiltered materialization of the store
pub(crate) fn transfer_scan(store: &CollectionStore, limit: Limit, scanned: &mut usize) -> OperatorData {
    let mut output = OperatorData::new();
    for doc in store.values() {
        if !limit.check(output.len()) {
            break;
        }
        *scanned += 1;
        output.append(doc.clone());
    }
    output
}

/// Rejects the input batch if any of its identifiers collides.
///
/// Returns the colliding identifier on failure.
pub(crate) fn reject_existing(store: &CollectionStore, input: OperatorData) -> Result<OperatorData, DocumentId> {
    let mut seen = BTreeSet::new();
    for doc in input.documents() {
        let id = doc.id();
        if store.contains(&id) || !seen.insert(id) {
            return Err(id);
        }
    }
    Ok(input)
}

/// Equality-list retrieval by identifier, in list order
pub(crate) fn fetch(store: &CollectionStore, ids: &[DocumentId], scanned: &mut usize) -> OperatorData {
    let mut output = OperatorData::with_capacity(ids.len());
    let mut seen = BTreeSet::new();
    for id in ids {
        *scanned += 1;
        if !seen.insert(*id) {
            continue;
        }
        if let Some(doc) = store.find(id) {
            output.append(doc.clone());
        }
    }
    output
}

/// Equality lookup through a secondary index, then the residual predicate
pub(crate) fn index_scan(
    collection: &CollectionContext,
    index: &str,
    value: &Value,
    predicate: &BoundPredicate,
    limit: Limit,
    scanned: &mut usize,
) -> ExecutorResult<OperatorData> {
    let mut output = OperatorData::new();
    if limit.is_zero() {
        return Ok(output);
    }

    let ids = collection.indexes().lookup_eq(index, value)?;
    for id in ids {
        let Some(doc) = collection.store().find(&id) else {
            continue;
        };
        *scanned += 1;
        if predicate.matches(doc) {
            output.append(doc.clone());
            if !limit.check(output.len()) {
                break;
            }
        }
    }
    Ok(output)
}
