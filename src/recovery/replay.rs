//! WAL replay
//!
//! Applies verified entries in sequence order to a catalog. Data
//! statements run through the physical planner exactly as live queries
//! do, against a sink that logs nothing.

use tracing::{debug, info};

use crate::context::PipelineContext;
use crate::operators::QueryExecutor;
use crate::planner::{create_plan, Node};
use crate::storage::Catalog;
use crate::wal::{DiscardWal, Statement, WalEntry};

use super::errors::{RecoveryError, RecoveryResult};

/// Statistics from WAL replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub records_replayed: u64,
    /// Documents inserted
    pub inserts: u64,
    /// Documents deleted
    pub deletes: u64,
    /// Collection and index changes
    pub ddl: u64,
    /// Sequence number of the last replayed entry
    pub final_sequence: u64,
}

/// Replays `entries` into `catalog`.
///
/// Replay is deterministic: the same log replayed into an empty catalog
/// always produces the same state.
pub fn replay(
    entries: impl IntoIterator<Item = WalEntry>,
    catalog: &mut Catalog,
) -> RecoveryResult<ReplayStats> {
    let pipeline = PipelineContext::detached();
    let mut stats = ReplayStats::default();

    for entry in entries {
        let lsn = entry.lsn;
        apply(entry.statement, lsn, catalog, &pipeline, &mut stats)?;
        stats.records_replayed += 1;
        stats.final_sequence = lsn;
    }

    info!(
        records = stats.records_replayed,
        last_lsn = stats.final_sequence,
        collections = catalog.len(),
        "WAL replay complete"
    );
    Ok(stats)
}

fn apply(
    statement: Statement,
    lsn: u64,
    catalog: &mut Catalog,
    pipeline: &PipelineContext,
    stats: &mut ReplayStats,
) -> RecoveryResult<()> {
    debug!(lsn, statement_type = %statement.statement_type(), "replaying statement");
    let catalog_err = |source| RecoveryError::Catalog { lsn, source };
    let index_err = |source| RecoveryError::Index { lsn, source };

    let node = match statement {
        Statement::CreateCollection { collection } => {
            catalog.create_collection(collection).map_err(catalog_err)?;
            stats.ddl += 1;
            return Ok(());
        }
        Statement::DropCollection { collection } => {
            catalog.drop_collection(&collection).map_err(catalog_err)?;
            stats.ddl += 1;
            return Ok(());
        }
        Statement::CreateIndex {
            collection,
            name,
            field,
        } => {
            catalog
                .get_mut(&collection)
                .map_err(catalog_err)?
                .create_index(&name, &field)
                .map_err(index_err)?;
            stats.ddl += 1;
            return Ok(());
        }
        Statement::DropIndex { collection, name } => {
            catalog
                .get_mut(&collection)
                .map_err(catalog_err)?
                .drop_index(&name)
                .map_err(index_err)?;
            stats.ddl += 1;
            return Ok(());
        }
        Statement::InsertMany {
            collection,
            documents,
        } => Node::Insert {
            collection,
            documents,
        },
        Statement::DeleteMany { collection, ids } => Node::DeleteByIds { collection, ids },
    };

    let context = catalog.get_mut(node.collection()).map_err(catalog_err)?;
    let exec_err = |source| RecoveryError::Execution { lsn, source };
    let plan = create_plan(&node, context).map_err(exec_err)?;

    let mut sink = DiscardWal;
    let output = QueryExecutor::new(context, &mut sink)
        .execute(plan, pipeline)
        .map_err(exec_err)?;

    match node {
        Node::Insert { .. } => stats.inserts += output.written.len() as u64,
        _ => stats.deletes += output.written.len() as u64,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentId};
    use crate::storage::CollectionName;
    use serde_json::json;

    fn name() -> CollectionName {
        CollectionName::new("db", "users")
    }

    fn entries(statements: Vec<Statement>) -> Vec<WalEntry> {
        statements
            .into_iter()
            .enumerate()
            .map(|(i, s)| WalEntry::new(0, i as u64 + 1, s))
            .collect()
    }

    fn doc(i: u32, city: &str) -> Document {
        Document::with_id(DocumentId::from_parts(1, i), json!({ "city": city })).unwrap()
    }

    #[test]
    fn test_replay_rebuilds_store_and_indexes() {
        let log = entries(vec![
            Statement::CreateCollection { collection: name() },
            Statement::CreateIndex {
                collection: name(),
                name: "by_city".into(),
                field: "city".into(),
            },
            Statement::InsertMany {
                collection: name(),
                documents: vec![doc(1, "Oslo"), doc(2, "Rome"), doc(3, "Oslo")],
            },
            Statement::DeleteMany {
                collection: name(),
                ids: vec![DocumentId::from_parts(1, 1)],
            },
        ]);

        let mut catalog = Catalog::new();
        let stats = replay(log, &mut catalog).unwrap();

        assert_eq!(stats.records_replayed, 4);
        assert_eq!(stats.inserts, 3);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.ddl, 2);
        assert_eq!(stats.final_sequence, 4);

        let users = catalog.get(&name()).unwrap();
        assert_eq!(users.store().len(), 2);
        assert_eq!(
            users.indexes().lookup_eq("by_city", &json!("Oslo")).unwrap(),
            vec![DocumentId::from_parts(1, 3)]
        );
    }

    #[test]
    fn test_replay_into_missing_collection_fails() {
        let log = entries(vec![Statement::InsertMany {
            collection: name(),
            documents: vec![doc(1, "Oslo")],
        }]);

        let err = replay(log, &mut Catalog::new()).unwrap_err();
        assert_eq!(err.lsn(), Some(1));
        assert!(matches!(err, RecoveryError::Catalog { .. }));
    }

    #[test]
    fn test_drop_collection_discards_documents() {
        let log = entries(vec![
            Statement::CreateCollection { collection: name() },
            Statement::InsertMany {
                collection: name(),
                documents: vec![doc(1, "Oslo")],
            },
            Statement::DropCollection { collection: name() },
            Statement::CreateCollection { collection: name() },
        ]);

        let mut catalog = Catalog::new();
        replay(log, &mut catalog).unwrap();
        assert!(catalog.get(&name()).unwrap().store().is_empty());
    }
}
