//! Query dispatcher
//!
//! Routes logical plans to shard actors and merges their replies:
//! - Inserts are routed by identifier after a cross-shard existence probe
//! - Reads, deletes and aggregates fan out to every shard of the collection
//! - DDL is logged before it takes effect
//!
//! Every exchange with the shards runs under the configured shard timeout.
//! Merged results are in identifier order before a global limit applies.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};
use tokio::sync::{oneshot, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{Address, PipelineContext, StorageParameters};
use crate::cursor::{Cursor, SubCursor};
use crate::document::{Comparator, Document, DocumentId};
use crate::index::{IndexError, IndexResult};
use crate::operators::{AggregateKind, ExecutionOutput, ExecutorError, Limit, OperatorData};
use crate::planner::{Node, Stage};
use crate::predicate::Expr;
use crate::recovery;
use crate::storage::{shard_for, CollectionContext, CollectionName};
use crate::wal::{SharedWal, Statement, WalWriter};

use super::actor::{ShardActor, ShardHandle, ShardMessage, ShardReply};
use super::errors::{DispatchError, DispatchResult};

/// Caller-visible result of one dispatched plan
#[derive(Debug)]
pub enum QueryResult {
    Documents(Cursor),
    /// Identifiers inserted or deleted
    Written(Vec<DocumentId>),
    /// DDL completed
    Done,
}

impl QueryResult {
    /// JSON rendering for line-oriented front ends
    pub fn to_json(&self) -> Value {
        match self {
            QueryResult::Documents(cursor) => json!({
                "documents": cursor.iter().map(|doc| doc.body().clone()).collect::<Vec<_>>(),
            }),
            QueryResult::Written(ids) => json!({
                "written": ids.iter().map(DocumentId::to_hex).collect::<Vec<_>>(),
            }),
            QueryResult::Done => json!({ "ok": true }),
        }
    }
}

struct CollectionEntry {
    shards: Vec<ShardHandle>,
    /// Index name to field path, mirrored on every shard
    indexes: BTreeMap<String, String>,
}

type Pending<T> = (ShardHandle, ShardMessage, oneshot::Receiver<T>);

pub struct Dispatcher {
    config: Config,
    wal: SharedWal,
    collections: RwLock<BTreeMap<CollectionName, CollectionEntry>>,
}

impl Dispatcher {
    /// Recovers the WAL under the configured data directory and starts one
    /// actor per collection shard.
    ///
    /// # Errors
    ///
    /// Fails if the log cannot be opened or a verified statement cannot be
    /// replayed.
    pub async fn open(config: Config) -> DispatchResult<Self> {
        let (writer, recovered) = WalWriter::open_with_recovery(config.data_path(), config.wal_fsync)?;
        let (catalog, report) = recovery::rebuild(recovered)?;
        let wal = SharedWal::new(writer);

        let mut collections = BTreeMap::new();
        for (name, context) in catalog.into_collections() {
            let indexes = context
                .indexes()
                .definitions()
                .into_iter()
                .map(|definition| (definition.name, definition.field))
                .collect();
            let shards = spawn_shards(context, &wal, &config)?;
            collections.insert(name, CollectionEntry { shards, indexes });
        }

        info!(
            data_dir = %config.data_path().display(),
            collections = collections.len(),
            shards_per_collection = config.shards_per_collection,
            last_lsn = report.stats.final_sequence,
            "dispatcher ready"
        );

        Ok(Self {
            config,
            wal,
            collections: RwLock::new(collections),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Sequence number of the last logged statement
    pub fn last_lsn(&self) -> DispatchResult<u64> {
        Ok(self.wal.last_lsn()?)
    }

    pub async fn collections(&self) -> Vec<CollectionName> {
        self.collections.read().await.keys().cloned().collect()
    }

    /// Executes `node` with `parameters` bound for its predicates.
    pub async fn execute(&self, node: Node, parameters: StorageParameters) -> DispatchResult<QueryResult> {
        let pipeline = PipelineContext::with_parameters(parameters);
        match node {
            Node::CreateCollection { collection } => self.create_collection(collection).await,
            Node::DropCollection { collection } => self.drop_collection(collection).await,
            Node::CreateIndex {
                collection,
                name,
                field,
            } => self.create_index(collection, name, field).await,
            Node::DropIndex { collection, name } => self.drop_index(collection, name).await,
            node => {
                // DDL takes the write lock, so it waits until this exchange is done.
                let collections = self.collections.read().await;
                let entry = collections
                    .get(node.collection())
                    .ok_or_else(|| DispatchError::CollectionNotFound(node.collection().clone()))?;
                self.execute_data(&entry.shards, node, &pipeline).await
            }
        }
    }

    async fn execute_data(
        &self,
        shards: &[ShardHandle],
        node: Node,
        pipeline: &PipelineContext,
    ) -> DispatchResult<QueryResult> {
        match node {
            Node::Insert {
                collection,
                documents,
            } => self.insert(shards, collection, documents, pipeline).await,
            Node::Delete {
                collection,
                predicate,
                limit,
            } => self.delete(shards, collection, predicate, limit, pipeline).await,
            Node::DeleteByIds { collection, ids } => {
                let written = self.delete_ids(shards, collection, ids, pipeline).await?;
                Ok(QueryResult::Written(written))
            }
            Node::Aggregate { collection, stages } => self.aggregate(shards, collection, stages, pipeline).await,
            node @ (Node::Match { .. } | Node::FetchByIds { .. }) => {
                let limit = match &node {
                    Node::Match { limit, .. } => *limit,
                    _ => Limit::unlimited(),
                };
                let mut cursor = self.read(shards, &node, pipeline).await?;
                cursor.sort_by_id();
                if let Some(n) = limit.value() {
                    cursor.truncate(n);
                }
                Ok(QueryResult::Documents(cursor))
            }
            Node::CreateCollection { .. }
            | Node::DropCollection { .. }
            | Node::CreateIndex { .. }
            | Node::DropIndex { .. } => Err(ExecutorError::invalid_plan("DDL is not routed to shards").into()),
        }
    }

    async fn create_collection(&self, collection: CollectionName) -> DispatchResult<QueryResult> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&collection) {
            return Err(DispatchError::CollectionExists(collection));
        }

        self.wal.append(&Statement::CreateCollection {
            collection: collection.clone(),
        })?;
        let shards = spawn_shards(CollectionContext::new(collection.clone()), &self.wal, &self.config)?;
        info!(collection = %collection, shards = shards.len(), "collection created");

        collections.insert(
            collection,
            CollectionEntry {
                shards,
                indexes: BTreeMap::new(),
            },
        );
        Ok(QueryResult::Done)
    }

    async fn drop_collection(&self, collection: CollectionName) -> DispatchResult<QueryResult> {
        let mut collections = self.collections.write().await;
        if !collections.contains_key(&collection) {
            return Err(DispatchError::CollectionNotFound(collection));
        }

        self.wal.append(&Statement::DropCollection {
            collection: collection.clone(),
        })?;
        collections.remove(&collection);
        info!(collection = %collection, "collection dropped");
        Ok(QueryResult::Done)
    }

    async fn create_index(
        &self,
        collection: CollectionName,
        name: String,
        field: String,
    ) -> DispatchResult<QueryResult> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(&collection)
            .ok_or_else(|| DispatchError::CollectionNotFound(collection.clone()))?;
        if field.is_empty() {
            return Err(IndexError::EmptyField.into());
        }
        if entry.indexes.contains_key(&name) {
            return Err(IndexError::AlreadyExists(name).into());
        }

        self.wal.append(&Statement::CreateIndex {
            collection: collection.clone(),
            name: name.clone(),
            field: field.clone(),
        })?;

        let requests = entry
            .shards
            .iter()
            .map(|shard| {
                let (reply, rx) = oneshot::channel();
                let message = ShardMessage::CreateIndex {
                    name: name.clone(),
                    field: field.clone(),
                    reply,
                };
                (shard.clone(), message, rx)
            })
            .collect();
        self.exchange::<IndexResult<()>>(requests)
            .await?
            .into_iter()
            .collect::<IndexResult<()>>()?;

        debug!(collection = %collection, index = %name, field = %field, "index created");
        entry.indexes.insert(name, field);
        Ok(QueryResult::Done)
    }

    async fn drop_index(&self, collection: CollectionName, name: String) -> DispatchResult<QueryResult> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(&collection)
            .ok_or_else(|| DispatchError::CollectionNotFound(collection.clone()))?;
        if !entry.indexes.contains_key(&name) {
            return Err(IndexError::NotFound(name).into());
        }

        self.wal.append(&Statement::DropIndex {
            collection: collection.clone(),
            name: name.clone(),
        })?;

        let requests = entry
            .shards
            .iter()
            .map(|shard| {
                let (reply, rx) = oneshot::channel();
                let message = ShardMessage::DropIndex {
                    name: name.clone(),
                    reply,
                };
                (shard.clone(), message, rx)
            })
            .collect();
        self.exchange::<IndexResult<()>>(requests)
            .await?
            .into_iter()
            .collect::<IndexResult<()>>()?;

        debug!(collection = %collection, index = %name, "index dropped");
        entry.indexes.remove(&name);
        Ok(QueryResult::Done)
    }

    async fn insert(
        &self,
        shards: &[ShardHandle],
        collection: CollectionName,
        documents: Vec<Document>,
        pipeline: &PipelineContext,
    ) -> DispatchResult<QueryResult> {
        if documents.is_empty() {
            return Ok(QueryResult::Written(Vec::new()));
        }

        // A batch spanning shards is checked everywhere before any shard
        // writes, so a collision cannot leave part of the batch behind.
        let mut seen = BTreeSet::new();
        let mut collision = documents.iter().map(Document::id).find(|id| !seen.insert(*id));
        if collision.is_none() && shards.len() > 1 {
            let probe = Node::FetchByIds {
                collection: collection.clone(),
                ids: seen.into_iter().collect(),
            };
            let existing = self.read(shards, &probe, pipeline).await?;
            collision = existing.iter().next().map(|doc| doc.id());
        }
        if let Some(id) = collision {
            debug!(collection = %collection, id = %id.to_hex(), "duplicate key rejected");
            return Err(ExecutorError::duplicate_key(id).into());
        }

        let mut batches: Vec<Vec<Document>> = (0..shards.len()).map(|_| Vec::new()).collect();
        for document in documents {
            batches[shard_for(&document.id(), shards.len())].push(document);
        }

        let requests = shards
            .iter()
            .zip(batches)
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(shard, documents)| {
                let node = Node::Insert {
                    collection: collection.clone(),
                    documents,
                };
                execute_request(shard, node, pipeline)
            })
            .collect();

        let written = written_ids(self.run(requests).await?);
        Ok(QueryResult::Written(written))
    }

    async fn delete(
        &self,
        shards: &[ShardHandle],
        collection: CollectionName,
        predicate: Expr,
        limit: Limit,
        pipeline: &PipelineContext,
    ) -> DispatchResult<QueryResult> {
        let Some(n) = limit.value() else {
            let node = Node::Delete {
                collection,
                predicate,
                limit,
            };
            let requests = shards
                .iter()
                .map(|shard| execute_request(shard, node.clone(), pipeline))
                .collect();
            return Ok(QueryResult::Written(written_ids(self.run(requests).await?)));
        };

        // A limit is global: pick the victims first, then delete exactly those.
        let probe = Node::Match {
            collection: collection.clone(),
            predicate,
            limit,
        };
        let mut victims = self.read(shards, &probe, pipeline).await?;
        victims.sort_by_id();
        victims.truncate(n);
        let ids = victims.iter().map(|doc| doc.id()).collect();

        let written = self.delete_ids(shards, collection, ids, pipeline).await?;
        Ok(QueryResult::Written(written))
    }

    async fn delete_ids(
        &self,
        shards: &[ShardHandle],
        collection: CollectionName,
        ids: Vec<DocumentId>,
        pipeline: &PipelineContext,
    ) -> DispatchResult<Vec<DocumentId>> {
        let mut batches: Vec<Vec<DocumentId>> = (0..shards.len()).map(|_| Vec::new()).collect();
        for id in ids {
            batches[shard_for(&id, shards.len())].push(id);
        }

        let requests = shards
            .iter()
            .zip(batches)
            .filter(|(_, batch)| !batch.is_empty())
            .map(|(shard, ids)| {
                let node = Node::DeleteByIds {
                    collection: collection.clone(),
                    ids,
                };
                execute_request(shard, node, pipeline)
            })
            .collect();

        Ok(written_ids(self.run(requests).await?))
    }

    async fn aggregate(
        &self,
        shards: &[ShardHandle],
        collection: CollectionName,
        mut stages: Vec<Stage>,
        pipeline: &PipelineContext,
    ) -> DispatchResult<QueryResult> {
        let group = match stages.last() {
            Some(Stage::Group { aggregate }) => Some(aggregate.clone()),
            _ => None,
        };
        let limited = stages.iter().any(|stage| matches!(stage, Stage::Limit { .. }));

        let result = match group {
            // Partials of an unlimited pipeline combine directly.
            Some(kind) if !limited => {
                let node = Node::Aggregate { collection, stages };
                let partials: Vec<Value> = self
                    .run(fan_out(shards, &node, pipeline))
                    .await?
                    .iter()
                    .map(|(_, output)| match output.documents.first() {
                        Some(doc) => kind.result_value(doc),
                        None => Value::Null,
                    })
                    .collect();
                single(&kind, kind.combine(&partials))
            }
            // A limit must see the merged sequence before reducing.
            Some(kind) => {
                stages.pop();
                let cursor = self.run_stages(shards, collection, stages, pipeline).await?;
                let data = OperatorData::from_documents(cursor.into_documents());
                single(&kind, kind.compute(Some(&data)))
            }
            None => self.run_stages(shards, collection, stages, pipeline).await?,
        };
        Ok(QueryResult::Documents(result))
    }

    /// Runs a group-free pipeline on every shard, then repeats its sort and
    /// limit stages over the merged cursor, starting from identifier order.
    async fn run_stages(
        &self,
        shards: &[ShardHandle],
        collection: CollectionName,
        stages: Vec<Stage>,
        pipeline: &PipelineContext,
    ) -> DispatchResult<Cursor> {
        let node = Node::Aggregate {
            collection,
            stages: stages.clone(),
        };
        let mut cursor = self.read(shards, &node, pipeline).await?;
        cursor.sort_by_id();
        for stage in stages {
            match stage {
                Stage::Sort { keys } => cursor.sort(&Comparator::new(keys)),
                Stage::Limit { limit } => {
                    if let Some(n) = limit.value() {
                        cursor.truncate(n);
                    }
                }
                Stage::Match { .. } | Stage::Group { .. } => {}
            }
        }
        Ok(cursor)
    }

    /// Fans `node` out and merges the outputs into one cursor, one
    /// sub-cursor per shard.
    async fn read(&self, shards: &[ShardHandle], node: &Node, pipeline: &PipelineContext) -> DispatchResult<Cursor> {
        let mut cursor = Cursor::new();
        for (address, output) in self.run(fan_out(shards, node, pipeline)).await? {
            cursor.push(SubCursor::new(address, output.documents));
        }
        Ok(cursor)
    }

    /// Runs execute requests and fails on the first shard error.
    async fn run(&self, requests: Vec<Pending<ShardReply>>) -> DispatchResult<Vec<(Address, ExecutionOutput)>> {
        self.exchange(requests)
            .await?
            .into_iter()
            .map(|reply| {
                reply
                    .result
                    .map(|output| (reply.address, output))
                    .map_err(DispatchError::from)
            })
            .collect()
    }

    /// Sends every request and waits for every reply, bounded by the shard
    /// timeout.
    async fn exchange<T>(&self, requests: Vec<Pending<T>>) -> DispatchResult<Vec<T>> {
        let expected = requests.len();
        let mut replies = Vec::with_capacity(expected);

        let exchange = async {
            let mut pending = Vec::with_capacity(expected);
            for (shard, message, rx) in requests {
                shard.send(message).await?;
                pending.push((shard, rx));
            }
            for (shard, rx) in pending {
                let reply = rx
                    .await
                    .map_err(|_| DispatchError::ShardUnavailable(shard.address().clone()))?;
                replies.push(reply);
            }
            Ok::<(), DispatchError>(())
        };

        let outcome = timeout(self.config.shard_timeout(), exchange).await;
        match outcome {
            Ok(result) => result?,
            Err(_) => {
                let received = replies.len();
                warn!(expected, received, "timed out waiting for shard replies");
                return Err(DispatchError::ShardTimeout { expected, received });
            }
        }
        Ok(replies)
    }
}

fn spawn_shards(context: CollectionContext, wal: &SharedWal, config: &Config) -> DispatchResult<Vec<ShardHandle>> {
    Ok(context
        .split(config.shards_per_collection)?
        .into_iter()
        .enumerate()
        .map(|(shard, part)| ShardActor::spawn(part, shard, wal.clone(), config.mailbox_capacity))
        .collect())
}

fn execute_request(shard: &ShardHandle, node: Node, pipeline: &PipelineContext) -> Pending<ShardReply> {
    let (reply, rx) = oneshot::channel();
    let message = ShardMessage::Execute {
        node,
        pipeline: pipeline.clone(),
        reply,
    };
    (shard.clone(), message, rx)
}

fn fan_out(shards: &[ShardHandle], node: &Node, pipeline: &PipelineContext) -> Vec<Pending<ShardReply>> {
    shards
        .iter()
        .map(|shard| execute_request(shard, node.clone(), pipeline))
        .collect()
}

fn written_ids(outputs: Vec<(Address, ExecutionOutput)>) -> Vec<DocumentId> {
    outputs.into_iter().flat_map(|(_, output)| output.written).collect()
}

fn single(kind: &AggregateKind, value: Value) -> Cursor {
    let mut cursor = Cursor::new();
    cursor.push(SubCursor::new(Address::dispatcher(), vec![kind.result_document(value)]));
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tempfile::TempDir;

    fn config(temp_dir: &TempDir, shards: usize) -> Config {
        Config {
            shards_per_collection: shards,
            shard_timeout_ms: 200,
            wal_fsync: false,
            ..Config::with_data_dir(temp_dir.path())
        }
    }

    fn users() -> CollectionName {
        CollectionName::new("db", "users")
    }

    #[tokio::test]
    async fn test_idle_shard_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = Dispatcher::open(config(&temp_dir, 1)).await.unwrap();
        dispatcher
            .execute(Node::CreateCollection { collection: users() }, StorageParameters::new())
            .await
            .unwrap();

        let (sender, _idle) = mpsc::channel(4);
        dispatcher
            .collections
            .write()
            .await
            .get_mut(&users())
            .unwrap()
            .shards
            .push(ShardHandle::new(Address::new("idle"), sender));

        let err = dispatcher
            .execute(Node::find(users(), Expr::all()), StorageParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::ShardTimeout {
                expected: 2,
                received: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_stopped_shard_is_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = Dispatcher::open(config(&temp_dir, 1)).await.unwrap();
        dispatcher
            .execute(Node::CreateCollection { collection: users() }, StorageParameters::new())
            .await
            .unwrap();

        let (sender, receiver) = mpsc::channel(4);
        drop(receiver);
        dispatcher
            .collections
            .write()
            .await
            .get_mut(&users())
            .unwrap()
            .shards
            .push(ShardHandle::new(Address::new("gone"), sender));

        let err = dispatcher
            .execute(Node::find(users(), Expr::all()), StorageParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::ShardUnavailable(address) if address.as_str() == "gone"));
    }

    #[tokio::test]
    async fn test_ddl_validation_logs_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let dispatcher = Dispatcher::open(config(&temp_dir, 2)).await.unwrap();

        let err = dispatcher
            .execute(Node::DropCollection { collection: users() }, StorageParameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::CollectionNotFound(_)));

        dispatcher
            .execute(Node::CreateCollection { collection: users() }, StorageParameters::new())
            .await
            .unwrap();
        let err = dispatcher
            .execute(
                Node::DropIndex {
                    collection: users(),
                    name: "by_age".into(),
                },
                StorageParameters::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Index(IndexError::NotFound(_))));
        assert_eq!(dispatcher.last_lsn().unwrap(), 1);
    }
}
