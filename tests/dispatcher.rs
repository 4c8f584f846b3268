//! Dispatcher tests over several shards
//!
//! Every test opens a dispatcher on a fresh data directory, runs plans
//! through it, and where relevant reopens it to check recovery.

use collectiondb::config::Config;
use collectiondb::context::StorageParameters;
use collectiondb::cursor::Cursor;
use collectiondb::dispatcher::{DispatchError, Dispatcher, QueryResult};
use collectiondb::document::{DocumentId, SortKey};
use collectiondb::operators::{AggregateKind, ExecutorErrorCode, Limit};
use collectiondb::planner::{Node, Stage};
use collectiondb::predicate::{CompareOp, Expr};
use collectiondb::storage::{shard_for, CollectionName};
use serde_json::{json, Value};
use tempfile::TempDir;

fn config(temp_dir: &TempDir) -> Config {
    Config {
        shards_per_collection: 4,
        shard_timeout_ms: 2000,
        wal_fsync: false,
        ..Config::with_data_dir(temp_dir.path())
    }
}

fn users() -> CollectionName {
    CollectionName::new("app", "users")
}

async fn exec(dispatcher: &Dispatcher, node: Node) -> QueryResult {
    dispatcher.execute(node, StorageParameters::new()).await.unwrap()
}

fn cursor(result: QueryResult) -> Cursor {
    match result {
        QueryResult::Documents(cursor) => cursor,
        other => panic!("expected documents, got {:?}", other),
    }
}

fn written(result: QueryResult) -> Vec<DocumentId> {
    match result {
        QueryResult::Written(ids) => ids,
        other => panic!("expected written ids, got {:?}", other),
    }
}

fn ages(cursor: &Cursor) -> Vec<i64> {
    cursor
        .iter()
        .map(|doc| doc.get("age").and_then(Value::as_i64).unwrap())
        .collect()
}

/// Creates `users` with 40 documents, `age` 0..40
async fn seed(dispatcher: &Dispatcher) -> Vec<DocumentId> {
    exec(dispatcher, Node::CreateCollection { collection: users() }).await;
    let bodies = (0..40).map(|age| json!({ "age": age, "even": age % 2 == 0 })).collect();
    written(exec(dispatcher, Node::insert(users(), bodies).unwrap()).await)
}

#[tokio::test]
async fn test_insert_spreads_and_reads_merge() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    let ids = seed(&dispatcher).await;
    assert_eq!(ids.len(), 40);

    let all = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert_eq!(all.size(), 40);
    assert_eq!(all.sub_cursors().len(), 4);

    let older = cursor(
        dispatcher
            .execute(
                Node::find(users(), Expr::param("age", CompareOp::Gte, 1)),
                StorageParameters::new().with_parameter(1, json!(35)),
            )
            .await
            .unwrap(),
    );
    let mut found = ages(&older);
    found.sort();
    assert_eq!(found, vec![35, 36, 37, 38, 39]);
}

#[tokio::test]
async fn test_duplicate_id_rejected_across_shards() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    let ids = seed(&dispatcher).await;

    let existing = ids[5].to_hex();
    let node = Node::insert(
        users(),
        vec![json!({ "age": 100 }), json!({ "_id": existing, "age": 101 })],
    )
    .unwrap();
    let err = dispatcher.execute(node, StorageParameters::new()).await.unwrap_err();
    match err {
        DispatchError::Executor(e) => assert_eq!(e.code(), ExecutorErrorCode::DuplicateKey),
        other => panic!("unexpected error: {}", other),
    }

    let all = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert_eq!(all.size(), 40);
}

#[tokio::test]
async fn test_repeated_id_in_batch_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    exec(&dispatcher, Node::CreateCollection { collection: users() }).await;

    let a = DocumentId::from_parts(1, 0);
    let b = (1..)
        .map(|n| DocumentId::from_parts(1, n))
        .find(|id| shard_for(id, 4) != shard_for(&a, 4))
        .unwrap();
    let node = Node::insert(
        users(),
        vec![
            json!({ "_id": a.to_hex(), "age": 1 }),
            json!({ "_id": b.to_hex(), "age": 2 }),
            json!({ "_id": a.to_hex(), "age": 3 }),
        ],
    )
    .unwrap();
    let err = dispatcher.execute(node, StorageParameters::new()).await.unwrap_err();
    match err {
        DispatchError::Executor(e) => assert_eq!(e.code(), ExecutorErrorCode::DuplicateKey),
        other => panic!("unexpected error: {}", other),
    }

    let all = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert!(all.is_empty());
    assert_eq!(dispatcher.last_lsn().unwrap(), 1);
}

#[tokio::test]
async fn test_limit_follows_identifier_order() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    seed(&dispatcher).await;

    let first = cursor(
        exec(
            &dispatcher,
            Node::Match {
                collection: users(),
                predicate: Expr::all(),
                limit: Limit::limit(3),
            },
        )
        .await,
    );
    assert_eq!(ages(&first), vec![0, 1, 2]);

    let head = Node::Aggregate {
        collection: users(),
        stages: vec![Stage::Limit { limit: Limit::limit(4) }],
    };
    assert_eq!(ages(&cursor(exec(&dispatcher, head).await)), vec![0, 1, 2, 3]);

    let node = Node::Delete {
        collection: users(),
        predicate: Expr::all(),
        limit: Limit::limit(5),
    };
    assert_eq!(written(exec(&dispatcher, node).await).len(), 5);

    let remaining = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert_eq!(ages(&remaining), (5..40).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_drop_during_insert_reopens() {
    let temp_dir = TempDir::new().unwrap();
    {
        let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
        exec(&dispatcher, Node::CreateCollection { collection: users() }).await;

        let bodies = (0..20).map(|age| json!({ "age": age })).collect();
        let insert = dispatcher.execute(Node::insert(users(), bodies).unwrap(), StorageParameters::new());
        let drop = dispatcher.execute(Node::DropCollection { collection: users() }, StorageParameters::new());
        let (inserted, dropped) = tokio::join!(insert, drop);
        assert!(dropped.is_ok());
        if let Err(err) = inserted {
            assert!(matches!(err, DispatchError::CollectionNotFound(_)));
        }
    }

    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    assert!(dispatcher.collections().await.is_empty());
}

#[tokio::test]
async fn test_sorted_limited_pipeline_is_global() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    seed(&dispatcher).await;

    let node = Node::Aggregate {
        collection: users(),
        stages: vec![
            Stage::Match {
                predicate: Expr::eq("even", json!(true)),
            },
            Stage::Sort {
                keys: vec![SortKey::desc("age")],
            },
            Stage::Limit { limit: Limit::limit(3) },
        ],
    };
    let top = cursor(exec(&dispatcher, node).await);
    assert_eq!(ages(&top), vec![38, 36, 34]);
}

#[tokio::test]
async fn test_aggregate_partials_combine() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    seed(&dispatcher).await;

    let value = |kind: AggregateKind| Node::Aggregate {
        collection: users(),
        stages: vec![Stage::Group { aggregate: kind }],
    };

    let count = cursor(exec(&dispatcher, value(AggregateKind::Count)).await);
    assert_eq!(count.get(0).unwrap().get("count"), Some(&json!(40)));

    let sum = cursor(exec(&dispatcher, value(AggregateKind::Sum { field: "age".into() })).await);
    assert_eq!(sum.get(0).unwrap().get("sum"), Some(&json!(780)));

    let max = cursor(exec(&dispatcher, value(AggregateKind::Max { field: "age".into() })).await);
    assert_eq!(max.get(0).unwrap().get("max"), Some(&json!(39)));

    let limited = Node::Aggregate {
        collection: users(),
        stages: vec![
            Stage::Limit { limit: Limit::limit(7) },
            Stage::Group {
                aggregate: AggregateKind::Count,
            },
        ],
    };
    let limited = cursor(exec(&dispatcher, limited).await);
    assert_eq!(limited.get(0).unwrap().get("count"), Some(&json!(7)));
}

#[tokio::test]
async fn test_limited_delete_removes_exactly_limit() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    seed(&dispatcher).await;

    let node = Node::Delete {
        collection: users(),
        predicate: Expr::eq("even", json!(false)),
        limit: Limit::limit(5),
    };
    assert_eq!(written(exec(&dispatcher, node).await).len(), 5);

    let node = Node::Delete {
        collection: users(),
        predicate: Expr::lt("age", json!(10)),
        limit: Limit::unlimited(),
    };
    let removed = written(exec(&dispatcher, node).await);
    let remaining = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert_eq!(remaining.size() + removed.len(), 35);
}

#[tokio::test]
async fn test_reopen_recovers_documents_and_indexes() {
    let temp_dir = TempDir::new().unwrap();
    {
        let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
        seed(&dispatcher).await;
        exec(
            &dispatcher,
            Node::CreateIndex {
                collection: users(),
                name: "by_age".into(),
                field: "age".into(),
            },
        )
        .await;
        exec(
            &dispatcher,
            Node::Delete {
                collection: users(),
                predicate: Expr::gte("age", json!(30)),
                limit: Limit::unlimited(),
            },
        )
        .await;
    }

    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();
    assert_eq!(dispatcher.collections().await, vec![users()]);

    let all = cursor(exec(&dispatcher, Node::find(users(), Expr::all())).await);
    assert_eq!(all.size(), 30);

    let hit = cursor(exec(&dispatcher, Node::find(users(), Expr::eq("age", json!(12)))).await);
    assert_eq!(ages(&hit), vec![12]);

    let err = dispatcher
        .execute(
            Node::CreateIndex {
                collection: users(),
                name: "by_age".into(),
                field: "age".into(),
            },
            StorageParameters::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Index(_)));
}

#[tokio::test]
async fn test_unknown_collection() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::open(config(&temp_dir)).await.unwrap();

    let err = dispatcher
        .execute(Node::find(users(), Expr::all()), StorageParameters::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::CollectionNotFound(name) if name == users()));
}
