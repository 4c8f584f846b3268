//! Shard actors
//!
//! Each actor owns one shard's collection context and handles one message
//! at a time, so operator trees never contend for the store.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::context::{Address, PipelineContext};
use crate::index::IndexResult;
use crate::operators::{ExecutionOutput, ExecutorResult, QueryExecutor};
use crate::planner::{create_plan, Node};
use crate::storage::CollectionContext;
use crate::wal::SharedWal;

use super::errors::{DispatchError, DispatchResult};

/// One shard's answer to an execute request
#[derive(Debug)]
pub struct ShardReply {
    pub address: Address,
    pub result: ExecutorResult<ExecutionOutput>,
}

pub enum ShardMessage {
    /// Plan `node` against this shard and run it
    Execute {
        node: Node,
        pipeline: PipelineContext,
        reply: oneshot::Sender<ShardReply>,
    },
    CreateIndex {
        name: String,
        field: String,
        reply: oneshot::Sender<IndexResult<()>>,
    },
    DropIndex {
        name: String,
        reply: oneshot::Sender<IndexResult<()>>,
    },
}

/// Sending half of a shard mailbox
#[derive(Debug, Clone)]
pub struct ShardHandle {
    address: Address,
    sender: mpsc::Sender<ShardMessage>,
}

impl ShardHandle {
    pub(crate) fn new(address: Address, sender: mpsc::Sender<ShardMessage>) -> Self {
        Self { address, sender }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Queues `message`, waiting while the mailbox is full.
    pub async fn send(&self, message: ShardMessage) -> DispatchResult<()> {
        self.sender
            .send(message)
            .await
            .map_err(|_| DispatchError::ShardUnavailable(self.address.clone()))
    }
}

pub struct ShardActor {
    address: Address,
    context: CollectionContext,
    wal: SharedWal,
    mailbox: mpsc::Receiver<ShardMessage>,
}

impl ShardActor {
    /// Spawns the actor for `context` and returns its handle.
    ///
    /// The actor stops once every handle is dropped.
    pub fn spawn(
        context: CollectionContext,
        shard: usize,
        wal: SharedWal,
        mailbox_capacity: usize,
    ) -> ShardHandle {
        let address = Address::shard(context.name(), shard);
        let (sender, mailbox) = mpsc::channel(mailbox_capacity);
        let actor = ShardActor {
            address: address.clone(),
            context,
            wal,
            mailbox,
        };
        tokio::spawn(actor.run());
        ShardHandle::new(address, sender)
    }

    async fn run(mut self) {
        debug!(address = %self.address, documents = self.context.store().len(), "shard started");
        while let Some(message) = self.mailbox.recv().await {
            self.handle(message);
        }
        debug!(address = %self.address, "shard stopped");
    }

    fn handle(&mut self, message: ShardMessage) {
        match message {
            ShardMessage::Execute {
                node,
                pipeline,
                reply,
            } => {
                let result = self.execute(&node, &pipeline);
                if let Err(e) = &result {
                    if e.is_fatal() {
                        error!(address = %self.address, error = %e, "fatal execution error");
                    }
                }
                let _ = reply.send(ShardReply {
                    address: self.address.clone(),
                    result,
                });
            }
            ShardMessage::CreateIndex { name, field, reply } => {
                let _ = reply.send(self.context.create_index(&name, &field));
            }
            ShardMessage::DropIndex { name, reply } => {
                let _ = reply.send(self.context.drop_index(&name));
            }
        }
    }

    fn execute(&mut self, node: &Node, pipeline: &PipelineContext) -> ExecutorResult<ExecutionOutput> {
        let plan = create_plan(node, &self.context)?;
        QueryExecutor::new(&mut self.context, &mut self.wal).execute(plan, pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, DocumentId};
    use crate::predicate::Expr;
    use crate::storage::CollectionName;
    use crate::wal::WalWriter;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_actor_executes_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let wal = SharedWal::new(WalWriter::open(temp_dir.path(), false).unwrap());
        let name = CollectionName::new("db", "c");
        let handle = ShardActor::spawn(CollectionContext::new(name.clone()), 0, wal.clone(), 4);

        let (tx, rx) = oneshot::channel();
        let insert = Node::Insert {
            collection: name.clone(),
            documents: vec![Document::with_id(DocumentId::from_parts(1, 1), json!({"a": 1})).unwrap()],
        };
        handle
            .send(ShardMessage::Execute {
                node: insert,
                pipeline: PipelineContext::detached(),
                reply: tx,
            })
            .await
            .unwrap();

        let (tx2, rx2) = oneshot::channel();
        handle
            .send(ShardMessage::Execute {
                node: Node::find(name.clone(), Expr::all()),
                pipeline: PipelineContext::detached(),
                reply: tx2,
            })
            .await
            .unwrap();

        let written = rx.await.unwrap().result.unwrap().written;
        assert_eq!(written, vec![DocumentId::from_parts(1, 1)]);

        let reply = rx2.await.unwrap();
        assert_eq!(reply.address, Address::shard(&name, 0));
        assert_eq!(reply.result.unwrap().documents.len(), 1);
        assert_eq!(wal.last_lsn().unwrap(), 1);
    }
}
