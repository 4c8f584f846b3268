//! Pipeline (execution) context
//!
//! Per-query state: the session identifier, bound statement parameters, and
//! the address asynchronous results are delivered to. Created once per query
//! invocation by the caller; operators only borrow it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::CollectionName;

/// Placeholder identifier referenced by predicate operands
pub type ParameterId = u16;

/// Identifier of one query invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Address of an actor that produces or receives results
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Address of the coordinating dispatcher
    pub fn dispatcher() -> Self {
        Self::new("dispatcher")
    }

    /// Address of one shard of a collection (`db.collection#n`)
    pub fn shard(collection: &CollectionName, shard: usize) -> Self {
        Self(format!("{}#{}", collection, shard))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bound statement parameters keyed by placeholder id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageParameters {
    values: BTreeMap<ParameterId, Value>,
}

impl StorageParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds (or rebinds) a parameter value
    pub fn add_parameter(&mut self, id: ParameterId, value: Value) {
        self.values.insert(id, value);
    }

    pub fn with_parameter(mut self, id: ParameterId, value: Value) -> Self {
        self.add_parameter(id, value);
        self
    }

    pub fn get(&self, id: ParameterId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-query execution context
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub session: SessionId,
    pub parameters: StorageParameters,
    /// Where results of this execution are sent
    pub address: Address,
}

impl PipelineContext {
    pub fn new(session: SessionId, address: Address, parameters: StorageParameters) -> Self {
        Self {
            session,
            parameters,
            address,
        }
    }

    /// Context with a fresh session, no parameters, replying to the dispatcher
    pub fn detached() -> Self {
        Self::new(SessionId::new(), Address::dispatcher(), StorageParameters::new())
    }

    pub fn with_parameters(parameters: StorageParameters) -> Self {
        Self::new(SessionId::new(), Address::dispatcher(), parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parameters_bind_and_rebind() {
        let mut params = StorageParameters::new().with_parameter(1, json!(10));
        assert_eq!(params.get(1), Some(&json!(10)));
        params.add_parameter(1, json!("x"));
        assert_eq!(params.get(1), Some(&json!("x")));
        assert_eq!(params.get(2), None);
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_shard_address_format() {
        let name = CollectionName::new("db", "users");
        assert_eq!(Address::shard(&name, 3).as_str(), "db.users#3");
    }

    #[test]
    fn test_sessions_are_distinct() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
