//! JSON line I/O for the CLI
//!
//! - Input: one JSON object per stdin line; blank lines are skipped
//! - Output: one JSON object per stdout line
//! - UTF-8 only

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use serde::Deserialize;
use serde_json::Value;

use crate::context::{ParameterId, StorageParameters};
use crate::planner::Node;

use super::errors::CliResult;

/// One `query` input line
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub plan: Node,
    /// Values for `$n` parameters, keyed by parameter id
    #[serde(default)]
    pub parameters: BTreeMap<ParameterId, Value>,
}

impl QueryRequest {
    pub fn storage_parameters(&self) -> StorageParameters {
        let mut parameters = StorageParameters::new();
        for (id, value) in &self.parameters {
            parameters.add_parameter(*id, value.clone());
        }
        parameters
    }
}

/// Reads non-empty lines from `input`
pub fn read_lines<R: BufRead>(input: R) -> impl Iterator<Item = CliResult<String>> {
    input.lines().filter_map(|line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(Ok(line)),
        Err(e) => Some(Err(e.into())),
    })
}

/// Parses one request line
pub fn parse_request(line: &str) -> CliResult<QueryRequest> {
    Ok(serde_json::from_str(line)?)
}

/// Write one JSON line to stdout
pub fn write_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "ok",
        "data": data
    }))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_json(&serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_with_parameters() {
        let line = json!({
            "plan": {
                "node": "match",
                "collection": { "database": "db", "collection": "users" },
                "predicate": { "kind": "compare", "field": "age", "op": "gt", "operand": { "parameter": 1 } }
            },
            "parameters": { "1": 30 }
        })
        .to_string();

        let request = parse_request(&line).unwrap();
        assert!(matches!(request.plan, Node::Match { .. }));
        assert_eq!(request.storage_parameters().get(1), Some(&json!(30)));
    }

    #[test]
    fn test_read_lines_skips_blank() {
        let input = "{}\n\n   \n{}\n".as_bytes();
        let lines: Vec<_> = read_lines(input).collect::<CliResult<_>>().unwrap();
        assert_eq!(lines.len(), 2);
    }
}
