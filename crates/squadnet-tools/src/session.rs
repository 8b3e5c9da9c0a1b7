//! Tool-server sessions
//!
//! A session is one long-lived connection to an out-of-process tool
//! server speaking newline-delimited JSON-RPC over stdio. The trait is
//! the seam where tests inject scripted servers.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use squadnet_core::ToolServerSpec;

use crate::descriptor::ToolDescriptor;
use crate::error::{Result, ToolError};

/// One request/response session with a tool server
#[async_trait]
pub trait ToolServerSession: Send + Sync {
    /// Name of the server this session talks to
    fn server_name(&self) -> &str;

    /// Perform the protocol handshake
    async fn initialize(&self) -> Result<()>;

    /// Enumerate the server's tools
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool and return its raw text output
    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<String>;

    /// Close the session; must be idempotent
    async fn close(&self) -> Result<()>;
}

enum RpcFailure {
    /// Connection-level problem: broken pipe, malformed traffic, EOF
    Transport(String),
    /// The server answered with a JSON-RPC error object
    Remote(String),
}

struct SessionIo {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
}

/// Stdio JSON-RPC session to a spawned tool-server process
///
/// One RPC is in flight at a time; callers queue on the session mutex.
pub struct StdioToolSession {
    server_name: String,
    io: Mutex<Option<SessionIo>>,
}

impl StdioToolSession {
    /// Spawn the server process described by `spec` and wire up stdio
    pub fn spawn(spec: &ToolServerSpec) -> Result<Self> {
        let mut child = Command::new(&spec.command)
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::connect(&spec.name, e.to_string()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::connect(&spec.name, "failed to capture stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::connect(&spec.name, "failed to capture stdout"))?;

        tracing::info!(server = %spec.name, command = %spec.command, "spawned tool server");

        Ok(Self {
            server_name: spec.name.clone(),
            io: Mutex::new(Some(SessionIo {
                child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 0,
            })),
        })
    }

    async fn rpc(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| RpcFailure::Transport("session is closed".to_string()))?;

        io.next_id += 1;
        let id = io.next_id;

        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        let mut line =
            serde_json::to_string(&request).map_err(|e| RpcFailure::Transport(e.to_string()))?;
        line.push('\n');

        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        io.stdin
            .flush()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;

        // Skip notifications and stale traffic until our id answers
        loop {
            let line = io
                .stdout
                .next_line()
                .await
                .map_err(|e| RpcFailure::Transport(e.to_string()))?
                .ok_or_else(|| RpcFailure::Transport("server closed its stdout".to_string()))?;

            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line)
                .map_err(|e| RpcFailure::Transport(format!("malformed response: {e}")))?;

            if value.get("id").and_then(Value::as_u64) != Some(id) {
                continue;
            }

            if let Some(error) = value.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown server error");
                return Err(RpcFailure::Remote(message.to_string()));
            }

            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    async fn notify(&self, method: &str) -> std::result::Result<(), RpcFailure> {
        let mut guard = self.io.lock().await;
        let io = guard
            .as_mut()
            .ok_or_else(|| RpcFailure::Transport("session is closed".to_string()))?;

        let mut line = json!({"jsonrpc": "2.0", "method": method}).to_string();
        line.push('\n');
        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))?;
        io.stdin
            .flush()
            .await
            .map_err(|e| RpcFailure::Transport(e.to_string()))
    }
}

#[async_trait]
impl ToolServerSession for StdioToolSession {
    fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "squadnet",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        self.rpc("initialize", params).await.map_err(|failure| {
            ToolError::connect(&self.server_name, failure_message(failure))
        })?;

        self.notify("notifications/initialized")
            .await
            .map_err(|failure| ToolError::connect(&self.server_name, failure_message(failure)))?;

        tracing::debug!(server = %self.server_name, "session initialized");
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let result = self.rpc("tools/list", json!({})).await.map_err(|failure| {
            ToolError::Discovery {
                server: self.server_name.clone(),
                message: failure_message(failure),
            }
        })?;

        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::Discovery {
                server: self.server_name.clone(),
                message: "response is missing the tools array".to_string(),
            })?;

        let mut descriptors = Vec::with_capacity(tools.len());
        for tool in tools {
            let name = tool
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::Discovery {
                    server: self.server_name.clone(),
                    message: "tool entry is missing a name".to_string(),
                })?;
            let description = tool
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let input_schema = tool
                .get("inputSchema")
                .or_else(|| tool.get("input_schema"))
                .cloned()
                .unwrap_or_else(|| json!({"type": "object"}));

            descriptors.push(ToolDescriptor::new(
                name,
                &self.server_name,
                description,
                input_schema,
            ));
        }

        Ok(descriptors)
    }

    async fn call_tool(&self, tool: &str, arguments: Value) -> Result<String> {
        let params = json!({"name": tool, "arguments": arguments});

        let result = self.rpc("tools/call", params).await.map_err(|failure| {
            ToolError::execution(tool, &self.server_name, failure_message(failure))
        })?;

        let content = result
            .get("content")
            .and_then(Value::as_array)
            .map(|blocks| {
                blocks
                    .iter()
                    .filter_map(|block| block.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_else(|| result.to_string());

        if result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Err(ToolError::execution(tool, &self.server_name, content));
        }

        Ok(content)
    }

    async fn close(&self) -> Result<()> {
        let mut guard = self.io.lock().await;
        if let Some(mut io) = guard.take() {
            drop(io.stdin);
            if let Err(e) = io.child.kill().await {
                tracing::warn!(server = %self.server_name, error = %e, "failed to kill tool server");
            }
            tracing::info!(server = %self.server_name, "closed tool server session");
        }
        Ok(())
    }
}

fn failure_message(failure: RpcFailure) -> String {
    match failure {
        RpcFailure::Transport(message) | RpcFailure::Remote(message) => message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_session(responses: &str) -> StdioToolSession {
        // A fake server: cat-like shell that replays canned responses
        // regardless of what is asked
        StdioToolSession::spawn(&ToolServerSpec {
            name: "fake".to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), format!("cat >/dev/null & printf '%s' '{responses}'")],
            env: Default::default(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_rpc_round_trip_with_scripted_server() {
        let session = script_session(
            r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[{"name":"search_airports","description":"find airports","inputSchema":{"type":"object"}}]}}
"#,
        );

        let tools = session.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search_airports");
        assert_eq!(tools[0].server, "fake");

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_rpc_skips_notifications() {
        let session = script_session(
            r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}
{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"[{\"code\":\"SFO\"}]"}]}}
"#,
        );

        let output = session
            .call_tool("search_airports", json!({"query": "San Francisco"}))
            .await
            .unwrap();
        assert_eq!(output, "[{\"code\":\"SFO\"}]");

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_structured_error_surfaces_as_execution_error() {
        let session = script_session(
            r#"{"jsonrpc":"2.0","id":1,"result":{"isError":true,"content":[{"type":"text","text":"no such airport"}]}}
"#,
        );

        let err = session.call_tool("search_airports", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
        assert!(err.to_string().contains("no such airport"));

        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_eof_is_transport_failure() {
        let session = script_session("");
        let err = session.call_tool("anything", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let session = script_session("");
        session.close().await.unwrap();
        session.close().await.unwrap();

        // calls after close fail cleanly
        let err = session.call_tool("t", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }
}
