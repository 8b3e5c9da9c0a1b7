//! Tool client pool
//!
//! Owns one session per tool server, drives discovery into the shared
//! registry, and guards every call with the server's circuit breaker
//! and a per-call timeout. Sessions close in reverse registration
//! order on shutdown.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use squadnet_core::{BreakerPolicy, ToolServerSpec};
use squadnet_resilience::{BreakerManager, BreakerStats};
use squadnet_telemetry::{NetEvent, Outcome, TelemetryCollector};

use crate::error::{Result, ToolError};
use crate::registry::ToolRegistry;
use crate::session::{StdioToolSession, ToolServerSession};

/// Default timeout for spawning and connecting to a server
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for the protocol handshake
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Federation of connected tool servers
pub struct ToolClientPool {
    sessions: Mutex<HashMap<String, Arc<dyn ToolServerSession>>>,
    order: Mutex<Vec<String>>,
    registry: Arc<ToolRegistry>,
    breakers: BreakerManager,
    collector: Option<TelemetryCollector>,
    connect_timeout: Duration,
    init_timeout: Duration,
}

impl ToolClientPool {
    pub fn new(breaker_policy: BreakerPolicy) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            order: Mutex::new(Vec::new()),
            registry: Arc::new(ToolRegistry::new()),
            breakers: BreakerManager::new(breaker_policy),
            collector: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    /// Attach a telemetry collector for connect/call/breaker events
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.breakers = self.breakers.with_events(collector.clone());
        self.collector = Some(collector);
        self
    }

    /// Override the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Override the handshake timeout
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// The shared tool registry
    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    /// Spawn and install the server described by `spec`
    pub async fn connect_server(&self, spec: &ToolServerSpec) -> Result<usize> {
        let session = tokio::time::timeout(self.connect_timeout, async {
            StdioToolSession::spawn(spec)
        })
        .await
        .map_err(|_| ToolError::connect(&spec.name, "connect timeout elapsed"))??;

        self.install_session(Arc::new(session)).await
    }

    /// Install an already-constructed session (tests inject mocks here)
    ///
    /// Runs the handshake and discovery; on any failure the session is
    /// closed and partially registered tools are rolled back.
    pub async fn install_session(&self, session: Arc<dyn ToolServerSession>) -> Result<usize> {
        let server = session.server_name().to_string();

        {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            if sessions.contains_key(&server) {
                return Err(ToolError::connect(&server, "server is already connected"));
            }
        }

        if let Err(err) = tokio::time::timeout(self.init_timeout, session.initialize())
            .await
            .map_err(|_| ToolError::connect(&server, "initialize timeout elapsed"))
            .and_then(|r| r)
        {
            let _ = session.close().await;
            return Err(err);
        }

        let tools = match session.list_tools().await {
            Ok(tools) => tools,
            Err(err) => {
                let _ = session.close().await;
                return Err(err);
            }
        };

        let mut installed = 0;
        for descriptor in tools {
            if self.registry.register(descriptor) {
                installed += 1;
            }
        }

        {
            let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.insert(server.clone(), session);
        }
        self.order
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(server.clone());

        tracing::info!(server = %server, tools = installed, "connected tool server");
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::server_connected(&server, installed));
        }

        Ok(installed)
    }

    /// Invoke a tool through its server's breaker with a call timeout
    ///
    /// `caller` attributes the call in telemetry. The pool applies no
    /// retries of its own; compose the retry engine around this call.
    pub async fn call_tool(
        &self,
        caller: &str,
        tool_name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<String> {
        let descriptor = self.registry.lookup(tool_name).ok_or_else(|| {
            ToolError::NotFound {
                tool: tool_name.to_string(),
            }
        })?;
        let server = descriptor.server;

        let breaker = self.breakers.get(&server);
        breaker.admit().map_err(ToolError::from)?;

        let session = {
            let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
            sessions.get(&server).cloned()
        }
        .ok_or_else(|| {
            // registry said yes but the session is gone; treat as a
            // server failure so the breaker notices
            breaker.record_failure();
            ToolError::execution(tool_name, &server, "no live session for server")
        })?;

        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::tool_call_started(caller, tool_name, &server));
        }
        let started = Instant::now();

        let result = tokio::time::timeout(timeout, session.call_tool(tool_name, arguments)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (outcome, result) = match result {
            Ok(Ok(output)) => {
                breaker.record_success();
                (Outcome::Ok, Ok(output))
            }
            Ok(Err(err)) => {
                breaker.record_failure();
                (Outcome::Error, Err(err))
            }
            Err(_) => {
                breaker.record_failure();
                (
                    Outcome::Timeout,
                    Err(ToolError::Timeout {
                        tool: tool_name.to_string(),
                        server: server.clone(),
                        timeout_secs: timeout.as_secs(),
                    }),
                )
            }
        };

        tracing::info!(
            caller,
            tool_name,
            server_name = %server,
            duration_ms,
            outcome = ?outcome,
            "tool call finished"
        );
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::tool_call_completed(
                caller, tool_name, &server, outcome, duration_ms,
            ));
        }

        result
    }

    /// Names of connected servers, in registration order
    pub fn server_names(&self) -> Vec<String> {
        self.order.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Breaker statistics per server
    pub fn breaker_stats(&self) -> HashMap<String, BreakerStats> {
        self.breakers.stats_all()
    }

    /// Close every session in reverse registration order
    ///
    /// Idempotent: a second shutdown finds nothing to close.
    pub async fn shutdown(&self) {
        let order: Vec<String> = {
            let mut order = self.order.lock().unwrap_or_else(|e| e.into_inner());
            order.drain(..).rev().collect()
        };

        for server in order {
            let session = {
                let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
                sessions.remove(&server)
            };
            if let Some(session) = session {
                if let Err(err) = session.close().await {
                    tracing::warn!(server = %server, error = %err, "error closing session");
                }
            }
        }

        self.registry.clear();
        tracing::info!("tool client pool shut down");
    }
}
