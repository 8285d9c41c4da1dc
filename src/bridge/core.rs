//! Bridge coordinator and event loop.
//!
//! A [`Bridge`] owns one spawned event loop. The loop owns the connection
//! supervisor, the codec and the bootstrap gate, and processes session
//! events, outbound calls and commands one at a time, in delivery order.
//!
//! # Example
//!
//! ```no_run
//! use qz_bridge::{Argument, Bridge, Continuation, Result};
//!
//! # async fn example() -> Result<()> {
//! let bridge = Bridge::builder()
//!     .certificate("-----BEGIN CERTIFICATE-----...")
//!     .connect()?;
//!
//! bridge.wait_ready().await?;
//!
//! let remote = bridge.remote();
//! println!("daemon version: {:?}", remote.cached("getVersion"));
//!
//! remote.call(
//!     "findPrinter",
//!     vec![
//!         Argument::value("zebra"),
//!         Continuation::named("found", |payload| {
//!             println!("found {:?}", payload.first());
//!             Ok(())
//!         })
//!         .into(),
//!     ],
//! )?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CallbackName, SessionId};
use crate::protocol::{
    Inbound, MessageCodec, MethodDescriptor, OutboundRequest, Payload, Response, Signing,
};
use crate::remote::surface::{invoke, panic_message};
use crate::remote::{BootstrapGate, Callback, Namespace, Remote};
use crate::transport::{ConnectionSupervisor, Connector, SessionEventRx, Transition};

use super::builder::BridgeBuilder;
use super::collaborators::Collaborators;
use super::options::BridgeOptions;

// ============================================================================
// Types
// ============================================================================

/// Receives [`BridgeEvent`]s from the event loop.
pub type EventHandler = Arc<dyn Fn(BridgeEvent) + Send + Sync>;

/// Connection status, observable through [`Bridge::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Candidates are being dialled.
    Connecting,
    /// A session is open; the surface is bootstrapping.
    Open,
    /// Every preemptive result is cached.
    Ready,
    /// No candidate could be reached.
    NoConnection {
        /// Candidates attempted.
        attempts: usize,
    },
    /// The open session closed.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The open session failed.
    Failed {
        /// Error description.
        reason: String,
    },
    /// The bridge was shut down.
    Shutdown,
}

impl ConnectionStatus {
    /// Returns `true` while a connection attempt or bootstrap is under way.
    #[inline]
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

/// Notification delivered to the event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The surface is bootstrapped.
    Ready,
    /// The open session closed.
    Closed {
        /// Close reason.
        reason: String,
    },
    /// The open session failed, or a collaborator failed.
    Error {
        /// Error description.
        reason: String,
    },
    /// No candidate could be reached; the fallback launcher was called.
    NoConnection {
        /// Candidates attempted.
        attempts: usize,
    },
    /// An inbound message was rejected.
    ProtocolError {
        /// Error description.
        message: String,
    },
}

/// Commands from the [`Bridge`] handle.
#[derive(Debug)]
enum Command {
    Reconnect,
    Shutdown,
}

/// Results of collaborator tasks spawned by the loop.
#[derive(Debug)]
enum TaskResult {
    Certificate {
        session: SessionId,
        result: Result<String>,
    },
    Signed {
        session: SessionId,
        payload: String,
        result: Result<String>,
    },
}

// ============================================================================
// Bridge
// ============================================================================

/// Client bridge to the print daemon.
///
/// Dropping the bridge shuts the event loop down and closes the session.
pub struct Bridge {
    remote: Remote,
    namespace: Arc<Mutex<Namespace>>,
    status: watch::Receiver<ConnectionStatus>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Spawns the event loop and starts dialling.
    ///
    /// Must be called from within a Tokio runtime.
    pub(crate) fn spawn(
        options: &BridgeOptions,
        collaborators: Collaborators,
        connector: Arc<dyn Connector>,
        handler: Option<EventHandler>,
    ) -> Self {
        let namespace = Arc::new(Mutex::new(Namespace::new(options.call_policy())));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);

        let supervisor = ConnectionSupervisor::new(
            options.selector(),
            connector,
            options.keep_alive(),
            session_tx,
        );

        let event_loop = EventLoop {
            supervisor,
            codec: options.codec(),
            namespace: Arc::clone(&namespace),
            gate: BootstrapGate::new(Vec::<String>::new()),
            collaborators,
            status: status_tx,
            handler,
            task_tx,
        };

        let task = tokio::spawn(event_loop.run(session_rx, outbound_rx, command_rx, task_rx));

        info!(host = %options.host, ports = ?options.ports, "Bridge started");

        Self {
            remote: Remote::new(Arc::clone(&namespace), outbound_tx),
            namespace,
            status: status_rx,
            commands: command_tx,
            task,
        }
    }

    /// Handle for calling remote operations.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> Remote {
        self.remote.clone()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Receiver following status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Waits until the surface is ready.
    ///
    /// # Errors
    ///
    /// - [`Error::NoConnection`] if no candidate answered
    /// - [`Error::Connection`] if the session failed
    /// - [`Error::ConnectionClosed`] if the session closed or the bridge shut
    ///   down first
    pub async fn wait_ready(&self) -> Result<()> {
        let mut status = self.status.clone();
        let status = status
            .wait_for(|s| !s.is_pending())
            .await
            .map_err(|_| Error::ConnectionClosed)?
            .clone();

        match status {
            ConnectionStatus::Ready => Ok(()),
            ConnectionStatus::NoConnection { attempts } => Err(Error::no_connection(attempts)),
            ConnectionStatus::Failed { reason } => Err(Error::connection(reason)),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Registers a page-level callback, looked up when the surface has no
    /// callback of that name. Survives reconnects.
    pub fn register_global<F>(&self, name: impl Into<CallbackName>, callback: F)
    where
        F: Fn(&Payload) -> Result<()> + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        self.namespace.lock().register_global(name.into(), callback);
    }

    /// Removes a page-level callback.
    pub fn remove_global(&self, name: impl Into<CallbackName>) -> bool {
        self.namespace.lock().remove_global(&name.into())
    }

    /// Starts a fresh scan after the connection ended or was never made.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionClosed`] if the bridge has shut down.
    pub fn reconnect(&self) -> Result<()> {
        self.commands
            .send(Command::Reconnect)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the session and stops the event loop.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        let mut status = self.status.clone();
        let _ = status
            .wait_for(|s| *s == ConnectionStatus::Shutdown)
            .await;
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.commands.send(Command::Shutdown).is_err() {
            self.task.abort();
        }
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// State owned by the bridge task.
struct EventLoop {
    supervisor: ConnectionSupervisor,
    codec: MessageCodec,
    namespace: Arc<Mutex<Namespace>>,
    gate: BootstrapGate,
    collaborators: Collaborators,
    status: watch::Sender<ConnectionStatus>,
    handler: Option<EventHandler>,
    task_tx: mpsc::UnboundedSender<TaskResult>,
}

impl EventLoop {
    async fn run(
        mut self,
        mut session_rx: SessionEventRx,
        mut outbound_rx: mpsc::UnboundedReceiver<OutboundRequest>,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut task_rx: mpsc::UnboundedReceiver<TaskResult>,
    ) {
        let transition = self.supervisor.start();
        self.apply(transition);

        loop {
            tokio::select! {
                Some((id, event)) = session_rx.recv() => {
                    let transition = self.supervisor.on_event(id, event);
                    self.apply(transition);
                }

                Some(request) = outbound_rx.recv() => {
                    self.dispatch(request);
                }

                Some(result) = task_rx.recv() => {
                    self.on_task_result(result);
                }

                command = command_rx.recv() => {
                    match command {
                        Some(Command::Reconnect) => self.reconnect(),
                        Some(Command::Shutdown) | None => break,
                    }
                }
            }
        }

        self.supervisor.shutdown().await;
        self.namespace.lock().reset();
        self.status.send_replace(ConnectionStatus::Shutdown);
        debug!("Bridge event loop terminated");
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Connecting { url } | Transition::Retrying { url } => {
                debug!(%url, "Connecting");
                self.status.send_replace(ConnectionStatus::Connecting);
            }

            Transition::Opened { url } => {
                debug!(%url, "Session open, requesting manifest");
                self.namespace.lock().reset();
                self.gate = BootstrapGate::new(Vec::<String>::new());
                self.status.send_replace(ConnectionStatus::Open);
                self.request_certificate();
            }

            Transition::Received(text) => self.on_message(&text),

            Transition::Exhausted { attempts } => {
                warn!(attempts, "No print daemon found");
                self.collaborators.fallback.launch();
                self.status
                    .send_replace(ConnectionStatus::NoConnection { attempts });
                self.emit(BridgeEvent::NoConnection { attempts });
            }

            Transition::Closed { reason } => {
                self.namespace.lock().reset();
                self.status.send_replace(ConnectionStatus::Closed {
                    reason: reason.clone(),
                });
                self.emit(BridgeEvent::Closed { reason });
            }

            Transition::Failed { reason } => {
                self.namespace.lock().reset();
                self.status.send_replace(ConnectionStatus::Failed {
                    reason: reason.clone(),
                });
                self.emit(BridgeEvent::Error { reason });
            }

            Transition::Stale => {}
        }
    }

    fn reconnect(&mut self) {
        if !self.supervisor.state().is_terminal() {
            debug!(state = ?self.supervisor.state(), "Reconnect ignored, connection still live");
            return;
        }

        info!("Redeploying bridge");
        self.namespace.lock().reset();
        let transition = self.supervisor.restart();
        self.apply(transition);
    }

    // ------------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------------

    fn on_message(&mut self, text: &str) {
        trace!(len = text.len(), "Message received");

        let inbound = match self.codec.decode(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Dropping inbound message");
                self.emit(BridgeEvent::ProtocolError {
                    message: e.to_string(),
                });
                return;
            }
        };

        match inbound {
            Inbound::Manifest(methods) => self.install(methods),
            Inbound::Response(response) => self.on_response(response),
        }
    }

    fn install(&mut self, methods: Vec<MethodDescriptor>) {
        let primes = self.namespace.lock().install(methods);

        let primes = match primes {
            Ok(primes) => primes,
            Err(e) => {
                warn!(error = %e, "Manifest rejected");
                self.emit(BridgeEvent::ProtocolError {
                    message: e.to_string(),
                });
                return;
            }
        };

        self.gate = BootstrapGate::new(primes.iter().map(|r| r.method.clone()));
        if self.gate.arm() {
            self.signal_ready();
        }

        for request in primes {
            self.dispatch(request);
        }
    }

    fn on_response(&mut self, response: Response) {
        if response.bootstrap {
            let Some(method) = response.method else {
                warn!("Bootstrap result without a method name");
                return;
            };

            self.namespace
                .lock()
                .cache(&method, response.payload.into_value());

            if self.gate.complete(&method) {
                self.signal_ready();
            }
            return;
        }

        let Some(name) = response.callback else {
            trace!(method = ?response.method, "Response without callback");
            return;
        };

        // Looked up under the lock, invoked without it so the callback can
        // call back into the surface.
        let callback = self.namespace.lock().lookup_callback(&name);
        let Some(callback) = callback else {
            warn!(callback = %name, "No callback registered");
            return;
        };

        let payload = match (response.init, response.method) {
            (true, Some(method)) => Payload::Args(vec![Value::String(method)]),
            (_, _) => response.payload,
        };

        if let Err(e) = invoke(&name, &callback, &payload) {
            error!(error = %e, "Callback failed");
        }
    }

    fn signal_ready(&mut self) {
        info!("Remote surface ready");
        self.status.send_replace(ConnectionStatus::Ready);
        self.emit(BridgeEvent::Ready);
    }

    // ------------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------------

    fn dispatch(&mut self, request: OutboundRequest) {
        let encoded = match self.codec.encode(&request) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(method = %request.method, error = %e, "Failed to encode request");
                return;
            }
        };

        match encoded.signing {
            Signing::Unsigned => self.transmit(encoded.payload),
            Signing::Required => self.request_signature(encoded.payload),
        }
    }

    fn transmit(&mut self, text: String) {
        trace!(len = text.len(), "Sending message");
        if let Err(e) = self.supervisor.send(text) {
            warn!(error = %e, "Message not sent");
        }
    }

    fn request_signature(&self, payload: String) {
        let Some(session) = self.supervisor.session_id() else {
            warn!("Message not sent, no session");
            return;
        };

        let signer = Arc::clone(&self.collaborators.signer);
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = signer.sign(&payload).await;
            let _ = task_tx.send(TaskResult::Signed {
                session,
                payload,
                result,
            });
        });
    }

    fn request_certificate(&self) {
        let Some(session) = self.supervisor.session_id() else {
            return;
        };

        let supplier = Arc::clone(&self.collaborators.certificate);
        let task_tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = supplier.certificate().await;
            let _ = task_tx.send(TaskResult::Certificate { session, result });
        });
    }

    fn on_task_result(&mut self, result: TaskResult) {
        let current = self.supervisor.session_id();

        match result {
            TaskResult::Certificate { session, result } => {
                if current != Some(session) {
                    trace!(%session, "Certificate for stale session");
                    return;
                }

                let certificate = result.unwrap_or_else(|e| {
                    warn!(error = %e, "Certificate unavailable, sending none");
                    self.emit(BridgeEvent::Error {
                        reason: Error::certificate(e.to_string()).to_string(),
                    });
                    String::new()
                });

                let request = OutboundRequest::manifest(self.codec.manifest_method(), certificate);
                self.dispatch(request);
            }

            TaskResult::Signed {
                session,
                payload,
                result,
            } => {
                if current != Some(session) {
                    trace!(%session, "Signature for stale session");
                    return;
                }

                match result {
                    Ok(signature) => self.transmit(signature + &payload),
                    Err(e) => {
                        warn!(error = %e, "Signing failed, message dropped");
                        self.emit(BridgeEvent::Error {
                            reason: Error::signing(e.to_string()).to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Runs the event handler. A panicking handler is logged and the loop
    /// carries on.
    fn emit(&self, event: BridgeEvent) {
        let Some(handler) = &self.handler else {
            return;
        };

        if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
            error!(panic = %panic_message(&*panic), "Event handler panicked");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::time::timeout;

    use crate::bridge::Signer;
    use crate::remote::{Argument, CallOutcome, Continuation};
    use crate::transport::testing::{ScriptedConnector, ServerSide};

    const URL: &str = "ws://localhost:8182";
    const WAIT: Duration = Duration::from_secs(5);

    fn builder(connector: Arc<ScriptedConnector>) -> BridgeBuilder {
        Bridge::builder()
            .options(BridgeOptions::new().with_preemptive(["getVersion", "isActive"]))
            .certificate("CERT")
            .connector(connector)
    }

    fn manifest() -> Value {
        json!({
            "method": "listMessages",
            "result": [
                {"name": "foo", "parameters": 1, "returns": "void"},
                {"name": "findPrinter", "parameters": 1, "returns": "void"},
                {"name": "getVersion", "parameters": 0, "returns": "String"},
                {"name": "isActive", "parameters": 0, "returns": "boolean"},
            ]
        })
    }

    /// Runs the daemon side of the bootstrap exchange.
    async fn bootstrap(server: &mut ServerSide) {
        bootstrap_with(server, manifest()).await;
    }

    async fn bootstrap_with(server: &mut ServerSide, manifest: Value) {
        let request = server.recv_json().await.expect("manifest request");
        assert_eq!(request["method"], "listMessages");
        assert_eq!(request["params"], json!(["CERT"]));

        server.send_json(manifest).await;

        for _ in 0..2 {
            let request = server.recv_json().await.expect("preemptive request");
            assert_eq!(request["callback"], "setupMethods");
            assert_eq!(request["init"], true);

            let result = match request["method"].as_str() {
                Some("getVersion") => "2.0.1",
                _ => "true",
            };
            server
                .send_json(json!({
                    "method": request["method"],
                    "callback": "setupMethods",
                    "init": true,
                    "result": result,
                }))
                .await;
        }
    }

    async fn ready_bridge() -> (Bridge, ServerSide) {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let bridge = builder(connector).connect().expect("connect");
        let mut server = servers.recv().await.expect("server");
        bootstrap(&mut server).await;

        timeout(WAIT, bridge.wait_ready())
            .await
            .expect("ready in time")
            .expect("ready");
        (bridge, server)
    }

    #[tokio::test]
    async fn test_wait_ready_pending_until_bootstrap_completes() {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let bridge = builder(connector).connect().expect("connect");
        let mut server = servers.recv().await.expect("server");

        let mut wait = tokio_test::task::spawn(bridge.wait_ready());
        tokio_test::assert_pending!(wait.poll());
        drop(wait);

        bootstrap(&mut server).await;
        tokio_test::assert_ok!(timeout(WAIT, bridge.wait_ready()).await.expect("in time"));
    }

    #[tokio::test]
    async fn test_bootstrap_caches_preemptive_results() {
        let (bridge, server) = ready_bridge().await;
        let remote = bridge.remote();

        assert_eq!(bridge.status(), ConnectionStatus::Ready);
        assert_eq!(remote.cached("getVersion"), Some(json!("2.0.1")));
        assert_eq!(remote.cached("isActive"), Some(json!(true)));
        assert_eq!(
            remote.call("getVersion", vec![]).expect("call"),
            CallOutcome::Cached(json!("2.0.1"))
        );
        assert_eq!(server.url, URL);
    }

    #[tokio::test]
    async fn test_manifest_builds_surface_and_is_not_forwarded() {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let bridge = builder(connector).connect().expect("connect");
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        bridge.register_global("spy", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let mut server = servers.recv().await.expect("server");
        let mut manifest = manifest();
        manifest["callback"] = json!("spy");
        bootstrap_with(&mut server, manifest).await;
        timeout(WAIT, bridge.wait_ready()).await.expect("in time").expect("ready");

        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let remote = bridge.remote();

        assert!(remote.has_callable("foo"));
        assert!(remote.has_callable("foo_1"));
        assert!(!remote.has_callable("foo_2"));
        assert!(!remote.has_callable("listMessages"));
        assert_eq!(
            remote.methods(),
            vec!["findPrinter", "foo", "getVersion", "isActive"]
        );
    }

    #[tokio::test]
    async fn test_call_round_trip() {
        let (bridge, mut server) = ready_bridge().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge
            .remote()
            .call(
                "foo",
                vec![
                    Argument::value("x"),
                    Continuation::named("fooDone", move |payload| {
                        let _ = tx.send(payload.clone());
                        Ok(())
                    })
                    .into(),
                ],
            )
            .expect("call");

        let request = server.recv_json().await.expect("request");
        assert_eq!(request["method"], "foo");
        assert_eq!(request["params"], json!(["x"]));
        assert_eq!(request["callback"], "fooDone");
        assert_eq!(request["init"], false);

        server
            .send_json(json!({"method": "foo", "callback": "fooDone", "result": "[1,2]"}))
            .await;

        let payload = timeout(WAIT, rx.recv()).await.expect("in time").expect("payload");
        assert_eq!(payload, Payload::Args(vec![json!(1), json!(2)]));
    }

    #[tokio::test]
    async fn test_mapped_callback_reaches_global() {
        let (bridge, mut server) = ready_bridge().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge.register_global("qzDoneFinding", move |payload| {
            let _ = tx.send(payload.first().cloned());
            Ok(())
        });

        bridge
            .remote()
            .call("findPrinter", vec![Argument::value("zebra")])
            .expect("call");

        let request = server.recv_json().await.expect("request");
        assert_eq!(request["callback"], "qzDoneFinding");

        server
            .send_json(json!({
                "method": "findPrinter",
                "callback": "qzDoneFinding",
                "result": "zebra",
            }))
            .await;

        let found = timeout(WAIT, rx.recv()).await.expect("in time").expect("payload");
        assert_eq!(found, Some(json!("zebra")));
    }

    #[tokio::test]
    async fn test_failing_callback_does_not_block_next_message() {
        let (bridge, mut server) = ready_bridge().await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge.register_global("boom", |_| panic!("callback exploded"));
        bridge.register_global("fails", |_| Err(Error::protocol("bad payload")));
        bridge.register_global("ok", move |_| {
            let _ = tx.send(());
            Ok(())
        });

        for callback in ["boom", "fails", "ok"] {
            server
                .send_json(json!({"method": "foo", "callback": callback, "result": "1"}))
                .await;
        }

        timeout(WAIT, rx.recv()).await.expect("in time").expect("delivered");
        assert_eq!(bridge.status(), ConnectionStatus::Ready);
    }

    #[tokio::test]
    async fn test_remote_error_is_reported() {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = builder(connector)
            .on_event(move |event| {
                let _ = tx.send(event);
            })
            .connect()
            .expect("connect");

        let mut server = servers.recv().await.expect("server");
        bootstrap(&mut server).await;
        assert_eq!(rx.recv().await, Some(BridgeEvent::Ready));

        server
            .send_json(json!({"callback": "qzDonePrinting", "error": "Printer offline"}))
            .await;

        let event = timeout(WAIT, rx.recv()).await.expect("in time");
        assert!(matches!(
            event,
            Some(BridgeEvent::ProtocolError { ref message }) if message.contains("Printer offline")
        ));
        drop(bridge);
    }

    #[tokio::test]
    async fn test_signed_requests_carry_prefix() {
        struct FixedSigner;

        #[async_trait]
        impl Signer for FixedSigner {
            async fn sign(&self, _payload: &str) -> Result<String> {
                Ok("SIG:".to_string())
            }
        }

        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let bridge = builder(connector).signer(FixedSigner).connect().expect("connect");
        let mut server = servers.recv().await.expect("server");
        bootstrap(&mut server).await;
        timeout(WAIT, bridge.wait_ready()).await.expect("in time").expect("ready");

        bridge
            .remote()
            .call("foo", vec![Argument::value(1)])
            .expect("call");

        let text = server.recv_text().await.expect("frame");
        assert!(text.starts_with("SIG:{"), "unexpected frame {text}");
        assert!(text.contains(r#""method":"foo""#));
    }

    #[tokio::test]
    async fn test_exhaustion_launches_fallback() {
        let launched = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&launched);
        let (connector, _servers) = ScriptedConnector::new(&[]);

        let bridge = Bridge::builder()
            .certificate("CERT")
            .connector(connector.clone())
            .fallback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .connect()
            .expect("connect");

        let err = timeout(WAIT, bridge.wait_ready()).await.expect("in time").unwrap_err();
        assert!(matches!(err, Error::NoConnection { attempts: 4 }));
        assert_eq!(launched.load(Ordering::SeqCst), 1);
        assert_eq!(
            connector.attempts(),
            vec![
                "ws://localhost:8182",
                "ws://localhost:8283",
                "ws://localhost:8384",
                "ws://localhost:8485",
            ]
        );

        bridge.reconnect().expect("reconnect");
        let mut status = bridge.subscribe();
        timeout(WAIT, status.wait_for(|_| connector.attempts().len() == 8))
            .await
            .expect("in time")
            .expect("status");
        timeout(WAIT, status.wait_for(|s| !s.is_pending()))
            .await
            .expect("in time")
            .expect("status");
        assert_eq!(launched.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_tears_down_surface() {
        let (bridge, server) = ready_bridge().await;
        let remote = bridge.remote();

        server.close().await;

        let mut status = bridge.subscribe();
        timeout(WAIT, status.wait_for(|s| matches!(s, ConnectionStatus::Closed { .. })))
            .await
            .expect("in time")
            .expect("status");

        assert!(!remote.is_installed());
        assert!(remote.cached("getVersion").is_none());
        assert!(matches!(
            remote.call("foo", vec![Argument::value(1)]),
            Err(Error::UnknownMethod { .. })
        ));
    }

    #[tokio::test]
    async fn test_error_after_open_fails_without_retry() {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let bridge = builder(connector.clone())
            .on_event(move |event| {
                let _ = tx.send(event);
            })
            .connect()
            .expect("connect");

        let mut server = servers.recv().await.expect("server");
        bootstrap(&mut server).await;
        assert_eq!(rx.recv().await, Some(BridgeEvent::Ready));
        let remote = bridge.remote();

        server.reset();

        let event = timeout(WAIT, rx.recv()).await.expect("in time");
        assert!(matches!(event, Some(BridgeEvent::Error { .. })));
        assert!(matches!(bridge.status(), ConnectionStatus::Failed { .. }));

        let err = bridge.wait_ready().await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!remote.is_installed());
        assert_eq!(connector.attempts(), vec![URL]);
    }

    #[tokio::test]
    async fn test_panicking_event_handler_does_not_stop_loop() {
        let (connector, mut servers) = ScriptedConnector::new(&[URL]);
        let bridge = builder(connector)
            .on_event(|event| panic!("handler exploded on {event:?}"))
            .connect()
            .expect("connect");

        let mut server = servers.recv().await.expect("server");
        bootstrap(&mut server).await;
        timeout(WAIT, bridge.wait_ready()).await.expect("in time").expect("ready");

        server
            .send_json(json!({"callback": "qzDonePrinting", "error": "Printer offline"}))
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge
            .remote()
            .call(
                "foo",
                vec![
                    Argument::value("x"),
                    Continuation::named("fooDone", move |_| {
                        let _ = tx.send(());
                        Ok(())
                    })
                    .into(),
                ],
            )
            .expect("call");

        let request = server.recv_json().await.expect("request");
        assert_eq!(request["callback"], "fooDone");
        server
            .send_json(json!({"method": "foo", "callback": "fooDone", "result": "1"}))
            .await;

        timeout(WAIT, rx.recv()).await.expect("in time").expect("delivered");
        assert_eq!(bridge.status(), ConnectionStatus::Ready);
    }

    #[tokio::test]
    async fn test_shutdown_stops_loop() {
        let (bridge, mut server) = ready_bridge().await;
        let remote = bridge.remote();

        bridge.shutdown().await;

        assert!(server.recv_close().await);
        assert!(matches!(
            remote.call("foo", vec![Argument::value(1)]),
            Err(Error::UnknownMethod { .. })
        ));
    }
}
