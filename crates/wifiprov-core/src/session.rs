//! Provisioning session - high-level orchestrator for one attempt.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};

use crate::error::ProvisioningError;
use crate::events::{PacketDirection, ProvisionEvent, ProvisionObserver, TracingObserver};
use crate::payload::{ConfigDocument, ConfigEdit, scan};
use crate::protocol::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_FRAGMENT_DELAY_MS, DEFAULT_FRAGMENT_SIZE, DEFAULT_READ_CHUNK,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_REMOTE_PATH, DEFAULT_WARMUP_MS,
};
use crate::state::handlers::{
    HandleResult, HandlerContext, handle_close, handle_failure, handle_frame, handle_patch,
    handle_start, handle_write,
};
use crate::state::machine::{ProvisionMachine, ProvisionState, Query};
use crate::transport::{SerialPortTransport, Transport, TransportError};

/// Configuration for a provisioning session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Serial bit rate.
    pub baud_rate: u32,
    /// Config file on the device.
    pub remote_path: String,
    /// Delay before the break sequence, in milliseconds.
    pub warmup_ms: u64,
    /// Characters per write statement.
    pub fragment_size: usize,
    /// Delay after each write statement, in milliseconds.
    pub fragment_delay_ms: u64,
    /// Maximum bytes requested per transport read.
    pub read_chunk: usize,
    /// Transport read poll interval, in milliseconds.
    pub read_timeout_ms: u64,
    /// Give up waiting for the dump after this many seconds. Unset waits forever.
    pub dump_timeout_secs: Option<u64>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
            warmup_ms: DEFAULT_WARMUP_MS,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            fragment_delay_ms: DEFAULT_FRAGMENT_DELAY_MS,
            read_chunk: DEFAULT_READ_CHUNK,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            dump_timeout_secs: None,
        }
    }
}

impl ProvisionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ProvisionConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.fragment_size == 0 {
            bail!("fragment_size must be at least 1");
        }
        if self.read_chunk == 0 {
            bail!("read_chunk must be at least 1");
        }
        if self.remote_path.is_empty() {
            bail!("remote_path must not be empty");
        }
        Ok(())
    }

    /// Zero delays, for tests and simulators.
    pub fn without_delays(mut self) -> Self {
        self.warmup_ms = 0;
        self.fragment_delay_ms = 0;
        self
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }

    pub fn fragment_delay(&self) -> Duration {
        Duration::from_millis(self.fragment_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn dump_timeout(&self) -> Option<Duration> {
        self.dump_timeout_secs.map(Duration::from_secs)
    }
}

/// Provisioning session.
///
/// Every call runs one independent attempt with its own machine and its own
/// transport session.
pub struct ProvisionSession<O: ProvisionObserver> {
    config: ProvisionConfig,
    observer: Arc<O>,
}

impl ProvisionSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: ProvisionConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: ProvisionObserver + 'static> ProvisionSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: ProvisionConfig, observer: Arc<O>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    /// Store `credential` for `network` on the device behind `port`.
    #[instrument(skip(self, credential), fields(credential_len = credential.len()))]
    pub fn provision(
        &self,
        port: &str,
        network: &str,
        credential: &str,
    ) -> Result<(), ProvisioningError> {
        self.run_on_port(
            port,
            Query::ConfigFile,
            Some(ConfigEdit::upsert_wifi(network, credential)),
        )
        .map(|_| ())
    }

    /// Apply an arbitrary edit and return the document as written.
    #[instrument(skip(self, edit), fields(edit = %edit))]
    pub fn apply(&self, port: &str, edit: ConfigEdit) -> Result<ConfigDocument, ProvisioningError> {
        self.run_on_port(port, Query::ConfigFile, Some(edit))
    }

    /// Dump and parse the device config without writing anything.
    #[instrument(skip(self))]
    pub fn read_config(&self, port: &str) -> Result<ConfigDocument, ProvisioningError> {
        self.run_on_port(port, Query::ConfigFile, None)
    }

    /// List the SSIDs the device can see, using the same interrupt and dump
    /// path as `read_config`.
    #[instrument(skip(self))]
    pub fn scan_networks(&self, port: &str) -> Result<Vec<String>, ProvisioningError> {
        let doc = self.run_on_port(port, Query::NetworkScan, None)?;
        Ok(scan::networks(&doc)?)
    }

    fn run_on_port(
        &self,
        port: &str,
        query: Query,
        edit: Option<ConfigEdit>,
    ) -> Result<ConfigDocument, ProvisioningError> {
        let mut machine = ProvisionMachine::new();
        self.begin(&mut machine, query, edit)?;

        let transport =
            match SerialPortTransport::open(port, self.config.baud_rate, self.config.read_timeout())
            {
                Ok(t) => t,
                Err(e) => {
                    let err = ProvisioningError::TransportOpen(e);
                    machine.fail();
                    self.emit(ProvisionEvent::StateChanged {
                        from: ProvisionState::Interrupting,
                        to: ProvisionState::Failed,
                    });
                    self.emit(ProvisionEvent::Failed {
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            };

        self.drive(&transport, &mut machine)
    }

    /// Run one attempt over an already open transport.
    ///
    /// The transport is closed when this returns, whatever the outcome.
    pub fn run_with_transport<T: Transport + ?Sized>(
        &self,
        transport: &T,
        edit: Option<ConfigEdit>,
    ) -> Result<ConfigDocument, ProvisioningError> {
        self.query_with_transport(transport, Query::ConfigFile, edit)
    }

    /// Run a network scan over an already open transport.
    pub fn scan_with_transport<T: Transport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<Vec<String>, ProvisioningError> {
        let doc = self.query_with_transport(transport, Query::NetworkScan, None)?;
        Ok(scan::networks(&doc)?)
    }

    fn query_with_transport<T: Transport + ?Sized>(
        &self,
        transport: &T,
        query: Query,
        edit: Option<ConfigEdit>,
    ) -> Result<ConfigDocument, ProvisioningError> {
        let mut machine = ProvisionMachine::new();
        if let Err(e) = self.begin(&mut machine, query, edit) {
            let _ = transport.close();
            return Err(e);
        }
        self.drive(transport, &mut machine)
    }

    fn emit(&self, event: ProvisionEvent) {
        self.observer.on_event(&event);
    }

    /// Idle -> Interrupting.
    fn begin(
        &self,
        machine: &mut ProvisionMachine,
        query: Query,
        edit: Option<ConfigEdit>,
    ) -> Result<(), ProvisioningError> {
        machine.begin_query(query, edit)?;
        self.emit(ProvisionEvent::StateChanged {
            from: ProvisionState::Idle,
            to: ProvisionState::Interrupting,
        });
        Ok(())
    }

    fn drive<T: Transport + ?Sized>(
        &self,
        transport: &T,
        machine: &mut ProvisionMachine,
    ) -> Result<ConfigDocument, ProvisioningError> {
        self.emit(ProvisionEvent::TransportOpened {
            port: transport.name().to_string(),
        });

        // Wrap transport with observer
        let obs_transport = ObservableTransport {
            inner: transport,
            observer: self.observer.as_ref(),
        };
        let mut ctx = HandlerContext {
            transport: &obs_transport,
            observer: self.observer.as_ref(),
            machine,
            config: &self.config,
        };

        match self.run_phases(&mut ctx) {
            Ok(doc) => Ok(doc),
            Err(e) => {
                handle_failure(&mut ctx, &e);
                Err(e)
            }
        }
    }

    fn run_phases<T: Transport + ?Sized>(
        &self,
        ctx: &mut HandlerContext<'_, T, O>,
    ) -> Result<ConfigDocument, ProvisioningError> {
        handle_start(ctx)?;
        let payload = self.receive_dump(ctx)?;
        let doc = handle_patch(ctx, &payload)?;
        if ctx.machine.query() == Query::NetworkScan {
            scan::networks(&doc)?;
        }
        if ctx.machine.edit().is_some() {
            handle_write(ctx, &doc)?;
        }
        handle_close(ctx)?;
        Ok(doc)
    }

    /// Read frames until the dump is complete.
    fn receive_dump<T: Transport + ?Sized>(
        &self,
        ctx: &mut HandlerContext<'_, T, O>,
    ) -> Result<Vec<u8>, ProvisioningError> {
        let started = Instant::now();
        let limit = self.config.dump_timeout();

        loop {
            match ctx.transport.read(self.config.read_chunk) {
                Ok(frame) if frame.is_empty() => {}
                Ok(frame) => {
                    if let HandleResult::PayloadReady(payload) = handle_frame(ctx, &frame)? {
                        return Ok(payload);
                    }
                }
                Err(e) if !e.is_fatal() => {}
                Err(e) => return Err(ProvisioningError::TransportRead(e)),
            }

            if let Some(limit) = limit
                && started.elapsed() >= limit
            {
                info!(state = %ctx.machine.state(), "Gave up waiting for config dump");
                return Err(ProvisioningError::ProtocolTimeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
        }
    }
}

/// Transport wrapper that emits packet events.
struct ObservableTransport<'a, T: Transport + ?Sized, O: ProvisionObserver + ?Sized> {
    inner: &'a T,
    observer: &'a O,
}

impl<T: Transport + ?Sized, O: ProvisionObserver + ?Sized> Transport
    for ObservableTransport<'_, T, O>
{
    fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let res = self.inner.write(data);
        if res.is_ok() {
            self.observer.on_event(&ProvisionEvent::Packet {
                direction: PacketDirection::Tx,
                length: data.len(),
                data: None,
            });
        }
        res
    }

    fn read(&self, max_len: usize) -> Result<Vec<u8>, TransportError> {
        let res = self.inner.read(max_len);
        if let Ok(data) = &res
            && !data.is_empty()
        {
            trace!(text = %String::from_utf8_lossy(data), "RX");
            self.observer.on_event(&ProvisionEvent::Packet {
                direction: PacketDirection::Rx,
                length: data.len(),
                data: Some(data.iter().take(32).cloned().collect()),
            });
        }
        res
    }

    fn pause(&self) {
        self.inner.pause();
    }

    fn resume(&self) {
        self.inner.resume();
    }

    fn is_paused(&self) -> bool {
        self.inner.is_paused()
    }

    fn close(&self) -> Result<(), TransportError> {
        self.inner.close()
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
