//! Generic Byte client model.
//!
//! The client owns a single request slot. `set` and `get` fill it and hand
//! an acknowledged transfer to the access layer; the slot is freed only when
//! the access layer resolves that transfer (success, timeout or cancel).
//! Status messages are checked for provenance and range before they are
//! reported, and at most one Status is reported per request.
//!
//! ```text
//!            set()/get() accepted
//!   Idle ───────────────────────────▶ AwaitingReply
//!    ▲                                     │
//!    └──── ReliableStatus(Success |        │
//!          Timeout | Cancelled) ◀──────────┘
//! ```

use crate::config::{ClientConfig, DEFAULT_UNRELIABLE_REPEATS};
use crate::core::message::{
    is_valid_value, ByteMessage, SetRequest, SetUnreliableRequest, StatusReply, Tid, TidCounter,
};
use crate::core::opcode::{Opcode, CLIENT_MODEL_ID};
use crate::error::{constants, ModelError, Result};
use crate::protocol::dispatcher::AccessModel;
use crate::transport::{
    AccessLayer, Address, ModelHandle, ReliableOutcome, ReliableRequest, RxMessage, TxMessage,
    RELIABLE_TIMEOUT_MIN,
};
use crate::utils::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Outcome reported to the application through the status callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteStatus {
    /// Valid Status received from the server, with its value
    Normal(u8),
    /// The server did not reply to a Set/Get
    NoReply,
    /// The Set/Get was cancelled
    Cancelled,
}

/// Status callback: model handle, outcome, and the server element address
/// (absent for `NoReply` and `Cancelled`)
pub type StatusCallback = Box<dyn FnMut(ModelHandle, ByteStatus, Option<Address>) + Send>;

/// Called when the model's periodic publish interval elapses
pub type TimeoutCallback = Box<dyn FnMut(ModelHandle) + Send>;

/// The request currently occupying the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub opcode: Opcode,
    /// Value carried by a Set
    pub value: Option<u8>,
    /// TID carried by a Set
    pub tid: Option<Tid>,
    replied: bool,
}

impl PendingRequest {
    /// Whether a Status has already been reported for this request
    pub fn replied(&self) -> bool {
        self.replied
    }
}

/// Reliable-transfer state of a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferState {
    #[default]
    Idle,
    AwaitingReply(PendingRequest),
}

impl TransferState {
    pub fn is_active(&self) -> bool {
        matches!(self, TransferState::AwaitingReply(_))
    }
}

/// Collects the client's callbacks and settings before it is added to the
/// access layer
pub struct ClientBuilder {
    element_index: u16,
    reliable_timeout: Duration,
    unreliable_repeats: u8,
    status_cb: Option<StatusCallback>,
    timeout_cb: Option<TimeoutCallback>,
    metrics: Option<Arc<Metrics>>,
    tid: TidCounter,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            element_index: 0,
            reliable_timeout: RELIABLE_TIMEOUT_MIN,
            unreliable_repeats: DEFAULT_UNRELIABLE_REPEATS,
            status_cb: None,
            timeout_cb: None,
            metrics: None,
            tid: TidCounter::new(),
        }
    }

    /// Take element, timeout and burst size from `config`
    pub fn with_config(mut self, config: &ClientConfig) -> Self {
        self.element_index = config.element_index;
        self.reliable_timeout = config.reliable_timeout;
        self.unreliable_repeats = config.unreliable_repeats;
        self
    }

    pub fn element_index(mut self, element_index: u16) -> Self {
        self.element_index = element_index;
        self
    }

    pub fn reliable_timeout(mut self, timeout: Duration) -> Self {
        self.reliable_timeout = timeout;
        self
    }

    /// Mandatory
    pub fn on_status<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ModelHandle, ByteStatus, Option<Address>) + Send + 'static,
    {
        self.status_cb = Some(Box::new(callback));
        self
    }

    pub fn on_publish_timeout<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ModelHandle) + Send + 'static,
    {
        self.timeout_cb = Some(Box::new(callback));
        self
    }

    /// Share a metrics collector with other models
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Inject the TID source, e.g. to resume a persisted counter
    pub fn tid_counter(mut self, tid: TidCounter) -> Self {
        self.tid = tid;
        self
    }

    /// Add the client model to `access`.
    ///
    /// Call once per client; the client lives as long as the node.
    pub fn init<A: AccessLayer + ?Sized>(self, access: &mut A) -> Result<ByteClient> {
        let status_cb = self
            .status_cb
            .ok_or(ModelError::NullArgument(constants::ERR_STATUS_CB_MISSING))?;

        let handle = access.register(
            self.element_index,
            CLIENT_MODEL_ID,
            &[Opcode::Status.vendor()],
        )?;
        info!(
            handle = handle.0,
            element_index = self.element_index,
            "Generic Byte client registered"
        );

        Ok(ByteClient {
            handle,
            status_cb,
            timeout_cb: self.timeout_cb,
            state: TransferState::Idle,
            tid: self.tid,
            last_tid: None,
            reliable_timeout: self.reliable_timeout,
            unreliable_repeats: self.unreliable_repeats,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

/// Generic Byte client instance
pub struct ByteClient {
    handle: ModelHandle,
    status_cb: StatusCallback,
    timeout_cb: Option<TimeoutCallback>,
    state: TransferState,
    tid: TidCounter,
    last_tid: Option<Tid>,
    reliable_timeout: Duration,
    unreliable_repeats: u8,
    metrics: Arc<Metrics>,
}

impl ByteClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Whether an acknowledged request is outstanding
    pub fn is_busy(&self) -> bool {
        self.state.is_active()
    }

    /// Most recently issued TID
    pub fn tid(&self) -> Option<Tid> {
        self.last_tid
    }

    /// Burst size configured for [`set_unreliable`](Self::set_unreliable)
    pub fn unreliable_repeats(&self) -> u8 {
        self.unreliable_repeats
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Set the server's value and wait for its Status.
    ///
    /// Fails with [`ModelError::InvalidState`] while another request is
    /// outstanding. Access-layer errors are returned unchanged and leave the
    /// client idle.
    #[instrument(skip(self, access), fields(handle = self.handle.0))]
    pub fn set<A: AccessLayer + ?Sized>(&mut self, access: &mut A, value: u8) -> Result<()> {
        self.admit()?;

        let tid = self.next_tid();
        self.send_reliable(access, &ByteMessage::Set(SetRequest { value, tid }))?;
        self.state = TransferState::AwaitingReply(PendingRequest {
            opcode: Opcode::Set,
            value: Some(value),
            tid: Some(tid),
            replied: false,
        });
        Ok(())
    }

    /// Send `repeats` unacknowledged Sets carrying the same TID.
    ///
    /// Independent of the request slot. Stops at the first failed send;
    /// frames already sent stay sent.
    #[instrument(skip(self, access), fields(handle = self.handle.0))]
    pub fn set_unreliable<A: AccessLayer + ?Sized>(
        &mut self,
        access: &mut A,
        value: u8,
        repeats: u8,
    ) -> Result<()> {
        let tid = self.next_tid();
        let message = ByteMessage::SetUnreliable(SetUnreliableRequest { value, tid });
        let tx = TxMessage::new(Opcode::SetUnreliable, message.payload());

        for attempt in 0..repeats {
            if let Err(e) = access.publish(self.handle, &tx) {
                debug!(error = %e, attempt, tid = tid.0, "Unreliable set burst interrupted");
                return Err(e);
            }
            self.metrics.unreliable_sent();
        }
        Ok(())
    }

    /// Ask the server for its value
    #[instrument(skip(self, access), fields(handle = self.handle.0))]
    pub fn get<A: AccessLayer + ?Sized>(&mut self, access: &mut A) -> Result<()> {
        self.admit()?;

        self.send_reliable(access, &ByteMessage::Get)?;
        self.state = TransferState::AwaitingReply(PendingRequest {
            opcode: Opcode::Get,
            value: None,
            tid: None,
            replied: false,
        });
        Ok(())
    }

    /// Abort the outstanding request, if any. The slot is freed when the
    /// access layer reports the cancellation.
    pub fn cancel<A: AccessLayer + ?Sized>(&mut self, access: &mut A) {
        access.cancel_reliable(self.handle);
    }

    fn admit(&self) -> Result<()> {
        if self.state.is_active() {
            debug!(handle = self.handle.0, "Request rejected: transfer in progress");
            return Err(ModelError::InvalidState);
        }
        Ok(())
    }

    fn next_tid(&mut self) -> Tid {
        let tid = self.tid.next_tid();
        self.last_tid = Some(tid);
        tid
    }

    fn send_reliable<A: AccessLayer + ?Sized>(
        &self,
        access: &mut A,
        message: &ByteMessage,
    ) -> Result<()> {
        let request = ReliableRequest {
            message: TxMessage::new(message.opcode(), message.payload()),
            reply_opcode: Opcode::Status.vendor(),
            timeout: self.reliable_timeout,
        };

        if let Err(e) = access.send_reliable(self.handle, request) {
            debug!(error = %e, opcode = message.opcode().name(), "Reliable send refused");
            return Err(e);
        }
        self.metrics.reliable_request();
        Ok(())
    }

    fn accept_status<A: AccessLayer + ?Sized>(
        &mut self,
        access: &A,
        src: Address,
        status: StatusReply,
    ) -> bool {
        if access.publish_address(self.handle) != Some(src) {
            self.metrics.reply_bad_source();
            debug!(src = %src, "Dropping status from unexpected source");
            return false;
        }

        if !is_valid_value(status.value) {
            self.metrics.reply_out_of_range();
            debug!(value = status.value, "Dropping out-of-range status");
            return false;
        }

        match &mut self.state {
            TransferState::AwaitingReply(pending) if !pending.replied => {
                pending.replied = true;
                true
            }
            _ => {
                self.metrics.reply_unsolicited();
                debug!(src = %src, "Dropping status with no request waiting");
                false
            }
        }
    }
}

impl AccessModel for ByteClient {
    fn model_handle(&self) -> ModelHandle {
        self.handle
    }

    fn on_message<A: AccessLayer + ?Sized>(&mut self, access: &mut A, message: &RxMessage) {
        let decoded = message
            .opcode
            .model_opcode()
            .and_then(|opcode| ByteMessage::decode(opcode, &message.payload));

        let status = match decoded {
            Ok(ByteMessage::Status(status)) => status,
            Ok(other) => {
                debug!(opcode = other.opcode().name(), "Client ignoring request opcode");
                return;
            }
            Err(e) => {
                self.metrics.malformed_frame();
                debug!(error = %e, src = %message.src, "Dropping malformed status");
                return;
            }
        };

        if self.accept_status(access, message.src, status) {
            self.metrics.reply_accepted();
            (self.status_cb)(self.handle, ByteStatus::Normal(status.value), Some(message.src));
        }
    }

    fn on_reliable_status(&mut self, outcome: ReliableOutcome) {
        let previous = std::mem::take(&mut self.state);
        if !previous.is_active() {
            warn!(handle = self.handle.0, ?outcome, "Transfer resolved with no request outstanding");
            return;
        }

        match outcome {
            ReliableOutcome::Success => {
                if let TransferState::AwaitingReply(pending) = previous {
                    if !pending.replied {
                        debug!(
                            opcode = pending.opcode.name(),
                            "Transfer acknowledged without a reportable status"
                        );
                    }
                }
            }
            ReliableOutcome::Timeout => {
                self.metrics.transfer_timed_out();
                (self.status_cb)(self.handle, ByteStatus::NoReply, None);
            }
            ReliableOutcome::Cancelled => {
                self.metrics.transfer_cancelled();
                (self.status_cb)(self.handle, ByteStatus::Cancelled, None);
            }
        }
    }

    fn on_publish_timeout(&mut self) {
        if let Some(callback) = self.timeout_cb.as_mut() {
            callback(self.handle);
        }
    }
}
