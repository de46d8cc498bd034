//! Generic Byte server model.
//!
//! The server never stores the value itself. Every Set goes through the
//! application's set callback and the value that callback returns is what
//! gets reported, so the application may clamp or reject input.

use crate::config::ServerConfig;
use crate::core::message::{ByteMessage, StatusReply};
use crate::core::opcode::{Opcode, SERVER_MODEL_ID};
use crate::error::{constants, ModelError, Result};
use crate::protocol::dispatcher::AccessModel;
use crate::transport::{AccessLayer, ModelHandle, RxMessage, TxMessage};
use crate::utils::metrics::Metrics;
use std::sync::Arc;
use tracing::{debug, info};

/// Returns the current value
pub type GetCallback = Box<dyn FnMut(ModelHandle) -> u8 + Send>;

/// Applies a requested value and returns the value actually stored
pub type SetCallback = Box<dyn FnMut(ModelHandle, u8) -> u8 + Send>;

/// Opcodes the server registers for
const SERVER_OPCODES: [Opcode; 3] = [Opcode::Set, Opcode::Get, Opcode::SetUnreliable];

#[derive(Default)]
pub struct ServerBuilder {
    element_index: u16,
    get_cb: Option<GetCallback>,
    set_cb: Option<SetCallback>,
    metrics: Option<Arc<Metrics>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: &ServerConfig) -> Self {
        self.element_index = config.element_index;
        self
    }

    pub fn element_index(mut self, element_index: u16) -> Self {
        self.element_index = element_index;
        self
    }

    /// Mandatory
    pub fn on_get<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ModelHandle) -> u8 + Send + 'static,
    {
        self.get_cb = Some(Box::new(callback));
        self
    }

    /// Mandatory
    pub fn on_set<F>(mut self, callback: F) -> Self
    where
        F: FnMut(ModelHandle, u8) -> u8 + Send + 'static,
    {
        self.set_cb = Some(Box::new(callback));
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add the server model to `access`. Call once per server.
    pub fn init<A: AccessLayer + ?Sized>(self, access: &mut A) -> Result<ByteServer> {
        let get_cb = self
            .get_cb
            .ok_or(ModelError::NullArgument(constants::ERR_GET_CB_MISSING))?;
        let set_cb = self
            .set_cb
            .ok_or(ModelError::NullArgument(constants::ERR_SET_CB_MISSING))?;

        let opcodes = SERVER_OPCODES.map(Opcode::vendor);
        let handle = access.register(self.element_index, SERVER_MODEL_ID, &opcodes)?;
        info!(
            handle = handle.0,
            element_index = self.element_index,
            "Generic Byte server registered"
        );

        Ok(ByteServer {
            handle,
            get_cb,
            set_cb,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}

/// Generic Byte server instance
pub struct ByteServer {
    handle: ModelHandle,
    get_cb: GetCallback,
    set_cb: SetCallback,
    metrics: Arc<Metrics>,
}

impl ByteServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn handle(&self) -> ModelHandle {
        self.handle
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Publish an unsolicited Status, e.g. after a local change of the value
    pub fn status_publish<A: AccessLayer + ?Sized>(&self, access: &mut A, value: u8) -> Result<()> {
        match access.publish(self.handle, &status_message(value)) {
            Ok(()) => {
                self.metrics.status_published();
                Ok(())
            }
            Err(e) => {
                self.metrics.send_failure();
                debug!(error = %e, value, "Status publish failed");
                Err(e)
            }
        }
    }

    fn reply_status<A: AccessLayer + ?Sized>(&self, access: &mut A, request: &RxMessage, value: u8) {
        if let Err(e) = access.reply(self.handle, request, &status_message(value)) {
            self.metrics.send_failure();
            debug!(error = %e, dst = %request.src, "Status reply failed");
        }
    }

    fn handle_set<A: AccessLayer + ?Sized>(&mut self, access: &mut A, request: &RxMessage, value: u8) {
        self.metrics.server_set();
        let stored = (self.set_cb)(self.handle, value);
        self.reply_status(access, request, stored);
        // Publish failures are already counted and logged
        let _ = self.status_publish(access, stored);
    }

    fn handle_get<A: AccessLayer + ?Sized>(&mut self, access: &mut A, request: &RxMessage) {
        self.metrics.server_get();
        let current = (self.get_cb)(self.handle);
        self.reply_status(access, request, current);
    }

    fn handle_set_unreliable<A: AccessLayer + ?Sized>(&mut self, access: &mut A, value: u8) {
        self.metrics.server_set();
        let stored = (self.set_cb)(self.handle, value);
        let _ = self.status_publish(access, stored);
    }
}

impl AccessModel for ByteServer {
    fn model_handle(&self) -> ModelHandle {
        self.handle
    }

    fn on_message<A: AccessLayer + ?Sized>(&mut self, access: &mut A, message: &RxMessage) {
        let decoded = message
            .opcode
            .model_opcode()
            .and_then(|opcode| ByteMessage::decode(opcode, &message.payload));

        match decoded {
            Ok(ByteMessage::Set(set)) => {
                debug!(value = set.value, tid = set.tid.0, src = %message.src, "Set received");
                self.handle_set(access, message, set.value);
            }
            Ok(ByteMessage::Get) => {
                debug!(src = %message.src, "Get received");
                self.handle_get(access, message);
            }
            Ok(ByteMessage::SetUnreliable(set)) => {
                debug!(value = set.value, tid = set.tid.0, src = %message.src, "Set unreliable received");
                self.handle_set_unreliable(access, set.value);
            }
            Ok(ByteMessage::Status(_)) => {
                debug!(src = %message.src, "Server ignoring status");
            }
            Err(e) => {
                self.metrics.malformed_frame();
                debug!(error = %e, src = %message.src, "Dropping malformed request");
            }
        }
    }
}

fn status_message(value: u8) -> TxMessage {
    TxMessage::new(
        Opcode::Status,
        ByteMessage::Status(StatusReply { value }).payload(),
    )
}
