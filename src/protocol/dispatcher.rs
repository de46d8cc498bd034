use crate::transport::{AccessEvent, AccessLayer, ModelHandle, ReliableOutcome, RxMessage};

/// A model that consumes events from the access layer.
///
/// Events arrive in two independent stages: an inbound message (validated by
/// the model for opcode, source and payload) and, for acknowledged requests,
/// the resolution of the transfer. `handle_event` splits an [`AccessEvent`]
/// into the matching stage.
pub trait AccessModel {
    /// Handle assigned to this model at registration
    fn model_handle(&self) -> ModelHandle;

    /// Inbound message for one of the model's opcodes
    fn on_message<A: AccessLayer + ?Sized>(&mut self, access: &mut A, message: &RxMessage);

    /// Resolution of the model's reliable transfer
    fn on_reliable_status(&mut self, _outcome: ReliableOutcome) {}

    /// Periodic publish interval elapsed
    fn on_publish_timeout(&mut self) {}

    /// Route `event` to the stage it belongs to.
    ///
    /// Returns `false` without doing anything when the event is addressed to
    /// another model.
    fn handle_event<A: AccessLayer + ?Sized>(&mut self, access: &mut A, event: &AccessEvent) -> bool {
        if event.handle() != self.model_handle() {
            return false;
        }

        match event {
            AccessEvent::Message { message, .. } => self.on_message(access, message),
            AccessEvent::ReliableStatus { outcome, .. } => self.on_reliable_status(*outcome),
            AccessEvent::PublishTimeout { .. } => self.on_publish_timeout(),
        }
        true
    }
}
