//! In-process mesh.
//!
//! [`LocalMesh`] is a shared bus and every [`MeshNode`] is one station on it.
//! Frames travel as encoded access PDUs over unbounded tokio channels, and
//! reliable-transfer and publish-period timers run as tokio tasks that post
//! back into the owning node. Nothing is delivered to a model until the
//! application pulls it with [`MeshNode::next_event`] or
//! [`MeshNode::try_next_event`] and routes it with
//! [`AccessModel::handle_event`](crate::protocol::AccessModel::handle_event).
//!
//! ```text
//!  MeshNode A ──transmit──▶ Bus ──(drop_rate)──▶ MeshNode B frames
//!      ▲                                               │
//!      └── timers (reliable timeout, publish period) ──┘ ingest → AccessEvent
//! ```

use crate::core::opcode::VendorOpcode;
use crate::core::packet::AccessPdu;
use crate::error::{constants, ModelError, Result};
use crate::transport::{
    AccessEvent, AccessLayer, Address, ModelHandle, ReliableOutcome, ReliableRequest, RxMessage,
    TxMessage, RELIABLE_TIMEOUT_MAX, RELIABLE_TIMEOUT_MIN,
};
use bytes::Bytes;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace};

/// Models a node accepts unless [`MeshNode::with_model_capacity`] says otherwise
pub const DEFAULT_MODEL_CAPACITY: usize = 8;

/// A frame on the bus
#[derive(Debug, Clone)]
struct Frame {
    src: Address,
    dst: Address,
    pdu: Bytes,
}

struct Station {
    id: u64,
    first: Address,
    count: u16,
    groups: Vec<Address>,
    tx: mpsc::UnboundedSender<Frame>,
}

impl Station {
    fn owns(&self, address: Address) -> bool {
        address.0 >= self.first.0 && address.0 - self.first.0 < self.count
    }

    fn accepts(&self, dst: Address) -> bool {
        if dst.is_unicast() {
            self.owns(dst)
        } else {
            self.groups.contains(&dst)
        }
    }

    fn overlaps(&self, first: Address, count: u16) -> bool {
        let (a0, a1) = (u32::from(self.first.0), u32::from(self.first.0) + u32::from(self.count));
        let (b0, b1) = (u32::from(first.0), u32::from(first.0) + u32::from(count));
        a0 < b1 && b0 < a1
    }
}

#[derive(Default)]
struct Bus {
    stations: Vec<Station>,
    drop_rate: f32,
    next_id: u64,
}

impl Bus {
    fn transmit(&self, frame: &Frame) {
        let mut rng = rand::rng();
        for station in self.stations.iter().filter(|s| s.accepts(frame.dst)) {
            if self.drop_rate > 0.0 && rng.random::<f32>() < self.drop_rate {
                trace!(src = %frame.src, dst = %frame.dst, station = station.id, "Frame dropped");
                continue;
            }
            // A closed receiver means the node is being torn down
            let _ = station.tx.send(frame.clone());
        }
    }
}

/// Shared in-process bus
#[derive(Clone, Default)]
pub struct LocalMesh {
    bus: Arc<Mutex<Bus>>,
}

impl LocalMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probability in `0.0..=1.0` that a single delivery is lost
    pub fn set_drop_rate(&self, rate: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&rate) {
            return Err(ModelError::InvalidParameter(constants::ERR_DROP_RATE_RANGE));
        }
        lock(&self.bus).drop_rate = rate;
        Ok(())
    }

    /// Add a node whose elements use `element_count` consecutive unicast
    /// addresses starting at `primary`.
    ///
    /// Must be called from within a tokio runtime; the node's timers are
    /// spawned on it.
    pub fn add_node(&self, primary: Address, element_count: u16) -> Result<MeshNode> {
        if element_count == 0 {
            return Err(ModelError::InvalidParameter(constants::ERR_ELEMENT_COUNT));
        }
        let last = u32::from(primary.0) + u32::from(element_count) - 1;
        if !primary.is_unicast() || last > 0x7FFF {
            return Err(ModelError::InvalidAddressConfig);
        }
        let runtime = Handle::try_current()
            .map_err(|e| ModelError::ConfigError(format!("MeshNode needs a tokio runtime: {e}")))?;

        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let station = {
            let mut bus = lock(&self.bus);
            if bus.stations.iter().any(|s| s.overlaps(primary, element_count)) {
                return Err(ModelError::InvalidAddressConfig);
            }
            let id = bus.next_id;
            bus.next_id += 1;
            bus.stations.push(Station {
                id,
                first: primary,
                count: element_count,
                groups: Vec::new(),
                tx: frame_tx,
            });
            id
        };

        info!(station, primary = %primary, element_count, "Mesh node added");

        Ok(MeshNode {
            station,
            primary,
            element_count,
            capacity: DEFAULT_MODEL_CAPACITY,
            models: Vec::new(),
            bus: self.bus.clone(),
            runtime,
            frames,
            timer_tx,
            timer_rx,
            ready: VecDeque::new(),
            next_generation: 0,
        })
    }
}

fn lock(bus: &Mutex<Bus>) -> MutexGuard<'_, Bus> {
    bus.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    ReliableExpired { handle: ModelHandle, generation: u64 },
    PublishPeriod { handle: ModelHandle, generation: u64 },
}

struct ActiveTransfer {
    reply_opcode: VendorOpcode,
    destination: Address,
    generation: u64,
    timer: JoinHandle<()>,
}

struct ModelSlot {
    model_id: u16,
    element_index: u16,
    opcodes: Vec<VendorOpcode>,
    publish_address: Option<Address>,
    subscriptions: Vec<Address>,
    reliable: Option<ActiveTransfer>,
    publish_timer: Option<(u64, JoinHandle<()>)>,
}

impl ModelSlot {
    fn stop_timers(&mut self) {
        if let Some(transfer) = self.reliable.take() {
            transfer.timer.abort();
        }
        if let Some((_, timer)) = self.publish_timer.take() {
            timer.abort();
        }
    }
}

/// One node on a [`LocalMesh`], acting as the access layer for its models
pub struct MeshNode {
    station: u64,
    primary: Address,
    element_count: u16,
    capacity: usize,
    models: Vec<ModelSlot>,
    bus: Arc<Mutex<Bus>>,
    runtime: Handle,
    frames: mpsc::UnboundedReceiver<Frame>,
    timer_tx: mpsc::UnboundedSender<Timer>,
    timer_rx: mpsc::UnboundedReceiver<Timer>,
    ready: VecDeque<AccessEvent>,
    next_generation: u64,
}

impl MeshNode {
    /// Limit the number of models that may register
    pub fn with_model_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn primary_address(&self) -> Address {
        self.primary
    }

    pub fn element_count(&self) -> u16 {
        self.element_count
    }

    /// Unicast address of element `element_index`
    pub fn element_address(&self, element_index: u16) -> Option<Address> {
        (element_index < self.element_count).then(|| Address(self.primary.0 + element_index))
    }

    /// Unicast address of the element a model lives on
    pub fn model_address(&self, handle: ModelHandle) -> Option<Address> {
        self.slot(handle)
            .ok()
            .map(|slot| Address(self.primary.0 + slot.element_index))
    }

    /// Model id registered under `handle`
    pub fn model_id(&self, handle: ModelHandle) -> Option<u16> {
        self.slot(handle).ok().map(|slot| slot.model_id)
    }

    /// Point the model's publications at `address`
    pub fn set_publish_address(&mut self, handle: ModelHandle, address: Address) -> Result<()> {
        if address == Address::UNASSIGNED {
            return Err(ModelError::InvalidAddressConfig);
        }
        self.slot_mut(handle)?.publish_address = Some(address);
        debug!(handle = handle.0, address = %address, "Publish address set");
        Ok(())
    }

    /// Deliver frames sent to the group `group` to this model
    pub fn subscribe(&mut self, handle: ModelHandle, group: Address) -> Result<()> {
        if !group.is_group() {
            return Err(ModelError::InvalidAddressConfig);
        }
        let slot = self.slot_mut(handle)?;
        if !slot.subscriptions.contains(&group) {
            slot.subscriptions.push(group);
        }

        let mut bus = lock(&self.bus);
        if let Some(station) = bus.stations.iter_mut().find(|s| s.id == self.station) {
            if !station.groups.contains(&group) {
                station.groups.push(group);
            }
        }
        debug!(handle = handle.0, group = %group, "Subscribed");
        Ok(())
    }

    /// Raise [`AccessEvent::PublishTimeout`] every `period`; `None` stops it
    pub fn set_publish_period(
        &mut self,
        handle: ModelHandle,
        period: Option<Duration>,
    ) -> Result<()> {
        if period.is_some_and(|p| p.is_zero()) {
            return Err(ModelError::InvalidParameter(constants::ERR_PUBLISH_PERIOD));
        }
        let generation = self.generation();
        let timer_tx = self.timer_tx.clone();
        let runtime = self.runtime.clone();
        let slot = self.slot_mut(handle)?;

        if let Some((_, timer)) = slot.publish_timer.take() {
            timer.abort();
        }

        if let Some(period) = period {
            let timer = runtime.spawn(async move {
                let mut interval =
                    tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                loop {
                    interval.tick().await;
                    if timer_tx
                        .send(Timer::PublishPeriod { handle, generation })
                        .is_err()
                    {
                        break;
                    }
                }
            });
            slot.publish_timer = Some((generation, timer));
        }
        Ok(())
    }

    /// Whether `handle` has a reliable transfer in flight
    pub fn has_active_transfer(&self, handle: ModelHandle) -> bool {
        self.slot(handle).is_ok_and(|slot| slot.reliable.is_some())
    }

    /// Wait for the next event for any model on this node
    pub async fn next_event(&mut self) -> Option<AccessEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }

            enum Step {
                Frame(Option<Frame>),
                Timer(Option<Timer>),
            }

            // Frames first so a reply racing its own timeout still wins
            let step = tokio::select! {
                biased;
                frame = self.frames.recv() => Step::Frame(frame),
                timer = self.timer_rx.recv() => Step::Timer(timer),
            };

            match step {
                Step::Frame(Some(frame)) => self.ingest(frame),
                Step::Timer(Some(timer)) => self.expire(timer),
                Step::Frame(None) | Step::Timer(None) => return None,
            }
        }
    }

    /// Next event if one is available without waiting
    pub fn try_next_event(&mut self) -> Option<AccessEvent> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Some(event);
            }
            if let Ok(frame) = self.frames.try_recv() {
                self.ingest(frame);
                continue;
            }
            if let Ok(timer) = self.timer_rx.try_recv() {
                self.expire(timer);
                continue;
            }
            return None;
        }
    }

    fn generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn slot(&self, handle: ModelHandle) -> Result<&ModelSlot> {
        self.models
            .get(usize::from(handle.0))
            .ok_or(ModelError::NotFound(constants::ERR_MODEL_NOT_FOUND))
    }

    fn slot_mut(&mut self, handle: ModelHandle) -> Result<&mut ModelSlot> {
        self.models
            .get_mut(usize::from(handle.0))
            .ok_or(ModelError::NotFound(constants::ERR_MODEL_NOT_FOUND))
    }

    fn source_of(&self, handle: ModelHandle) -> Result<Address> {
        let slot = self.slot(handle)?;
        Ok(Address(self.primary.0 + slot.element_index))
    }

    fn transmit(&self, src: Address, dst: Address, message: &TxMessage) -> Result<()> {
        let pdu = AccessPdu::new(message.opcode, message.payload.clone()).to_bytes()?;
        trace!(src = %src, dst = %dst, len = pdu.len(), "Transmit");
        lock(&self.bus).transmit(&Frame { src, dst, pdu });
        Ok(())
    }

    fn ingest(&mut self, frame: Frame) {
        let pdu = match AccessPdu::from_bytes(&frame.pdu) {
            Ok(pdu) => pdu,
            Err(e) => {
                debug!(error = %e, src = %frame.src, "Dropping undecodable frame");
                return;
            }
        };

        for (index, slot) in self.models.iter_mut().enumerate() {
            let element = Address(self.primary.0 + slot.element_index);
            let addressed = frame.dst == element || slot.subscriptions.contains(&frame.dst);
            if !addressed || !slot.opcodes.contains(&pdu.opcode) {
                continue;
            }

            let handle = ModelHandle(index as u16);
            self.ready.push_back(AccessEvent::Message {
                handle,
                message: RxMessage {
                    opcode: pdu.opcode,
                    payload: pdu.payload.clone(),
                    src: frame.src,
                    dst: frame.dst,
                },
            });

            let completes = slot.reliable.as_ref().is_some_and(|t| {
                t.reply_opcode == pdu.opcode
                    && (!t.destination.is_unicast() || t.destination == frame.src)
            });
            if completes {
                if let Some(transfer) = slot.reliable.take() {
                    transfer.timer.abort();
                }
                debug!(handle = handle.0, src = %frame.src, "Reliable transfer acknowledged");
                self.ready.push_back(AccessEvent::ReliableStatus {
                    handle,
                    outcome: ReliableOutcome::Success,
                });
            }
        }
    }

    fn expire(&mut self, timer: Timer) {
        match timer {
            Timer::ReliableExpired { handle, generation } => {
                let Ok(slot) = self.slot_mut(handle) else {
                    return;
                };
                if slot.reliable.as_ref().map(|t| t.generation) != Some(generation) {
                    return;
                }
                slot.reliable = None;
                debug!(handle = handle.0, "Reliable transfer timed out");
                self.ready.push_back(AccessEvent::ReliableStatus {
                    handle,
                    outcome: ReliableOutcome::Timeout,
                });
            }
            Timer::PublishPeriod { handle, generation } => {
                let current = self
                    .slot(handle)
                    .ok()
                    .and_then(|slot| slot.publish_timer.as_ref().map(|(g, _)| *g));
                if current == Some(generation) {
                    self.ready.push_back(AccessEvent::PublishTimeout { handle });
                }
            }
        }
    }
}

impl AccessLayer for MeshNode {
    #[instrument(skip(self, opcodes), fields(station = self.station))]
    fn register(
        &mut self,
        element_index: u16,
        model_id: u16,
        opcodes: &[VendorOpcode],
    ) -> Result<ModelHandle> {
        if element_index >= self.element_count {
            return Err(ModelError::NotFound(constants::ERR_ELEMENT_NOT_FOUND));
        }
        if self
            .models
            .iter()
            .any(|m| m.element_index == element_index && m.model_id == model_id)
        {
            return Err(ModelError::AlreadyBound {
                element_index,
                model_id,
            });
        }
        if self.models.len() >= self.capacity {
            return Err(ModelError::ResourceExhausted);
        }

        let handle = ModelHandle(self.models.len() as u16);
        self.models.push(ModelSlot {
            model_id,
            element_index,
            opcodes: opcodes.to_vec(),
            publish_address: None,
            subscriptions: Vec::new(),
            reliable: None,
            publish_timer: None,
        });
        debug!(handle = handle.0, "Model registered");
        Ok(handle)
    }

    #[instrument(skip(self, request), fields(station = self.station, handle = handle.0))]
    fn send_reliable(&mut self, handle: ModelHandle, request: ReliableRequest) -> Result<()> {
        let slot = self.slot(handle)?;
        if slot.reliable.is_some() {
            return Err(ModelError::InvalidState);
        }
        let destination = slot.publish_address.ok_or(ModelError::InvalidAddressConfig)?;
        if !(RELIABLE_TIMEOUT_MIN..=RELIABLE_TIMEOUT_MAX).contains(&request.timeout) {
            return Err(ModelError::InvalidParameter(constants::ERR_TIMEOUT_RANGE));
        }

        let src = self.source_of(handle)?;
        self.transmit(src, destination, &request.message)?;

        let generation = self.generation();
        let timer_tx = self.timer_tx.clone();
        let timeout = request.timeout;
        let timer = self.runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = timer_tx.send(Timer::ReliableExpired { handle, generation });
        });

        self.slot_mut(handle)?.reliable = Some(ActiveTransfer {
            reply_opcode: request.reply_opcode,
            destination,
            generation,
            timer,
        });
        debug!(dst = %destination, ?timeout, "Reliable transfer started");
        Ok(())
    }

    fn publish(&mut self, handle: ModelHandle, message: &TxMessage) -> Result<()> {
        let destination = self
            .slot(handle)?
            .publish_address
            .ok_or(ModelError::InvalidAddressConfig)?;
        let src = self.source_of(handle)?;
        self.transmit(src, destination, message)
    }

    fn reply(
        &mut self,
        handle: ModelHandle,
        request: &RxMessage,
        message: &TxMessage,
    ) -> Result<()> {
        let src = self.source_of(handle)?;
        self.transmit(src, request.src, message)
    }

    fn cancel_reliable(&mut self, handle: ModelHandle) {
        let Ok(slot) = self.slot_mut(handle) else {
            return;
        };
        if let Some(transfer) = slot.reliable.take() {
            transfer.timer.abort();
            debug!(handle = handle.0, "Reliable transfer cancelled");
            self.ready.push_back(AccessEvent::ReliableStatus {
                handle,
                outcome: ReliableOutcome::Cancelled,
            });
        }
    }

    fn publish_address(&self, handle: ModelHandle) -> Option<Address> {
        self.slot(handle).ok().and_then(|slot| slot.publish_address)
    }
}

impl Drop for MeshNode {
    fn drop(&mut self) {
        for slot in &mut self.models {
            slot.stop_timers();
        }
        lock(&self.bus).stations.retain(|s| s.id != self.station);
    }
}
