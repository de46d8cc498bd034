//! End-to-end client/server exchanges over the in-process mesh

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use mesh_generic_byte::core::opcode::Opcode;
use mesh_generic_byte::transport::{TxMessage, RELIABLE_TIMEOUT_MIN};
use mesh_generic_byte::{
    AccessEvent, AccessLayer, AccessModel, Address, ByteClient, ByteServer, ByteStatus, LocalMesh,
    MeshNode, Metrics, ModelError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CLIENT_ADDR: Address = Address(0x0100);
const SERVER_ADDR: Address = Address(0x0200);
const GROUP: Address = Address(0xC100);

type StatusLog = Arc<Mutex<Vec<(ByteStatus, Option<Address>)>>>;

struct Fixture {
    mesh: LocalMesh,
    client_node: MeshNode,
    server_node: MeshNode,
    client: ByteClient,
    server: ByteServer,
    log: StatusLog,
    stored: Arc<Mutex<u8>>,
}

impl Fixture {
    fn new() -> Self {
        let mesh = LocalMesh::new();
        let mut client_node = mesh.add_node(CLIENT_ADDR, 1).unwrap();
        let mut server_node = mesh.add_node(SERVER_ADDR, 1).unwrap();

        let log: StatusLog = Arc::default();
        let sink = log.clone();
        let client = ByteClient::builder()
            .on_status(move |_, status, src| sink.lock().unwrap().push((status, src)))
            .init(&mut client_node)
            .unwrap();

        let stored = Arc::new(Mutex::new(0u8));
        let get_state = stored.clone();
        let set_state = stored.clone();
        let server = ByteServer::builder()
            .on_get(move |_| *get_state.lock().unwrap())
            .on_set(move |_, value| {
                let mut state = set_state.lock().unwrap();
                *state = value.min(100);
                *state
            })
            .init(&mut server_node)
            .unwrap();

        client_node
            .set_publish_address(client.handle(), SERVER_ADDR)
            .unwrap();
        server_node
            .set_publish_address(server.handle(), GROUP)
            .unwrap();

        Self {
            mesh,
            client_node,
            server_node,
            client,
            server,
            log,
            stored,
        }
    }

    /// Let the server answer everything queued for it
    fn serve(&mut self) {
        while let Some(event) = self.server_node.try_next_event() {
            self.server.handle_event(&mut self.server_node, &event);
        }
    }

    /// Drive the client until its request slot is free again
    async fn settle(&mut self) {
        while self.client.is_busy() {
            let event = self.client_node.next_event().await.unwrap();
            self.client.handle_event(&mut self.client_node, &event);
        }
    }

    fn reports(&self) -> Vec<(ByteStatus, Option<Address>)> {
        self.log.lock().unwrap().clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_set_round_trip() {
    let mut f = Fixture::new();

    f.client.set(&mut f.client_node, 42).unwrap();
    f.serve();
    f.settle().await;

    assert_eq!(f.reports(), vec![(ByteStatus::Normal(42), Some(SERVER_ADDR))]);
    assert_eq!(*f.stored.lock().unwrap(), 42);
    assert_eq!(f.server.metrics().snapshot().status_published, 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_round_trip() {
    let mut f = Fixture::new();
    *f.stored.lock().unwrap() = 77;

    f.client.get(&mut f.client_node).unwrap();
    f.serve();
    f.settle().await;

    assert_eq!(f.reports(), vec![(ByteStatus::Normal(77), Some(SERVER_ADDR))]);
    assert_eq!(f.server.metrics().snapshot().status_published, 0);
}

#[tokio::test(start_paused = true)]
async fn test_clamped_set_reports_stored_value() {
    let mut f = Fixture::new();

    f.client.set(&mut f.client_node, 250).unwrap();
    f.serve();
    f.settle().await;

    assert_eq!(f.reports(), vec![(ByteStatus::Normal(100), Some(SERVER_ADDR))]);
}

#[tokio::test(start_paused = true)]
async fn test_silent_server_times_out() {
    let mut f = Fixture::new();

    f.client.get(&mut f.client_node).unwrap();
    let started = tokio::time::Instant::now();
    f.settle().await;

    assert!(started.elapsed() >= RELIABLE_TIMEOUT_MIN);
    assert_eq!(f.reports(), vec![(ByteStatus::NoReply, None)]);

    // the late answer is not reported
    f.serve();
    tokio::time::sleep(Duration::from_millis(10)).await;
    while let Some(event) = f.client_node.try_next_event() {
        f.client.handle_event(&mut f.client_node, &event);
    }
    assert_eq!(f.reports(), vec![(ByteStatus::NoReply, None)]);
    assert_eq!(f.client.metrics().snapshot().replies_unsolicited, 1);
}

#[tokio::test(start_paused = true)]
async fn test_busy_until_resolved() {
    let mut f = Fixture::new();

    f.client.set(&mut f.client_node, 1).unwrap();
    assert_eq!(f.client.get(&mut f.client_node), Err(ModelError::InvalidState));

    f.serve();
    f.settle().await;
    f.client.get(&mut f.client_node).unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_then_new_request() {
    let mut f = Fixture::new();

    f.client.set(&mut f.client_node, 5).unwrap();
    f.client.cancel(&mut f.client_node);
    f.settle().await;
    assert_eq!(f.reports(), vec![(ByteStatus::Cancelled, None)]);

    // drop the stale Set so only the Get is answered
    while f.server_node.try_next_event().is_some() {}

    f.client.get(&mut f.client_node).unwrap();
    f.serve();
    f.settle().await;
    assert_eq!(
        f.reports(),
        vec![
            (ByteStatus::Cancelled, None),
            (ByteStatus::Normal(0), Some(SERVER_ADDR))
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_spoofed_status_ignored() {
    let mut f = Fixture::new();
    let mut rogue = f.mesh.add_node(Address(0x0300), 1).unwrap();
    let rogue_model = rogue.register(0, 0x0004, &[]).unwrap();
    rogue.set_publish_address(rogue_model, CLIENT_ADDR).unwrap();

    f.client.get(&mut f.client_node).unwrap();
    rogue
        .publish(
            rogue_model,
            &TxMessage::new(Opcode::Status, Bytes::from_static(&[66])),
        )
        .unwrap();

    // rogue Status arrives first; the transfer stays open for the real server
    let event = f.client_node.try_next_event().unwrap();
    f.client.handle_event(&mut f.client_node, &event);
    assert!(f.client.is_busy());
    assert!(f.reports().is_empty());

    f.serve();
    f.settle().await;
    assert_eq!(f.reports(), vec![(ByteStatus::Normal(0), Some(SERVER_ADDR))]);
    assert_eq!(f.client.metrics().snapshot().replies_bad_source, 1);
}

#[tokio::test(start_paused = true)]
async fn test_unsolicited_publish_not_reported() {
    let mut f = Fixture::new();
    f.client_node.subscribe(f.client.handle(), GROUP).unwrap();

    f.server.status_publish(&mut f.server_node, 33).unwrap();
    while let Some(event) = f.client_node.try_next_event() {
        assert!(matches!(event, AccessEvent::Message { .. }));
        f.client.handle_event(&mut f.client_node, &event);
    }

    assert!(f.reports().is_empty());
    assert_eq!(f.client.metrics().snapshot().replies_unsolicited, 1);
}

#[tokio::test(start_paused = true)]
async fn test_group_publish_after_set_not_double_reported() {
    let mut f = Fixture::new();
    f.client_node.subscribe(f.client.handle(), GROUP).unwrap();

    f.client.set(&mut f.client_node, 12).unwrap();
    f.serve();
    f.settle().await;
    while let Some(event) = f.client_node.try_next_event() {
        f.client.handle_event(&mut f.client_node, &event);
    }

    assert_eq!(f.reports(), vec![(ByteStatus::Normal(12), Some(SERVER_ADDR))]);
}

#[tokio::test(start_paused = true)]
async fn test_unreliable_burst_survives_loss() {
    let mut f = Fixture::new();
    f.mesh.set_drop_rate(0.3).unwrap();

    f.client.set_unreliable(&mut f.client_node, 60, 10).unwrap();
    f.serve();

    // all ten lost: p = 0.3^10
    assert_eq!(*f.stored.lock().unwrap(), 60);
    assert_eq!(f.client.metrics().snapshot().unreliable_sent, 10);
}

#[tokio::test(start_paused = true)]
async fn test_lost_request_times_out() {
    let mut f = Fixture::new();
    f.mesh.set_drop_rate(1.0).unwrap();

    f.client.set(&mut f.client_node, 9).unwrap();
    f.serve();
    f.settle().await;

    assert_eq!(f.reports(), vec![(ByteStatus::NoReply, None)]);
    assert_eq!(*f.stored.lock().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_missing_publish_address_keeps_client_idle() {
    let mesh = LocalMesh::new();
    let mut node = mesh.add_node(CLIENT_ADDR, 1).unwrap();
    let metrics = Arc::new(Metrics::new());
    let mut client = ByteClient::builder()
        .on_status(|_, _, _| {})
        .metrics(metrics.clone())
        .init(&mut node)
        .unwrap();

    assert_eq!(
        client.set(&mut node, 1),
        Err(ModelError::InvalidAddressConfig)
    );
    assert!(!client.is_busy());
    assert_eq!(metrics.snapshot().reliable_requests, 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_client_on_same_element_rejected() {
    let mesh = LocalMesh::new();
    let mut node = mesh.add_node(CLIENT_ADDR, 2).unwrap();

    let _first = ByteClient::builder()
        .on_status(|_, _, _| {})
        .init(&mut node)
        .unwrap();
    let second = ByteClient::builder().on_status(|_, _, _| {}).init(&mut node);
    assert!(matches!(second, Err(ModelError::AlreadyBound { .. })));

    let other_element = ByteClient::builder()
        .on_status(|_, _, _| {})
        .element_index(1)
        .init(&mut node)
        .unwrap();
    assert_eq!(node.model_address(other_element.handle()), Some(Address(0x0101)));
}

#[tokio::test(start_paused = true)]
async fn test_publish_period_reaches_client_callback() {
    let mesh = LocalMesh::new();
    let mut node = mesh.add_node(CLIENT_ADDR, 1).unwrap();
    let ticks = Arc::new(Mutex::new(0u32));
    let counter = ticks.clone();
    let mut client = ByteClient::builder()
        .on_status(|_, _, _| {})
        .on_publish_timeout(move |_| *counter.lock().unwrap() += 1)
        .init(&mut node)
        .unwrap();

    node.set_publish_period(client.handle(), Some(Duration::from_secs(1)))
        .unwrap();
    for _ in 0..3 {
        let event = node.next_event().await.unwrap();
        client.handle_event(&mut node, &event);
    }
    assert_eq!(*ticks.lock().unwrap(), 3);
}
