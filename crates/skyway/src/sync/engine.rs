//! the sync engine proper: peer tracking, heartbeat scheduling, and
//! manifest reconciliation.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skyway_proto::{GetState, GetStateReply, Heartbeat, Message, status};
use skyway_types::{BackboneId, PeerClass, SyncConfig};

use crate::error::Error;
use crate::sync::events::{PeerEvents, StateChange};
use crate::transport::{Delivery, Session};

/// which connection a peer or target is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKey {
    /// the default "net" connection used for beacons and extra targets.
    Net,
    /// the session opened for one backbone.
    Backbone(BackboneId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PeerKey {
    class: PeerClass,
    id: String,
}

/// a queued inbound message, tagged with the connection it arrived on.
enum InboundItem {
    Heartbeat(Heartbeat),
    Get { get: GetState, delivery: Delivery },
}

struct PeerState {
    class: PeerClass,
    connection: ConnectionKey,
    /// the peer's advertised receive address.
    address: String,
    local_state: BTreeMap<String, String>,
    remote_state: BTreeMap<String, String>,
    /// set once on_new_peer has produced the initial manifests.
    initialized: bool,
    queue: VecDeque<InboundItem>,
    /// at-most-one-in-flight processing flag.
    processing: bool,
    heartbeat_task: Option<JoinHandle<()>>,
}

struct ConnectionState {
    session: Session,
    /// our receive address on this connection, advertised in heartbeats.
    receiver_address: String,
    recv_task: JoinHandle<()>,
}

struct EngineState {
    peers: HashMap<PeerKey, PeerState>,
    connections: HashMap<ConnectionKey, ConnectionState>,
    /// addresses beaconed to until any heartbeat is heard.
    extra_targets: Vec<String>,
    heard_any: bool,
}

struct EngineInner {
    class: PeerClass,
    local_id: String,
    /// static receive address; dynamic when absent.
    local_address: Option<String>,
    config: SyncConfig,
    handlers: RwLock<HashMap<PeerClass, Arc<dyn PeerEvents>>>,
    state: tokio::sync::Mutex<EngineState>,
}

/// the state-sync engine. cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// create an engine for the local node `(class, id)`.
    ///
    /// with `local_address` set the engine's receivers are static;
    /// otherwise each connection gets a dynamically assigned address.
    pub fn new(
        class: PeerClass,
        local_id: String,
        local_address: Option<String>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                class,
                local_id,
                local_address,
                config,
                handlers: RwLock::new(HashMap::new()),
                state: tokio::sync::Mutex::new(EngineState {
                    peers: HashMap::new(),
                    connections: HashMap::new(),
                    extra_targets: Vec::new(),
                    heard_any: false,
                }),
            }),
        }
    }

    /// register the handler for one peer class.
    pub fn set_handler(&self, class: PeerClass, handler: Arc<dyn PeerEvents>) {
        let mut handlers = self.inner.handlers.write().expect("handler lock poisoned");
        handlers.insert(class, handler);
    }

    fn handler(&self, class: PeerClass) -> Option<Arc<dyn PeerEvents>> {
        let handlers = self.inner.handlers.read().expect("handler lock poisoned");
        handlers.get(&class).cloned()
    }

    /// add an extra beacon target for peers that are not auto-discoverable.
    pub async fn add_extra_target(&self, address: &str) {
        let mut state = self.inner.state.lock().await;
        state.extra_targets.push(address.to_string());
    }

    /// register a session under a connection key and start receiving on it.
    pub async fn add_connection(&self, key: ConnectionKey, session: Session) {
        let receiver = session.open_receiver(self.inner.local_address.as_deref());
        let receiver_address = receiver.address.clone();
        let mut rx = receiver.rx;

        let engine = self.clone();
        let recv_task = tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                engine.handle_delivery(key, delivery).await;
            }
        });

        let mut state = self.inner.state.lock().await;
        if let Some(old) = state.connections.insert(
            key,
            ConnectionState {
                session,
                receiver_address,
                recv_task,
            },
        ) {
            old.recv_task.abort();
        }
    }

    /// drop a connection. peer records survive; their next heartbeat
    /// re-binds them to whatever connection it arrives on.
    pub async fn delete_connection(&self, key: ConnectionKey) {
        let mut state = self.inner.state.lock().await;
        if let Some(conn) = state.connections.remove(&key) {
            conn.recv_task.abort();
        }
    }

    /// start the beacon phase: until any heartbeat is heard, a body-less
    /// heartbeat goes to each extra target every beacon interval.
    pub fn start(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(engine.inner.config.beacon_interval_secs);
            loop {
                tokio::time::sleep(interval).await;
                let (targets, net) = {
                    let state = engine.inner.state.lock().await;
                    if state.heard_any {
                        break;
                    }
                    let net = state
                        .connections
                        .get(&ConnectionKey::Net)
                        .map(|c| (c.session.clone(), c.receiver_address.clone()));
                    (state.extra_targets.clone(), net)
                };
                let Some((session, address)) = net else {
                    continue;
                };
                for target in targets {
                    let beacon = Message::Heartbeat(Heartbeat::new(
                        engine.inner.local_id.clone(),
                        engine.inner.class,
                        address.clone(),
                    ));
                    if let Err(e) =
                        session.send_message(&target, beacon.encode(), BTreeMap::new())
                    {
                        debug!(address = %target, error = %e, "beacon dropped");
                    }
                }
            }
        })
    }

    /// mutate one key of a peer's local manifest and fire an immediate
    /// heartbeat. `None` removes the key.
    pub async fn update_local_state(
        &self,
        class: PeerClass,
        peer_id: &str,
        key: &str,
        hash: Option<String>,
    ) {
        let peer_key = PeerKey {
            class,
            id: peer_id.to_string(),
        };
        {
            let mut state = self.inner.state.lock().await;
            let Some(peer) = state.peers.get_mut(&peer_key) else {
                debug!(peer_id, key, "local-state update for unknown peer dropped");
                return;
            };
            match hash {
                Some(hash) => {
                    peer.local_state.insert(key.to_string(), hash);
                }
                None => {
                    peer.local_state.remove(key);
                }
            }
        }
        self.send_heartbeat(peer_key).await;
    }

    /// the peer's last advertised manifest, for inspection.
    pub async fn peer_remote_state(
        &self,
        class: PeerClass,
        peer_id: &str,
    ) -> Option<BTreeMap<String, String>> {
        let state = self.inner.state.lock().await;
        state
            .peers
            .get(&PeerKey {
                class,
                id: peer_id.to_string(),
            })
            .map(|p| p.remote_state.clone())
    }

    /// the manifest we advertise to a peer, for inspection.
    pub async fn peer_local_state(
        &self,
        class: PeerClass,
        peer_id: &str,
    ) -> Option<BTreeMap<String, String>> {
        let state = self.inner.state.lock().await;
        state
            .peers
            .get(&PeerKey {
                class,
                id: peer_id.to_string(),
            })
            .map(|p| p.local_state.clone())
    }

    async fn handle_delivery(&self, conn: ConnectionKey, delivery: Delivery) {
        let message = match Message::decode(&delivery.body) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "dropping undecodable sync message");
                return;
            }
        };

        match message {
            Message::Heartbeat(hb) => self.enqueue_heartbeat(conn, hb).await,
            Message::GetState(get) => self.enqueue_get(conn, get, delivery).await,
            Message::AssertClaim(_) => {
                warn!("claim assertion arrived on a sync address; ignoring");
            }
        }
    }

    async fn enqueue_heartbeat(&self, conn: ConnectionKey, hb: Heartbeat) {
        let key = PeerKey {
            class: hb.sclass,
            id: hb.site.clone(),
        };
        let spawn_drain = {
            let mut state = self.inner.state.lock().await;
            state.heard_any = true;
            let peer = state.peers.entry(key.clone()).or_insert_with(|| PeerState {
                class: hb.sclass,
                connection: conn,
                address: hb.address.clone(),
                local_state: BTreeMap::new(),
                remote_state: BTreeMap::new(),
                initialized: false,
                queue: VecDeque::new(),
                processing: false,
                heartbeat_task: None,
            });
            peer.connection = conn;
            peer.address = hb.address.clone();
            peer.queue.push_back(InboundItem::Heartbeat(hb));
            if peer.processing {
                false
            } else {
                peer.processing = true;
                true
            }
        };
        if spawn_drain {
            let engine = self.clone();
            tokio::spawn(async move { engine.drain(key).await });
        }
    }

    async fn enqueue_get(&self, conn: ConnectionKey, get: GetState, delivery: Delivery) {
        // a pull must come from a peer we already track; reply 404 otherwise
        let spawn_drain = {
            let mut state = self.inner.state.lock().await;
            let peer_key = state.peers.keys().find(|k| k.id == get.site).cloned();
            match peer_key {
                Some(key) => match state.peers.get_mut(&key) {
                    Some(peer) => {
                        peer.queue.push_back(InboundItem::Get { get, delivery });
                        if peer.processing {
                            None
                        } else {
                            peer.processing = true;
                            Some(key)
                        }
                    }
                    None => None,
                },
                None => {
                    let reply = GetStateReply::error(status::NOT_FOUND, "unknown peer");
                    if let Some(conn_state) = state.connections.get(&conn)
                        && let Ok(body) = serde_json::to_value(&reply)
                    {
                        let _ = conn_state.session.send_reply(&delivery, body);
                    }
                    None
                }
            }
        };
        if let Some(key) = spawn_drain {
            let engine = self.clone();
            tokio::spawn(async move { engine.drain(key).await });
        }
    }

    /// drain a peer's queue, strictly one message at a time.
    async fn drain(&self, key: PeerKey) {
        loop {
            let item = {
                let mut state = self.inner.state.lock().await;
                let Some(peer) = state.peers.get_mut(&key) else {
                    return;
                };
                match peer.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        peer.processing = false;
                        return;
                    }
                }
            };
            match item {
                InboundItem::Heartbeat(hb) => self.process_heartbeat(&key, hb).await,
                InboundItem::Get { get, delivery } => self.process_get(&key, get, delivery).await,
            }
        }
    }

    async fn process_heartbeat(&self, key: &PeerKey, hb: Heartbeat) {
        let Some(handler) = self.handler(key.class) else {
            warn!(class = %key.class, "no handler registered for peer class");
            return;
        };

        let initialized = {
            let state = self.inner.state.lock().await;
            state.peers.get(key).map(|p| p.initialized).unwrap_or(false)
        };

        if !initialized {
            match handler.on_new_peer(&key.id).await {
                Ok(manifests) => {
                    let mut state = self.inner.state.lock().await;
                    if let Some(peer) = state.peers.get_mut(key) {
                        peer.local_state = manifests.local_state;
                        peer.remote_state = manifests.remote_state;
                        peer.initialized = true;
                    }
                }
                Err(e) => {
                    warn!(peer = %key.id, error = %e, "rejecting unknown peer");
                    let mut state = self.inner.state.lock().await;
                    state.peers.remove(key);
                    return;
                }
            }
            // announce our state to the new peer immediately
            self.send_heartbeat(key.clone()).await;
        } else if let Err(e) = handler.on_ping(&key.id).await {
            warn!(peer = %key.id, error = %e, "ping handler failed");
        }

        if let Some(hashset) = hb.hashset {
            self.reconcile(key, &handler, hashset).await;
        }
    }

    /// apply an incoming manifest: missing keys are deletions, hash
    /// mismatches are pulls.
    async fn reconcile(
        &self,
        key: &PeerKey,
        handler: &Arc<dyn PeerEvents>,
        hashset: BTreeMap<String, String>,
    ) {
        let (deletions, pulls, session, address) = {
            let state = self.inner.state.lock().await;
            let Some(peer) = state.peers.get(key) else {
                return;
            };
            let deletions: Vec<String> = peer
                .remote_state
                .keys()
                .filter(|k| !hashset.contains_key(*k))
                .cloned()
                .collect();
            let pulls: Vec<(String, String)> = hashset
                .iter()
                .filter(|(k, hash)| {
                    peer.remote_state.get(k.as_str()).map(String::as_str) != Some(hash.as_str())
                })
                .map(|(k, hash)| (k.clone(), hash.clone()))
                .collect();
            let session = state
                .connections
                .get(&peer.connection)
                .map(|c| c.session.clone());
            (deletions, pulls, session, peer.address.clone())
        };

        for deleted in deletions {
            if let Err(e) = handler.on_state_change(&key.id, &deleted, None).await {
                warn!(peer = %key.id, key = %deleted, error = %e, "state deletion handler failed");
                continue;
            }
            let mut state = self.inner.state.lock().await;
            if let Some(peer) = state.peers.get_mut(key) {
                peer.remote_state.remove(&deleted);
            }
        }

        let Some(session) = session else {
            debug!(peer = %key.id, "no session for peer's connection; pulls deferred");
            return;
        };
        let timeout = Duration::from_secs(self.inner.config.request_timeout_secs);

        for (state_key, advertised_hash) in pulls {
            let request = Message::GetState(GetState::new(
                self.inner.local_id.clone(),
                state_key.clone(),
            ));
            let pulled = match session
                .request(&address, request.encode(), BTreeMap::new(), timeout)
                .await
            {
                Ok(delivery) => delivery,
                Err(e) => {
                    // retried on the next heartbeat where the hash still disagrees
                    warn!(peer = %key.id, key = %state_key, error = %e, "state pull failed");
                    continue;
                }
            };
            let reply: GetStateReply = match serde_json::from_value(pulled.body) {
                Ok(r) => r,
                Err(e) => {
                    warn!(peer = %key.id, key = %state_key, error = %e, "malformed pull reply");
                    continue;
                }
            };
            let reply = match reply.into_result() {
                Ok(r) => r,
                Err(e) => {
                    warn!(peer = %key.id, key = %state_key, error = %e, "pull rejected");
                    continue;
                }
            };

            let hash = reply.hash.unwrap_or(advertised_hash);
            let change = StateChange {
                hash: hash.clone(),
                data: reply.data,
            };
            if let Err(e) = handler.on_state_change(&key.id, &state_key, Some(change)).await {
                warn!(peer = %key.id, key = %state_key, error = %e, "state change handler failed");
                continue;
            }
            let mut state = self.inner.state.lock().await;
            if let Some(peer) = state.peers.get_mut(key) {
                peer.remote_state.insert(state_key, hash);
            }
        }
    }

    async fn process_get(&self, key: &PeerKey, get: GetState, delivery: Delivery) {
        let Some(handler) = self.handler(key.class) else {
            return;
        };
        let reply = match handler.on_state_request(&key.id, &get.statekey).await {
            Ok(payload) => GetStateReply::ok(get.statekey.clone(), payload.hash, payload.data),
            Err(Error::NotFound(msg)) => GetStateReply::error(status::NOT_FOUND, msg),
            Err(e) => GetStateReply::error(status::INTERNAL, e.to_string()),
        };

        let session = {
            let state = self.inner.state.lock().await;
            state
                .peers
                .get(key)
                .and_then(|p| state.connections.get(&p.connection))
                .map(|c| c.session.clone())
        };
        if let Some(session) = session
            && let Ok(body) = serde_json::to_value(&reply)
            && let Err(e) = session.send_reply(&delivery, body)
        {
            debug!(peer = %key.id, error = %e, "pull reply dropped");
        }
    }

    /// send a heartbeat carrying the current local manifest, then schedule
    /// the next one.
    fn send_heartbeat(
        &self,
        key: PeerKey,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(self.send_heartbeat_inner(key))
    }

    async fn send_heartbeat_inner(&self, key: PeerKey) {
        let send = {
            let mut state = self.inner.state.lock().await;
            let Some(peer) = state.peers.get(&key) else {
                return;
            };
            let address = peer.address.clone();
            let local_state = peer.local_state.clone();
            let connection = peer.connection;
            let conn = state.connections.get(&connection).map(|c| {
                (c.session.clone(), c.receiver_address.clone())
            });
            // cancel any pending timer; we are about to reschedule
            if let Some(peer) = state.peers.get_mut(&key)
                && let Some(task) = peer.heartbeat_task.take()
            {
                task.abort();
            }
            conn.map(|(session, receiver_address)| (session, receiver_address, address, local_state))
        };

        if let Some((session, receiver_address, address, local_state)) = send {
            let hb = Message::Heartbeat(
                Heartbeat::new(
                    self.inner.local_id.clone(),
                    self.inner.class,
                    receiver_address,
                )
                .with_hashset(local_state),
            );
            if let Err(e) = session.send_message(&address, hb.encode(), BTreeMap::new()) {
                // dropped; the next scheduled heartbeat is the retry
                debug!(peer = %key.id, error = %e, "heartbeat dropped");
            }
        }

        self.schedule_heartbeat(key).await;
    }

    /// schedule the next heartbeat at `now + uniform(0, window) + period`.
    async fn schedule_heartbeat(&self, key: PeerKey) {
        let period = self.inner.config.heartbeat_period_secs;
        let window = self.inner.config.heartbeat_window_secs;
        let jitter_ms = if window == 0 {
            0
        } else {
            rand::rng().random_range(0..window * 1000)
        };
        let delay = Duration::from_millis(period * 1000 + jitter_ms);

        let engine = self.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.send_heartbeat(task_key).await;
        });

        let mut state = self.inner.state.lock().await;
        if let Some(peer) = state.peers.get_mut(&key) {
            if let Some(old) = peer.heartbeat_task.replace(task) {
                old.abort();
            }
        } else {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MessageBus;

    fn test_config() -> SyncConfig {
        SyncConfig {
            heartbeat_period_secs: 1,
            heartbeat_window_secs: 0,
            beacon_interval_secs: 1,
            request_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn beacons_flow_until_any_heartbeat_is_heard() {
        let bus = MessageBus::new();

        // a member node with the management controller as an extra target
        let engine = SyncEngine::new(
            PeerClass::Member,
            "7".to_string(),
            None,
            test_config(),
        );
        engine.add_connection(ConnectionKey::Net, bus.session()).await;
        engine.add_extra_target("svc/mgmt").await;
        let _beacon = engine.start();

        let controller = bus.session();
        let mut receiver = controller.open_receiver(Some("svc/mgmt"));

        // beacons are body-less heartbeats
        let delivery = tokio::time::timeout(Duration::from_secs(5), receiver.rx.recv())
            .await
            .expect("beacon arrives")
            .unwrap();
        let Ok(Message::Heartbeat(hb)) = Message::decode(&delivery.body) else {
            panic!("beacon is a heartbeat");
        };
        assert_eq!(hb.site, "7");
        assert!(hb.hashset.is_none(), "beacons carry no hashset");

        // any incoming heartbeat ends the beacon phase
        let reply = Message::Heartbeat(Heartbeat::new(
            "controller".to_string(),
            PeerClass::Management,
            "svc/mgmt".to_string(),
        ));
        controller
            .send_message(&hb.address, reply.encode(), BTreeMap::new())
            .unwrap();

        // drain anything already in flight, then expect silence
        tokio::time::sleep(Duration::from_millis(1500)).await;
        while receiver.rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(
            receiver.rx.try_recv().is_err(),
            "no beacons after a heartbeat was heard"
        );
    }
}
