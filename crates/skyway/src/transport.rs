//! messaging transport: in-process sessions over an address-routed bus.
//!
//! the bus stands in for the VAN's router fabric: deliveries are routed to
//! whichever receiver is attached to the destination address. each
//! [`Session`] owns one anonymous producer and one dynamically addressed
//! reply receiver; outbound requests embed a correlation id and the reply
//! address, and replies are matched back to the waiting caller from the
//! session's in-flight table.
//!
//! the physical fabric binding (TLS sessions into router access points) is
//! an external collaborator; everything above the address/delivery
//! abstraction is identical either way.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// one routed message.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// destination address.
    pub to: String,

    /// where replies should be sent, for request/reply exchanges.
    pub reply_to: Option<String>,

    /// correlation id matching a reply to its request.
    pub correlation_id: Option<u64>,

    /// application properties.
    pub app_properties: BTreeMap<String, String>,

    /// message body.
    pub body: Value,
}

struct BusInner {
    routes: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
    next_dynamic: AtomicU64,
}

/// an in-process address-routed message fabric.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                routes: Mutex::new(HashMap::new()),
                next_dynamic: AtomicU64::new(1),
            }),
        }
    }

    /// attach a new session.
    pub fn session(&self) -> Session {
        Session::attach(self.clone())
    }

    fn allocate_dynamic_address(&self) -> String {
        let n = self.inner.next_dynamic.fetch_add(1, Ordering::Relaxed);
        format!("reply/{n}")
    }

    fn register(&self, address: &str, tx: mpsc::UnboundedSender<Delivery>) {
        let mut routes = self.inner.routes.lock().expect("bus mutex poisoned");
        routes.insert(address.to_string(), tx);
    }

    fn unregister(&self, address: &str) {
        let mut routes = self.inner.routes.lock().expect("bus mutex poisoned");
        routes.remove(address);
    }

    fn route(&self, delivery: Delivery) -> Result<()> {
        let routes = self.inner.routes.lock().expect("bus mutex poisoned");
        let Some(tx) = routes.get(&delivery.to) else {
            return Err(Error::NoRoute(delivery.to));
        };
        tx.send(delivery.clone())
            .map_err(|_| Error::NoRoute(delivery.to))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new()
    }
}

/// a receiver attached to one address.
///
/// the caller drains `rx`; dropping the receiver leaves the address
/// registered until the session closes.
pub struct Receiver {
    /// the address the receiver is attached to.
    pub address: String,

    /// the delivery stream.
    pub rx: mpsc::UnboundedReceiver<Delivery>,
}

struct SessionInner {
    bus: MessageBus,
    reply_address: String,
    in_flight: Mutex<HashMap<u64, oneshot::Sender<Delivery>>>,
    next_correlation: AtomicU64,
    /// every address this session registered, released on close.
    addresses: Mutex<Vec<String>>,
}

/// a point-to-point session on the bus.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    fn attach(bus: MessageBus) -> Self {
        let reply_address = bus.allocate_dynamic_address();
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        bus.register(&reply_address, tx);

        let session = Self {
            inner: Arc::new(SessionInner {
                bus,
                reply_address: reply_address.clone(),
                in_flight: Mutex::new(HashMap::new()),
                next_correlation: AtomicU64::new(1),
                addresses: Mutex::new(vec![reply_address]),
            }),
        };

        // route replies to their waiting requests
        let dispatch = session.clone();
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                dispatch.dispatch_reply(delivery);
            }
        });

        session
    }

    fn dispatch_reply(&self, delivery: Delivery) {
        let Some(correlation_id) = delivery.correlation_id else {
            debug!("dropping uncorrelated delivery on reply address");
            return;
        };
        let waiter = {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .expect("session mutex poisoned");
            in_flight.remove(&correlation_id)
        };
        match waiter {
            Some(tx) => {
                let _ = tx.send(delivery);
            }
            None => debug!(correlation_id, "reply arrived after its waiter was cleared"),
        }
    }

    /// the session's dynamic reply address.
    pub fn reply_address(&self) -> &str {
        &self.inner.reply_address
    }

    /// send a one-way message.
    pub fn send_message(
        &self,
        to: &str,
        body: Value,
        app_properties: BTreeMap<String, String>,
    ) -> Result<()> {
        self.inner.bus.route(Delivery {
            to: to.to_string(),
            reply_to: None,
            correlation_id: None,
            app_properties,
            body,
        })
    }

    /// send a request and wait for the correlated reply.
    ///
    /// on timeout the waiter is cleared and [`Error::Timeout`] returned;
    /// a late reply is dropped.
    pub async fn request(
        &self,
        to: &str,
        body: Value,
        app_properties: BTreeMap<String, String>,
        timeout: Duration,
    ) -> Result<Delivery> {
        let correlation_id = self.inner.next_correlation.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        {
            let mut in_flight = self
                .inner
                .in_flight
                .lock()
                .expect("session mutex poisoned");
            in_flight.insert(correlation_id, tx);
        }

        let sent = self.inner.bus.route(Delivery {
            to: to.to_string(),
            reply_to: Some(self.inner.reply_address.clone()),
            correlation_id: Some(correlation_id),
            app_properties,
            body,
        });
        if let Err(e) = sent {
            self.clear_waiter(correlation_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(delivery)) => Ok(delivery),
            Ok(Err(_)) => {
                self.clear_waiter(correlation_id);
                Err(Error::Internal("reply channel closed".to_string()))
            }
            Err(_) => {
                self.clear_waiter(correlation_id);
                Err(Error::Timeout(to.to_string()))
            }
        }
    }

    fn clear_waiter(&self, correlation_id: u64) {
        let mut in_flight = self
            .inner
            .in_flight
            .lock()
            .expect("session mutex poisoned");
        in_flight.remove(&correlation_id);
    }

    /// reply to a request delivery.
    pub fn send_reply(&self, request: &Delivery, body: Value) -> Result<()> {
        let Some(reply_to) = &request.reply_to else {
            warn!(to = %request.to, "request carried no reply address");
            return Ok(());
        };
        self.inner.bus.route(Delivery {
            to: reply_to.clone(),
            reply_to: None,
            correlation_id: request.correlation_id,
            app_properties: BTreeMap::new(),
            body,
        })
    }

    /// open a receiver. with `Some(address)` the receiver is static;
    /// with `None` the bus assigns a dynamic address.
    pub fn open_receiver(&self, address: Option<&str>) -> Receiver {
        let address = match address {
            Some(a) => a.to_string(),
            None => self.inner.bus.allocate_dynamic_address(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.bus.register(&address, tx);
        self.inner
            .addresses
            .lock()
            .expect("session mutex poisoned")
            .push(address.clone());
        Receiver { address, rx }
    }

    /// open a sender toward one destination. resolves once the session
    /// is sendable, which for an in-process bus is as soon as the reply
    /// address exists.
    pub async fn open_sender(&self, to: &str) -> Sender {
        Sender {
            session: self.clone(),
            to: to.to_string(),
        }
    }

    /// detach every address this session registered.
    pub fn close(&self) {
        let addresses = {
            let mut held = self
                .inner
                .addresses
                .lock()
                .expect("session mutex poisoned");
            std::mem::take(&mut *held)
        };
        for address in addresses {
            self.inner.bus.unregister(&address);
        }
    }
}

/// a producer bound to one destination address.
pub struct Sender {
    session: Session,
    to: String,
}

impl Sender {
    /// send a one-way message to the bound destination.
    pub fn send(&self, body: Value, app_properties: BTreeMap<String, String>) -> Result<()> {
        self.session.send_message(&self.to, body, app_properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn send_and_receive() {
        let bus = MessageBus::new();
        let sender = bus.session();
        let receiver_session = bus.session();
        let mut receiver = receiver_session.open_receiver(Some("svc/a"));

        sender
            .send_message("svc/a", json!({"n": 1}), BTreeMap::new())
            .unwrap();

        let delivery = receiver.rx.recv().await.unwrap();
        assert_eq!(delivery.body["n"], 1);
        assert!(delivery.reply_to.is_none());
    }

    #[tokio::test]
    async fn send_to_unrouted_address_fails() {
        let bus = MessageBus::new();
        let sender = bus.session();
        let result = sender.send_message("nowhere", json!({}), BTreeMap::new());
        assert!(matches!(result, Err(Error::NoRoute(_))));
    }

    #[tokio::test]
    async fn request_reply_round_trip() {
        let bus = MessageBus::new();
        let client = bus.session();
        let server = bus.session();
        let mut receiver = server.open_receiver(Some("svc/echo"));

        tokio::spawn(async move {
            while let Some(request) = receiver.rx.recv().await {
                let body = json!({"echo": request.body});
                server.send_reply(&request, body).unwrap();
            }
        });

        let reply = client
            .request(
                "svc/echo",
                json!({"q": 42}),
                BTreeMap::new(),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply.body["echo"]["q"], 42);
    }

    #[tokio::test]
    async fn request_times_out_and_clears_waiter() {
        let bus = MessageBus::new();
        let client = bus.session();
        let server = bus.session();
        // receiver exists but never replies
        let _receiver = server.open_receiver(Some("svc/silent"));

        let result = client
            .request(
                "svc/silent",
                json!({}),
                BTreeMap::new(),
                Duration::from_millis(50),
            )
            .await;
        assert!(matches!(result, Err(Error::Timeout(_))));

        // the in-flight table must not leak the waiter
        let in_flight = client.inner.in_flight.lock().unwrap();
        assert!(in_flight.is_empty());
    }

    #[tokio::test]
    async fn concurrent_requests_correlate_independently() {
        let bus = MessageBus::new();
        let client = bus.session();
        let server = bus.session();
        let mut receiver = server.open_receiver(Some("svc/slow"));

        tokio::spawn(async move {
            let mut pending = Vec::new();
            while let Some(request) = receiver.rx.recv().await {
                pending.push(request);
                if pending.len() == 2 {
                    // reply in reverse order of arrival
                    for request in pending.drain(..).rev() {
                        let body = json!({"v": request.body["v"]});
                        server.send_reply(&request, body).unwrap();
                    }
                }
            }
        });

        let (a, b) = tokio::join!(
            client.request("svc/slow", json!({"v": 1}), BTreeMap::new(), Duration::from_secs(1)),
            client.request("svc/slow", json!({"v": 2}), BTreeMap::new(), Duration::from_secs(1)),
        );
        assert_eq!(a.unwrap().body["v"], 1);
        assert_eq!(b.unwrap().body["v"], 2);
    }

    #[tokio::test]
    async fn close_releases_addresses() {
        let bus = MessageBus::new();
        let session = bus.session();
        let _receiver = session.open_receiver(Some("svc/tmp"));
        session.close();

        let sender = bus.session();
        let result = sender.send_message("svc/tmp", json!({}), BTreeMap::new());
        assert!(matches!(result, Err(Error::NoRoute(_))));
    }

    #[tokio::test]
    async fn dynamic_receiver_addresses_are_unique() {
        let bus = MessageBus::new();
        let session = bus.session();
        let a = session.open_receiver(None);
        let b = session.open_receiver(None);
        assert_ne!(a.address, b.address);
    }

    #[tokio::test]
    async fn bound_sender_delivers_to_its_destination() {
        let bus = MessageBus::new();
        let producer = bus.session();
        let consumer = bus.session();
        let mut receiver = consumer.open_receiver(Some("svc/b"));

        let sender = producer.open_sender("svc/b").await;
        sender.send(json!({"n": 7}), BTreeMap::new()).unwrap();

        let delivery = receiver.rx.recv().await.unwrap();
        assert_eq!(delivery.body["n"], 7);
    }
}
