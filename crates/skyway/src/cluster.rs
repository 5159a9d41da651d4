//! cluster collaborator interface.
//!
//! the reconcilers talk to the cluster through the small [`Cluster`] trait:
//! apply/delete/load/list objects and watch secrets and certificates. the
//! production binding (a kubernetes client plus cert-manager) is an
//! external collaborator; [`StandaloneCluster`] is the in-process
//! implementation selected by `SKX_STANDALONE_NAMESPACE`, and
//! [`CertManagerSim`] plays the issuing authority against it so the whole
//! control loop runs without a cluster.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// object kind for secrets.
pub const KIND_SECRET: &str = "Secret";
/// object kind for certificate requests to the issuing authority.
pub const KIND_CERTIFICATE: &str = "Certificate";
/// object kind for issuers backed by a CA secret.
pub const KIND_ISSUER: &str = "Issuer";

/// annotation marking objects owned by the controller.
pub const ANN_CONTROLLED: &str = "controlled";
/// annotation linking an issued object to its certificate-request row.
pub const ANN_DBLINK: &str = "skx-dblink";
/// annotation naming the signing certificate row, or "root".
pub const ANN_ISSUERLINK: &str = "skx-issuerlink";

/// name of the external root issuer.
pub const ROOT_ISSUER: &str = "skx-root-issuer";

/// a cluster object, reduced to the fields the controller reads and writes.
#[derive(Debug, Clone)]
pub struct ClusterObject {
    /// object kind ("Secret", "Certificate", "Issuer").
    pub kind: String,

    /// object name.
    pub name: String,

    /// namespace, set by the cluster on apply.
    pub namespace: Option<String>,

    /// object annotations.
    pub annotations: BTreeMap<String, String>,

    /// data map (base64-encoded values, secrets only).
    pub data: BTreeMap<String, String>,

    /// object spec, as json.
    pub spec: Value,

    /// object status, as json.
    pub status: Value,
}

impl ClusterObject {
    /// build a certificate object for the issuing authority.
    pub fn certificate(
        name: &str,
        duration_days: i64,
        dns_names: Vec<String>,
        is_ca: bool,
        issuer_name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind: KIND_CERTIFICATE.to_string(),
            name: name.to_string(),
            namespace: None,
            annotations,
            data: BTreeMap::new(),
            spec: json!({
                "secretName": name,
                "durationDays": duration_days,
                "dnsNames": dns_names,
                "isCA": is_ca,
                "issuerRef": {"name": issuer_name},
            }),
            status: Value::Null,
        }
    }

    /// build an issuer object backed by a CA secret.
    pub fn issuer(name: &str, secret_name: &str) -> Self {
        Self {
            kind: KIND_ISSUER.to_string(),
            name: name.to_string(),
            namespace: None,
            annotations: BTreeMap::new(),
            data: BTreeMap::new(),
            spec: json!({"ca": {"secretName": secret_name}}),
            status: Value::Null,
        }
    }

    /// expiration time from the object's status.
    pub fn status_not_after(&self) -> Option<DateTime<Utc>> {
        self.status
            .get("notAfter")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// renewal time from the object's status.
    pub fn status_renewal_time(&self) -> Option<DateTime<Utc>> {
        self.status
            .get("renewalTime")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

/// the action a watch event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchAction {
    /// a new object appeared.
    Added,
    /// an existing object changed.
    Modified,
}

/// one watch event.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    /// what happened.
    pub action: WatchAction,

    /// the object after the change.
    pub object: ClusterObject,
}

/// the cluster operations the controller depends on.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// upsert an object: the cluster annotates it `controlled=true` and
    /// sets its namespace.
    async fn apply_object(&self, obj: ClusterObject) -> Result<()>;

    /// delete an object by kind and name.
    async fn delete_object(&self, kind: &str, name: &str) -> Result<()>;

    /// load an object, or nothing.
    async fn load_object(&self, kind: &str, name: &str) -> Result<Option<ClusterObject>>;

    /// list every object of one kind.
    async fn list_objects(&self, kind: &str) -> Result<Vec<ClusterObject>>;

    /// subscribe to add/modify events for one kind.
    fn watch(&self, kind: &str) -> broadcast::Receiver<WatchEvent>;

    /// load a secret by name.
    async fn load_secret(&self, name: &str) -> Result<Option<ClusterObject>> {
        self.load_object(KIND_SECRET, name).await
    }

    /// load a certificate by name.
    async fn load_certificate(&self, name: &str) -> Result<Option<ClusterObject>> {
        self.load_object(KIND_CERTIFICATE, name).await
    }
}

struct StandaloneInner {
    namespace: String,
    objects: Mutex<HashMap<(String, String), ClusterObject>>,
    senders: Mutex<HashMap<String, broadcast::Sender<WatchEvent>>>,
}

/// in-memory cluster used in standalone mode and in tests.
#[derive(Clone)]
pub struct StandaloneCluster {
    inner: Arc<StandaloneInner>,
}

impl StandaloneCluster {
    /// create an empty standalone cluster for the named namespace.
    pub fn new(namespace: &str) -> Self {
        Self {
            inner: Arc::new(StandaloneInner {
                namespace: namespace.to_string(),
                objects: Mutex::new(HashMap::new()),
                senders: Mutex::new(HashMap::new()),
            }),
        }
    }

    fn sender(&self, kind: &str) -> broadcast::Sender<WatchEvent> {
        let mut senders = self.inner.senders.lock().expect("cluster mutex poisoned");
        senders
            .entry(kind.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn emit(&self, action: WatchAction, object: ClusterObject) {
        // no subscribers is fine
        let _ = self.sender(&object.kind).send(WatchEvent { action, object });
    }
}

#[async_trait]
impl Cluster for StandaloneCluster {
    async fn apply_object(&self, mut obj: ClusterObject) -> Result<()> {
        obj.namespace = Some(self.inner.namespace.clone());
        obj.annotations
            .insert(ANN_CONTROLLED.to_string(), "true".to_string());

        let action = {
            let mut objects = self.inner.objects.lock().expect("cluster mutex poisoned");
            let key = (obj.kind.clone(), obj.name.clone());
            let action = if objects.contains_key(&key) {
                WatchAction::Modified
            } else {
                WatchAction::Added
            };
            objects.insert(key, obj.clone());
            action
        };
        debug!(kind = %obj.kind, name = %obj.name, ?action, "applied cluster object");
        self.emit(action, obj);
        Ok(())
    }

    async fn delete_object(&self, kind: &str, name: &str) -> Result<()> {
        let mut objects = self.inner.objects.lock().expect("cluster mutex poisoned");
        objects.remove(&(kind.to_string(), name.to_string()));
        Ok(())
    }

    async fn load_object(&self, kind: &str, name: &str) -> Result<Option<ClusterObject>> {
        let objects = self.inner.objects.lock().expect("cluster mutex poisoned");
        Ok(objects.get(&(kind.to_string(), name.to_string())).cloned())
    }

    async fn list_objects(&self, kind: &str) -> Result<Vec<ClusterObject>> {
        let objects = self.inner.objects.lock().expect("cluster mutex poisoned");
        Ok(objects
            .values()
            .filter(|o| o.kind == kind)
            .cloned()
            .collect())
    }

    fn watch(&self, kind: &str) -> broadcast::Receiver<WatchEvent> {
        self.sender(kind).subscribe()
    }
}

/// plays the issuing authority against a cluster: every applied
/// certificate object gets a status and an issued secret.
pub struct CertManagerSim {
    cluster: Arc<StandaloneCluster>,
}

impl CertManagerSim {
    /// create a simulator over the given cluster.
    pub fn new(cluster: Arc<StandaloneCluster>) -> Self {
        Self { cluster }
    }

    /// spawn the issuing loop.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        let mut events = self.cluster.watch(KIND_CERTIFICATE);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) if event.action == WatchAction::Added => {
                        if let Err(e) = self.issue(event.object).await {
                            warn!(error = %e, "simulated issuer failed");
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "simulated issuer lagged behind the watch");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    async fn issue(&self, mut certificate: ClusterObject) -> Result<()> {
        let secret_name = certificate
            .spec
            .get("secretName")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Cluster("certificate without secretName".to_string()))?
            .to_string();
        let duration_days = certificate
            .spec
            .get("durationDays")
            .and_then(Value::as_i64)
            .unwrap_or(90);

        let now = Utc::now();
        let not_after = now + Duration::days(duration_days);
        let renewal_time = now + Duration::days(duration_days * 2 / 3);
        certificate.status = json!({
            "notAfter": not_after.to_rfc3339(),
            "renewalTime": renewal_time.to_rfc3339(),
        });
        self.cluster.apply_object(certificate.clone()).await?;

        let pem = fake_pem(&certificate.name);
        let mut data = BTreeMap::new();
        data.insert("tls.crt".to_string(), BASE64_STANDARD.encode(&pem));
        data.insert(
            "tls.key".to_string(),
            BASE64_STANDARD.encode(format!("key:{}", certificate.name)),
        );
        data.insert("ca.crt".to_string(), BASE64_STANDARD.encode(&pem));

        // the issuing authority copies the request annotations onto the
        // secret, which is how finalization finds the owning request
        let secret = ClusterObject {
            kind: KIND_SECRET.to_string(),
            name: secret_name,
            namespace: None,
            annotations: certificate.annotations.clone(),
            data,
            spec: Value::Null,
            status: Value::Null,
        };
        self.cluster.apply_object(secret).await
    }
}

fn fake_pem(name: &str) -> String {
    format!(
        "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
        BASE64_STANDARD.encode(name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn apply_annotates_and_namespaces() {
        let cluster = StandaloneCluster::new("skx");
        cluster
            .apply_object(ClusterObject::issuer("iss", "sec"))
            .await
            .unwrap();

        let obj = cluster.load_object(KIND_ISSUER, "iss").await.unwrap().unwrap();
        assert_eq!(obj.namespace.as_deref(), Some("skx"));
        assert_eq!(obj.annotations.get(ANN_CONTROLLED).unwrap(), "true");
    }

    #[tokio::test]
    async fn watch_delivers_added_then_modified() {
        let cluster = StandaloneCluster::new("skx");
        let mut watch = cluster.watch(KIND_SECRET);

        let secret = ClusterObject {
            kind: KIND_SECRET.to_string(),
            name: "s1".to_string(),
            namespace: None,
            annotations: BTreeMap::new(),
            data: BTreeMap::new(),
            spec: Value::Null,
            status: Value::Null,
        };
        cluster.apply_object(secret.clone()).await.unwrap();
        cluster.apply_object(secret).await.unwrap();

        let first = watch.recv().await.unwrap();
        assert_eq!(first.action, WatchAction::Added);
        let second = watch.recv().await.unwrap();
        assert_eq!(second.action, WatchAction::Modified);
    }

    #[tokio::test]
    async fn simulator_issues_secret_for_certificate() {
        let cluster = Arc::new(StandaloneCluster::new("skx"));
        let _issuer = CertManagerSim::new(cluster.clone()).spawn();

        let mut secrets = cluster.watch(KIND_SECRET);

        let mut annotations = BTreeMap::new();
        annotations.insert(ANN_DBLINK.to_string(), "7".to_string());
        cluster
            .apply_object(ClusterObject::certificate(
                "skx-site-1",
                90,
                vec![],
                false,
                ROOT_ISSUER,
                annotations,
            ))
            .await
            .unwrap();

        let event = tokio::time::timeout(std::time::Duration::from_secs(1), secrets.recv())
            .await
            .expect("secret should be issued")
            .unwrap();
        assert_eq!(event.object.name, "skx-site-1");
        assert_eq!(event.object.annotations.get(ANN_DBLINK).unwrap(), "7");
        assert!(event.object.data.contains_key("tls.crt"));

        // the certificate object gained expiration status
        let cert = cluster
            .load_certificate("skx-site-1")
            .await
            .unwrap()
            .unwrap();
        assert!(cert.status_not_after().is_some());
        assert!(cert.status_renewal_time().is_some());
    }
}
