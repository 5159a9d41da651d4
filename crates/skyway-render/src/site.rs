//! deterministic YAML manifests for a site's cluster resources.
//!
//! every function here is a pure map from row data to a single YAML
//! document. documents are built as json values (serde_json maps are
//! key-ordered) and serialized once, so identical inputs always produce
//! identical bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::Result;

/// container image for the router.
pub const ROUTER_IMAGE: &str = "quay.io/skyway/router:latest";

/// container image for the dataplane sidecar.
pub const DATAPLANE_IMAGE: &str = "quay.io/skyway/dataplane:latest";

/// router operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterMode {
    /// a backbone router.
    Interior,
    /// a member-site router.
    Edge,
}

impl RouterMode {
    /// wire string form used in the router config.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouterMode::Interior => "interior",
            RouterMode::Edge => "edge",
        }
    }
}

/// target platform of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// kubernetes.
    Kube,
    /// docker compose.
    Docker,
    /// podman.
    Podman,
}

impl Platform {
    /// true when the platform runs the dataplane sidecar.
    pub fn has_dataplane(&self) -> bool {
        matches!(self, Platform::Kube)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::Kube => "kube",
            Platform::Docker => "docker",
            Platform::Podman => "podman",
        };
        f.write_str(s)
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "kube" => Ok(Platform::Kube),
            "docker" => Ok(Platform::Docker),
            "podman" => Ok(Platform::Podman),
            other => Err(format!("unknown platform: {other:?}")),
        }
    }
}

/// the identity a site's manifests are rendered for.
#[derive(Debug, Clone)]
pub struct SiteIdentity {
    /// site name, used as the resource-name stem.
    pub name: String,

    /// the site's row id, as a string.
    pub id: String,

    /// interior for backbone sites, edge for members.
    pub mode: RouterMode,

    /// target platform.
    pub platform: Platform,

    /// VAN identifier for edge routers.
    pub network_id: Option<String>,

    /// tenant identifier for edge routers.
    pub tenant_id: Option<String>,
}

impl SiteIdentity {
    fn resource_name(&self, suffix: &str) -> String {
        format!("skx-{}-{suffix}", self.name)
    }
}

/// the site's service account.
pub fn service_account(site: &SiteIdentity) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ServiceAccount",
        "metadata": {
            "name": site.resource_name("router"),
        },
    })
}

/// the site's role. backbone routers may manage secrets and config maps;
/// member routers only read them.
pub fn role(site: &SiteIdentity) -> Value {
    let verbs = match site.mode {
        RouterMode::Interior => json!(["get", "list", "watch", "create", "update", "delete"]),
        RouterMode::Edge => json!(["get", "list", "watch"]),
    };
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "Role",
        "metadata": {
            "name": site.resource_name("router"),
        },
        "rules": [
            {
                "apiGroups": [""],
                "resources": ["secrets", "configmaps"],
                "verbs": verbs,
            },
        ],
    })
}

/// binds the site's role to its service account.
pub fn role_binding(site: &SiteIdentity) -> Value {
    json!({
        "apiVersion": "rbac.authorization.k8s.io/v1",
        "kind": "RoleBinding",
        "metadata": {
            "name": site.resource_name("router"),
        },
        "roleRef": {
            "apiGroup": "rbac.authorization.k8s.io",
            "kind": "Role",
            "name": site.resource_name("router"),
        },
        "subjects": [
            {
                "kind": "ServiceAccount",
                "name": site.resource_name("router"),
            },
        ],
    })
}

/// the router configuration config map.
pub fn router_config_map(site: &SiteIdentity) -> Value {
    let mut router = serde_json::Map::new();
    router.insert("mode".to_string(), json!(site.mode.as_str()));
    router.insert("siteId".to_string(), json!(site.id));
    if let Some(network_id) = &site.network_id {
        router.insert("networkId".to_string(), json!(network_id));
    }
    if let Some(tenant_id) = &site.tenant_id {
        router.insert("tenantId".to_string(), json!(tenant_id));
    }
    let router_json =
        serde_json::to_string(&Value::Object(router)).unwrap_or_else(|_| "{}".to_string());

    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": site.resource_name("router-config"),
        },
        "data": {
            "router.json": router_json,
        },
    })
}

/// the router deployment. the dataplane sidecar is included only on
/// platforms that run it.
pub fn deployment(site: &SiteIdentity) -> Value {
    let mut containers = vec![json!({
        "name": "router",
        "image": ROUTER_IMAGE,
        "volumeMounts": [
            {
                "name": "router-config",
                "mountPath": "/etc/skyway",
            },
        ],
    })];
    if site.platform.has_dataplane() {
        containers.push(json!({
            "name": "dataplane",
            "image": DATAPLANE_IMAGE,
        }));
    }

    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": site.resource_name("router"),
        },
        "spec": {
            "replicas": 1,
            "selector": {
                "matchLabels": {
                    "app": site.resource_name("router"),
                },
            },
            "template": {
                "metadata": {
                    "labels": {
                        "app": site.resource_name("router"),
                    },
                },
                "spec": {
                    "serviceAccountName": site.resource_name("router"),
                    "containers": containers,
                    "volumes": [
                        {
                            "name": "router-config",
                            "configMap": {
                                "name": site.resource_name("router-config"),
                            },
                        },
                    ],
                },
            },
        },
    })
}

/// the site-api service (kube only).
pub fn site_api_service(site: &SiteIdentity) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": site.resource_name("site-api"),
        },
        "spec": {
            "selector": {
                "app": site.resource_name("router"),
            },
            "ports": [
                {
                    "name": "site-api",
                    "port": 8080,
                    "targetPort": 8080,
                },
            ],
        },
    })
}

/// parameters for an annotated secret document.
#[derive(Debug, Clone)]
pub struct SecretParams {
    /// resource name.
    pub name: String,

    /// the state key this secret is synchronized under.
    pub state_key: String,

    /// content hash of the data map.
    pub state_hash: String,

    /// optional tls-inject target ("site" or "accesspoint").
    pub inject: Option<String>,

    /// secret data (base64-encoded values).
    pub data: BTreeMap<String, String>,
}

/// a secret annotated for state synchronization.
pub fn site_secret(params: &SecretParams) -> Value {
    let mut annotations = serde_json::Map::new();
    annotations.insert("state-dir".to_string(), json!("remote"));
    annotations.insert("state-key".to_string(), json!(params.state_key));
    annotations.insert("state-hash".to_string(), json!(params.state_hash));
    if let Some(inject) = &params.inject {
        annotations.insert("tls-inject".to_string(), json!(inject));
    }

    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": {
            "name": params.name,
            "annotations": annotations,
        },
        "type": "kubernetes.io/tls",
        "data": params.data,
    })
}

/// parameters for an outgoing-link config map.
#[derive(Debug, Clone)]
pub struct LinkParams {
    /// the link's row id, as a string.
    pub id: String,

    /// target host.
    pub host: String,

    /// target port.
    pub port: String,

    /// routing cost.
    pub cost: String,
}

/// a config map describing one outgoing link.
pub fn link_config_map(link: &LinkParams) -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": format!("skx-link-{}", link.id),
            "annotations": {
                "state-dir": "remote",
                "state-key": format!("link-{}", link.id),
                "state-type": "link",
                "state-id": link.id,
            },
        },
        "data": {
            "host": link.host,
            "port": link.port,
            "cost": link.cost,
        },
    })
}

/// parameters for an access-point config map.
#[derive(Debug, Clone)]
pub struct AccessPointParams {
    /// the access point's row id, as a string.
    pub id: String,

    /// traffic kind ("claim", "peer", "member", "manage", "van").
    pub kind: String,

    /// optional local bind host.
    pub bind_host: Option<String>,
}

/// a config map describing one access point listener.
pub fn access_point_config_map(ap: &AccessPointParams) -> Value {
    let mut data = serde_json::Map::new();
    data.insert("kind".to_string(), json!(ap.kind));
    if let Some(bind_host) = &ap.bind_host {
        data.insert("bindhost".to_string(), json!(bind_host));
    }

    json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": format!("skx-access-{}", ap.id),
            "annotations": {
                "state-dir": "remote",
                "state-key": format!("access-{}", ap.id),
                "state-type": "accesspoint",
                "state-id": ap.id,
            },
        },
        "data": data,
    })
}

/// serialize one document as YAML.
pub fn to_yaml(doc: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kube_site() -> SiteIdentity {
        SiteIdentity {
            name: "s1".to_string(),
            id: "3".to_string(),
            mode: RouterMode::Interior,
            platform: Platform::Kube,
            network_id: None,
            tenant_id: None,
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let site = kube_site();
        let a = to_yaml(&deployment(&site)).unwrap();
        let b = to_yaml(&deployment(&site)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn kube_deployment_has_two_containers() {
        let doc = deployment(&kube_site());
        let containers = doc["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0]["name"], "router");
        assert_eq!(containers[1]["name"], "dataplane");
    }

    #[test]
    fn docker_deployment_skips_dataplane() {
        let mut site = kube_site();
        site.platform = Platform::Docker;
        let doc = deployment(&site);
        let containers = doc["spec"]["template"]["spec"]["containers"]
            .as_array()
            .unwrap();
        assert_eq!(containers.len(), 1);
    }

    #[test]
    fn edge_router_config_carries_network_and_tenant() {
        let site = SiteIdentity {
            name: "m1".to_string(),
            id: "7".to_string(),
            mode: RouterMode::Edge,
            platform: Platform::Kube,
            network_id: Some("van-1".to_string()),
            tenant_id: Some("tenant-a".to_string()),
        };
        let doc = router_config_map(&site);
        let router_json = doc["data"]["router.json"].as_str().unwrap();
        let router: Value = serde_json::from_str(router_json).unwrap();
        assert_eq!(router["mode"], "edge");
        assert_eq!(router["networkId"], "van-1");
        assert_eq!(router["tenantId"], "tenant-a");
    }

    #[test]
    fn secret_carries_state_annotations() {
        let mut data = BTreeMap::new();
        data.insert("tls.crt".to_string(), "Y2VydA==".to_string());
        let doc = site_secret(&SecretParams {
            name: "skx-site-3".to_string(),
            state_key: "tls-site-3".to_string(),
            state_hash: "abc".to_string(),
            inject: Some("site".to_string()),
            data,
        });
        assert_eq!(doc["metadata"]["annotations"]["state-key"], "tls-site-3");
        assert_eq!(doc["metadata"]["annotations"]["state-hash"], "abc");
        assert_eq!(doc["metadata"]["annotations"]["tls-inject"], "site");
    }

    #[test]
    fn member_role_is_read_only() {
        let mut site = kube_site();
        site.mode = RouterMode::Edge;
        let doc = role(&site);
        let verbs = doc["rules"][0]["verbs"].as_array().unwrap();
        assert_eq!(verbs.len(), 3);
        assert!(!verbs.contains(&Value::String("delete".to_string())));
    }
}
