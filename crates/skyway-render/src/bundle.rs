//! site download bundles.
//!
//! a bundle is the concatenation of a site's YAML documents in a fixed
//! order: service account, role, role binding, router config map,
//! deployment, site-api service (kube only), the site secret, link config
//! maps, access-point config maps, and (for bootstrap-ready sites) the
//! access-point secrets.

use crate::Result;
use crate::site::{
    AccessPointParams, LinkParams, Platform, SecretParams, SiteIdentity, access_point_config_map,
    deployment, link_config_map, role, role_binding, router_config_map, service_account,
    site_api_service, site_secret, to_yaml,
};

/// everything needed to render a site's download bundle.
#[derive(Debug, Clone)]
pub struct BundleParams {
    /// the site's identity.
    pub site: SiteIdentity,

    /// the site's client-credential secret.
    pub site_secret: SecretParams,

    /// outgoing links, in priority order.
    pub links: Vec<LinkParams>,

    /// access points on the site.
    pub access_points: Vec<AccessPointParams>,

    /// server-credential secrets for the site's access points; only
    /// populated for `ready-bootstrap` sites.
    pub access_point_secrets: Vec<SecretParams>,
}

/// render the full bundle as one multi-document YAML string.
pub fn site_bundle(params: &BundleParams) -> Result<String> {
    let mut docs = vec![
        service_account(&params.site),
        role(&params.site),
        role_binding(&params.site),
        router_config_map(&params.site),
        deployment(&params.site),
    ];
    if params.site.platform == Platform::Kube {
        docs.push(site_api_service(&params.site));
    }
    docs.push(site_secret(&params.site_secret));
    for link in &params.links {
        docs.push(link_config_map(link));
    }
    for ap in &params.access_points {
        docs.push(access_point_config_map(ap));
    }
    for secret in &params.access_point_secrets {
        docs.push(site_secret(secret));
    }

    let mut out = String::new();
    for doc in &docs {
        if !out.is_empty() {
            out.push_str("---\n");
        }
        out.push_str(&to_yaml(doc)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::site::RouterMode;

    fn params() -> BundleParams {
        let mut data = BTreeMap::new();
        data.insert("tls.crt".to_string(), "Y2VydA==".to_string());
        BundleParams {
            site: SiteIdentity {
                name: "s1".to_string(),
                id: "3".to_string(),
                mode: RouterMode::Interior,
                platform: Platform::Kube,
                network_id: None,
                tenant_id: None,
            },
            site_secret: SecretParams {
                name: "skx-site-3".to_string(),
                state_key: "tls-site-3".to_string(),
                state_hash: "h".to_string(),
                inject: Some("site".to_string()),
                data,
            },
            links: vec![LinkParams {
                id: "5".to_string(),
                host: "peer.example.com".to_string(),
                port: "55671".to_string(),
                cost: "1".to_string(),
            }],
            access_points: vec![AccessPointParams {
                id: "9".to_string(),
                kind: "manage".to_string(),
                bind_host: None,
            }],
            access_point_secrets: vec![],
        }
    }

    #[test]
    fn bundle_contains_documents_in_order() {
        let yaml = site_bundle(&params()).unwrap();
        let kinds: Vec<&str> = yaml
            .lines()
            .filter_map(|l| l.strip_prefix("kind: "))
            .collect();
        assert_eq!(
            kinds,
            vec![
                "ServiceAccount",
                "Role",
                "RoleBinding",
                "ConfigMap",
                "Deployment",
                "Service",
                "Secret",
                "ConfigMap",
                "ConfigMap",
            ]
        );
    }

    #[test]
    fn non_kube_bundle_omits_service() {
        let mut p = params();
        p.site.platform = Platform::Docker;
        let yaml = site_bundle(&p).unwrap();
        assert!(!yaml.contains("kind: Service\n"));
    }

    #[test]
    fn bootstrap_bundle_appends_access_point_secrets() {
        let mut p = params();
        p.access_point_secrets.push(SecretParams {
            name: "skx-ap-9".to_string(),
            state_key: "tls-server-9".to_string(),
            state_hash: "h2".to_string(),
            inject: Some("accesspoint".to_string()),
            data: BTreeMap::new(),
        });
        let yaml = site_bundle(&p).unwrap();
        assert!(yaml.contains("tls-server-9"));
    }
}
