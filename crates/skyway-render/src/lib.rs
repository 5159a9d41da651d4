//! manifest rendering for skyway.
//!
//! three concerns live here, all pure:
//! - stable content hashing of state payloads ([`hash_of_data`])
//! - the small `{{ if / variable }}` template language ([`expand`])
//! - deterministic YAML site manifests and download bundles

#![warn(missing_docs)]

mod bundle;
mod hash;
mod site;
mod template;

pub use bundle::{BundleParams, site_bundle};
pub use hash::{hash_of_data, hash_of_object_no_children, hash_of_string_map, hash_of_text};
pub use site::{
    AccessPointParams, LinkParams, Platform, RouterMode, SecretParams, SiteIdentity,
    access_point_config_map, deployment, role, role_binding, router_config_map, service_account,
    site_api_service, site_secret, to_yaml,
};
pub use template::{TemplateError, expand};

/// result type for rendering operations.
pub type Result<T> = std::result::Result<T, Error>;

/// errors that can occur while rendering manifests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// template parse failure.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// yaml serialization failure.
    #[error("yaml serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
