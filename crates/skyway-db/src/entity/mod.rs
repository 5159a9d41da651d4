//! sea-orm entity models for the skyway schema.

pub mod access_point;
pub mod application;
pub mod application_network;
pub mod backbone;
pub mod binding;
pub mod block_type;
pub mod certificate_request;
pub mod configuration;
pub mod deployed_application;
pub mod edge_link;
pub mod instance_block;
pub mod inter_router_link;
pub mod interface_role;
pub mod interior_site;
pub mod library_block;
pub mod management_controller;
pub mod member_invitation;
pub mod member_site;
pub mod network_credential;
pub mod site_data;
pub mod target_platform;
pub mod tls_certificate;
