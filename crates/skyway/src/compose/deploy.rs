//! application deployment: expand allocated instances per member site.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value, json};
use tracing::{debug, info};

use skyway_db::{SkywayDb, ops};
use skyway_render::{expand, hash_of_data, hash_of_text};
use skyway_types::{MemberId, MemberSite, StateKey, VanId};

use crate::compose::build::BuiltApplication;
use crate::compose::library::BlockBody;
use crate::compose::ComposeEngine;
use crate::error::Result;

/// deploy a built application to a VAN. every member site whose classes
/// intersect an allocated instance's site classes receives the expanded
/// configuration in the site-data table; the per-member app-state cache
/// is refreshed for the sync bridge. returns the affected members.
pub async fn deploy(
    engine: &ComposeEngine,
    db: &SkywayDb,
    built: &BuiltApplication,
    van: VanId,
) -> Result<Vec<MemberId>> {
    let txn = db.begin().await?;
    ops::insert_deployed_application(&txn, built.id, van).await?;

    let members = ops::list_members_for_van(&txn, van).await?;
    let mut affected = Vec::new();
    let mut log = Vec::new();

    for member in &members {
        let mut docs: Vec<(usize, String)> = Vec::new();

        for (index, instance) in built.instances.iter().enumerate() {
            if !instance.allocate_to_site {
                continue;
            }
            if !classes_intersect(&instance.site_classes, &member.site_classes) {
                continue;
            }
            let BlockBody::Simple {
                templates,
                defaults,
            } = &instance.block.body
            else {
                continue;
            };

            // library defaults overlaid with instance config overlaid
            // with member metadata
            let mut local = defaults.clone();
            for (key, value) in &instance.config {
                local.insert(key.clone(), value.clone());
            }
            for (key, value) in &member.metadata {
                local.insert(key.clone(), value.clone());
            }

            let platform = member
                .metadata
                .get("platform")
                .and_then(Value::as_str)
                .unwrap_or("kube");

            let mut expanded = String::new();
            for template in templates {
                if let Some(platforms) = &template.target_platforms
                    && !platforms.iter().any(|p| p == platform)
                {
                    continue;
                }

                let remote = remote_scope(built, index, template.affinity.as_deref(), member);
                let mut unresolvable = BTreeSet::new();
                match expand(&template.template, &local, &remote, &mut unresolvable) {
                    Ok(text) => {
                        if !expanded.is_empty() {
                            expanded.push('\n');
                        }
                        expanded.push_str(&text);
                    }
                    Err(e) => log.push(format!("deploy {}: {e}", instance.path)),
                }
                for path in unresolvable {
                    log.push(format!(
                        "deploy {} for {}: unresolved {path}",
                        instance.path, member.name
                    ));
                }
            }

            if !expanded.is_empty() {
                docs.push((index, expanded));
            }
        }

        if docs.is_empty() {
            continue;
        }

        let combined = docs
            .iter()
            .map(|(_, doc)| doc.as_str())
            .collect::<Vec<_>>()
            .join("\n---\n");
        let hash = hash_of_text(&combined);
        ops::replace_site_data(&txn, member.id, built.id, &combined, &hash).await?;

        engine.store_app_state(member.id, app_state_entries(built, &docs));
        affected.push(member.id);
        debug!(member = %member.id, bytes = combined.len(), "site data written");
    }

    let lifecycle = if log.is_empty() {
        "deployed"
    } else {
        "deploy-errors"
    };
    ops::set_application_outcome(&txn, built.id, lifecycle, &log).await?;
    txn.commit().await.map_err(skyway_db::Error::from)?;

    info!(application = %built.id, van = %van, members = affected.len(), lifecycle,
          "application deployed");
    Ok(affected)
}

fn classes_intersect(a: &[String], b: &[String]) -> bool {
    a.iter().any(|class| b.contains(class))
}

/// the remote scope exposed to one template expansion.
fn remote_scope(
    built: &BuiltApplication,
    index: usize,
    affinity: Option<&str>,
    member: &MemberSite,
) -> Value {
    let mut remote = Map::new();

    // the instance's single bound peer, when unambiguous
    let peers: Vec<(&str, &(usize, String))> = built.instances[index]
        .interfaces
        .iter()
        .flat_map(|(name, iface)| iface.peers.iter().map(move |peer| (name.as_str(), peer)))
        .collect();
    if let [(_, peer)] = peers.as_slice() {
        let (peerif, peerblock) = peer_scope(built, peer);
        remote.insert("peerif".to_string(), peerif);
        remote.insert("peerblock".to_string(), peerblock);
    }

    // the peer through the template's affinity interface
    if let Some(affinity) = affinity
        && let Some(iface) = built.instances[index].interfaces.get(affinity)
        && let [peer] = iface.peers.as_slice()
    {
        let (affif, affblock) = peer_scope(built, peer);
        remote.insert("affif".to_string(), affif);
        remote.insert("affblock".to_string(), affblock);
    }

    remote.insert(
        "site".to_string(),
        json!({"metadata": member.metadata}),
    );
    Value::Object(remote)
}

fn peer_scope(built: &BuiltApplication, peer: &(usize, String)) -> (Value, Value) {
    let instance = &built.instances[peer.0];
    let iface = &instance.interfaces[&peer.1];
    let peerif = json!({
        "name": peer.1,
        "role": iface.spec.role,
        "polarity": iface.spec.polarity.as_str(),
    });
    let peerblock = json!({
        "path": instance.path,
        "block": instance.block.name,
        "config": instance.config,
    });
    (peerif, peerblock)
}

/// the state entries advertised to the member's router for this
/// application.
fn app_state_entries(
    built: &BuiltApplication,
    docs: &[(usize, String)],
) -> BTreeMap<String, (String, Value)> {
    let mut entries = BTreeMap::new();

    for (index, doc) in docs {
        let key = StateKey::Component(built.instances[*index].row_id.0.to_string()).to_string();
        entries.insert(key, (hash_of_text(doc), json!({"yaml": doc})));
    }

    for binding in &built.bindings {
        let touches_site = docs
            .iter()
            .any(|(index, _)| *index == binding.north.0 || *index == binding.south.0);
        if !touches_site {
            continue;
        }
        let key = StateKey::Interface {
            role: binding.role.clone(),
            binding: binding.row_id,
        }
        .to_string();
        let data = json!({
            "role": binding.role,
            "north": built.instances[binding.north.0].path,
            "south": built.instances[binding.south.0].path,
        });
        let hash = hash_of_data(data.as_object().expect("binding scope is an object"));
        entries.insert(key, (hash, data));
    }

    entries
}
