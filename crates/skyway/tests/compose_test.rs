//! application compose-engine tests: build, binding resolution, and
//! per-site deployment.

use serde_json::json;

use skyway::compose::ComposeEngine;
use skyway_db::{SkywayDb, ops};
use skyway_types::{
    AccessPointKind, ApplicationNetwork, Backbone, BackboneAccessPoint, InteriorSite,
    MemberInvitation, MemberSite,
};

/// a web component (north "store") and a db service (south "store")
/// composed under one root.
async fn seed_library(db: &SkywayDb) {
    ops::insert_library_block(
        db.conn(),
        "web",
        1,
        "component",
        &json!({"store": {"polarity": "north", "role": "data", "maxBindings": 1}}),
        &json!({
            "templates": [
                {"template": "service: {{ .name }}\nregion: {{ $site.metadata.region }}"}
            ],
            "defaults": {"name": "web", "siteClasses": ["edge"]}
        }),
    )
    .await
    .unwrap();

    ops::insert_library_block(
        db.conn(),
        "db",
        1,
        "mixed",
        &json!({"store": {"polarity": "south", "role": "data"}}),
        &json!({
            "templates": [
                {"template": "database: {{ .name }}"}
            ],
            "defaults": {"name": "db", "siteClasses": ["core"]}
        }),
    )
    .await
    .unwrap();

    ops::insert_library_block(
        db.conn(),
        "app",
        1,
        "toplevel",
        &json!({}),
        &json!({
            "children": {
                "front": {"block": "web"},
                "back": {"block": "db"}
            },
            "bindings": [
                {"north": {"child": "front", "interface": "store"},
                 "south": {"child": "back", "interface": "store"}}
            ]
        }),
    )
    .await
    .unwrap();
}

/// a minimal VAN with one member carrying the given site classes.
async fn seed_van_with_member(
    db: &SkywayDb,
    classes: &[&str],
) -> (ApplicationNetwork, MemberSite) {
    let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb".to_string()))
        .await
        .unwrap();
    let site = ops::insert_site(
        db.conn(),
        &InteriorSite::new("s1".to_string(), backbone.id, "kube".to_string()),
    )
    .await
    .unwrap();
    let claim_ap = ops::insert_access_point(
        db.conn(),
        &BackboneAccessPoint::new("claim".to_string(), site.id, AccessPointKind::Claim),
    )
    .await
    .unwrap();
    let van = ops::insert_van(
        db.conn(),
        &ApplicationNetwork::new("v1".to_string(), "van-1".to_string(), backbone.id),
    )
    .await
    .unwrap();
    let invitation = ops::insert_invitation(
        db.conn(),
        &MemberInvitation::new("inv".to_string(), van.id, claim_ap.id),
    )
    .await
    .unwrap();

    let mut member = MemberSite::new("m1".to_string(), van.id, invitation.id);
    member.site_classes = classes.iter().map(|c| c.to_string()).collect();
    member
        .metadata
        .insert("region".to_string(), json!("emea"));
    let member = ops::insert_member(db.conn(), &member).await.unwrap();
    (van, member)
}

#[tokio::test]
async fn build_instantiates_and_binds_the_tree() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    let built = engine.build_application(app.id).await.unwrap();

    assert_eq!(built.instances.len(), 3);
    assert_eq!(built.instances[built.root].path, "/");
    assert_eq!(built.bindings.len(), 1);
    assert!(built.errors.is_empty(), "errors: {:?}", built.errors);
    assert!(built.warnings.is_empty(), "warnings: {:?}", built.warnings);

    // derivative generation allocated both simple components
    let allocated: Vec<&str> = built
        .instances
        .iter()
        .filter(|i| i.allocate_to_site)
        .map(|i| i.path.as_str())
        .collect();
    assert_eq!(allocated, vec!["/back", "/front"]);

    let row = ops::get_application(db.conn(), app.id).await.unwrap().unwrap();
    assert_eq!(row.lifecycle, "built");
}

#[tokio::test]
async fn unbound_interfaces_produce_warnings() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    // a root that instantiates web without binding its store interface
    ops::insert_library_block(
        db.conn(),
        "lonely",
        1,
        "toplevel",
        &json!({}),
        &json!({"children": {"front": {"block": "web"}}, "bindings": []}),
    )
    .await
    .unwrap();
    let app = ops::insert_application(db.conn(), "lonely", "lonely").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    let built = engine.build_application(app.id).await.unwrap();

    assert!(built.errors.is_empty());
    assert_eq!(built.warnings.len(), 1);
    assert!(built.warnings[0].contains("/front.store"));

    let row = ops::get_application(db.conn(), app.id).await.unwrap().unwrap();
    assert_eq!(row.lifecycle, "build-warnings");
}

#[tokio::test]
async fn super_bindings_walk_down_to_the_base_interface() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    // a connector wrapping db, exposing its store interface as its own
    ops::insert_library_block(
        db.conn(),
        "stack",
        1,
        "connector",
        &json!({"store": {"polarity": "south", "role": "data"}}),
        &json!({
            "children": {"inner": {"block": "db"}},
            "bindings": [
                {"north": {"interface": "store"},
                 "south": {"child": "inner", "interface": "store"}}
            ]
        }),
    )
    .await
    .unwrap();
    ops::insert_library_block(
        db.conn(),
        "wrapped",
        1,
        "toplevel",
        &json!({}),
        &json!({
            "children": {
                "front": {"block": "web"},
                "stack": {"block": "stack"}
            },
            "bindings": [
                {"north": {"child": "front", "interface": "store"},
                 "south": {"child": "stack", "interface": "store"}}
            ]
        }),
    )
    .await
    .unwrap();
    let app = ops::insert_application(db.conn(), "wrapped", "wrapped").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    let built = engine.build_application(app.id).await.unwrap();
    assert!(built.errors.is_empty(), "errors: {:?}", built.errors);
    assert!(built.warnings.is_empty(), "warnings: {:?}", built.warnings);

    // the binding landed on the inner db instance, not the composite
    assert_eq!(built.bindings.len(), 1);
    let south_path = &built.instances[built.bindings[0].south.0].path;
    assert_eq!(south_path, "/stack/inner");

    // the composite's pass-through interface is marked bound-through
    let stack = built
        .instances
        .iter()
        .find(|i| i.path == "/stack")
        .unwrap();
    assert!(stack.interfaces["store"].bound_through);
}

#[tokio::test]
async fn deploy_to_an_empty_van_writes_no_site_data() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let backbone = ops::insert_backbone(db.conn(), &Backbone::new("bb".to_string()))
        .await
        .unwrap();
    let van = ops::insert_van(
        db.conn(),
        &ApplicationNetwork::new("v1".to_string(), "van-1".to_string(), backbone.id),
    )
    .await
    .unwrap();
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    engine.build_application(app.id).await.unwrap();
    let affected = engine.deploy_application(app.id, van.id).await.unwrap();

    assert!(affected.is_empty());
    assert!(
        ops::list_site_data_for_application(db.conn(), app.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn deploy_expands_templates_for_matching_members() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let (van, member) = seed_van_with_member(&db, &["edge"]).await;
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    engine.build_application(app.id).await.unwrap();
    let affected = skyway::admin::Admin::new(db.clone())
        .deploy_application(&engine, app.id, van.id)
        .await
        .unwrap();
    assert_eq!(affected, vec![member.id]);

    let rows = ops::list_site_data_for_member(db.conn(), member.id).await.unwrap();
    assert_eq!(rows.len(), 1, "exactly one yaml document per site");
    assert!(rows[0].data.contains("service: web"));
    assert!(rows[0].data.contains("region: emea"), "site metadata resolves");
    assert!(
        !rows[0].data.contains("database:"),
        "the core-class db block does not deploy to an edge member"
    );

    // the app-state cache advertises the deployed component
    let state = engine.app_state_for_member(member.id);
    assert!(state.keys().any(|k| k.starts_with("component-")));
}

#[tokio::test]
async fn deploy_skips_members_with_disjoint_classes() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let (van, member) = seed_van_with_member(&db, &["warehouse"]).await;
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    engine.build_application(app.id).await.unwrap();
    let affected = engine.deploy_application(app.id, van.id).await.unwrap();

    assert!(affected.is_empty());
    assert!(
        ops::list_site_data_for_member(db.conn(), member.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn cache_invalidation_forces_a_rebuild() {
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    engine.build_application(app.id).await.unwrap();
    assert!(engine.cached(app.id).is_some());

    engine.invalidate(app.id);
    assert!(engine.cached(app.id).is_none());
}

#[tokio::test]
async fn deploy_empty_van_then_member_yields_one_document() {
    // the round-trip law: build then deploy to an empty van writes
    // nothing; adding one matching member yields exactly one document
    let db = SkywayDb::new_in_memory().await.unwrap();
    seed_library(&db).await;
    let (van, _member) = seed_van_with_member(&db, &["edge"]).await;
    let app = ops::insert_application(db.conn(), "shop", "app").await.unwrap();

    let engine = ComposeEngine::new(db.clone());
    engine.build_application(app.id).await.unwrap();
    let affected = engine.deploy_application(app.id, van.id).await.unwrap();
    assert_eq!(affected.len(), 1);
    let rows = ops::list_site_data_for_application(db.conn(), app.id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].hash, skyway_render::hash_of_text(&rows[0].data));
}
