//! application compose engine.
//!
//! applications are declarative compositions of typed library blocks
//! connected by polarity-constrained bindings. building an application
//! instantiates its block tree and pairs interfaces; deploying expands the
//! allocated instances' templates per member site and stores the result
//! in the site-data table.

mod build;
mod deploy;
mod library;

pub use build::{BuiltApplication, BuiltBinding, BuiltInstance};
pub use library::{
    BlockBody, ChildRef, CompositeBinding, EndRef, InterfaceSpec, LibraryBlock, Polarity,
    SimpleTemplate,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use skyway_db::SkywayDb;
use skyway_types::{ApplicationId, MemberId, VanId};

use crate::error::Result;

/// the compose engine: builds applications, deploys them to VANs, and
/// caches per-member application state for the sync bridge.
pub struct ComposeEngine {
    db: SkywayDb,
    /// copy-on-build cache; never mutated after publication.
    cache: Mutex<HashMap<i64, Arc<BuiltApplication>>>,
    /// member id -> state key -> (hash, payload), rebuilt on deploy.
    app_state: Mutex<HashMap<i64, BTreeMap<String, (String, Value)>>>,
}

impl ComposeEngine {
    /// create an engine over the database.
    pub fn new(db: SkywayDb) -> Arc<Self> {
        Arc::new(Self {
            db,
            cache: Mutex::new(HashMap::new()),
            app_state: Mutex::new(HashMap::new()),
        })
    }

    /// build an application from its library, persisting the instance
    /// tree and bindings. the result is cached until invalidated.
    pub async fn build_application(&self, id: ApplicationId) -> Result<Arc<BuiltApplication>> {
        let built = build::build(&self.db, id).await?;
        let built = Arc::new(built);
        self.cache
            .lock()
            .expect("compose cache poisoned")
            .insert(id.0, built.clone());
        Ok(built)
    }

    /// the cached build, if any.
    pub fn cached(&self, id: ApplicationId) -> Option<Arc<BuiltApplication>> {
        self.cache
            .lock()
            .expect("compose cache poisoned")
            .get(&id.0)
            .cloned()
    }

    /// drop an application from the cache.
    pub fn invalidate(&self, id: ApplicationId) {
        self.cache
            .lock()
            .expect("compose cache poisoned")
            .remove(&id.0);
    }

    /// deploy a built application to a VAN: expand templates per matching
    /// member site, store site data, and refresh the app-state cache.
    /// returns the members whose configuration changed.
    pub async fn deploy_application(
        &self,
        id: ApplicationId,
        van: VanId,
    ) -> Result<Vec<MemberId>> {
        let built = match self.cached(id) {
            Some(built) => built,
            None => self.build_application(id).await?,
        };
        deploy::deploy(self, &self.db, &built, van).await
    }

    /// the cached application state advertised for one member site.
    pub fn app_state_for_member(&self, member: MemberId) -> BTreeMap<String, (String, Value)> {
        self.app_state
            .lock()
            .expect("app state poisoned")
            .get(&member.0)
            .cloned()
            .unwrap_or_default()
    }

    /// one cached application-state entry for a member site.
    pub fn app_state_entry(&self, member: MemberId, key: &str) -> Option<(String, Value)> {
        self.app_state
            .lock()
            .expect("app state poisoned")
            .get(&member.0)
            .and_then(|entries| entries.get(key).cloned())
    }

    pub(crate) fn store_app_state(
        &self,
        member: MemberId,
        entries: BTreeMap<String, (String, Value)>,
    ) {
        self.app_state
            .lock()
            .expect("app state poisoned")
            .insert(member.0, entries);
    }
}
