//! application build: instantiate the block tree, pair interfaces, and
//! persist the result.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use skyway_db::{SkywayDb, ops};
use skyway_types::{ApplicationId, InstanceId};

use crate::compose::library::{BlockBody, EndRef, InterfaceSpec, LibraryBlock, Polarity};
use crate::error::{Error, Result};

/// one interface of a built instance.
#[derive(Debug, Clone)]
pub struct BuiltInterface {
    /// the declared interface.
    pub spec: InterfaceSpec,

    /// how many bindings terminate here.
    pub bindings: u32,

    /// set when a binding was routed through this interface to a base
    /// interface below; bound-through interfaces are not unmatched.
    pub bound_through: bool,

    /// for composite interfaces: the child interface this one delegates
    /// to.
    pub delegate: Option<(usize, String)>,

    /// the far ends bound to this interface.
    pub peers: Vec<(usize, String)>,
}

/// one instantiated block.
#[derive(Debug, Clone)]
pub struct BuiltInstance {
    /// slash-separated path from the application root.
    pub path: String,

    /// the instantiated library block.
    pub block: Arc<LibraryBlock>,

    /// configuration overlay from the parent's child reference.
    pub config: Map<String, Value>,

    /// interfaces by name.
    pub interfaces: BTreeMap<String, BuiltInterface>,

    /// child name to instance index, composites only.
    pub children: BTreeMap<String, usize>,

    /// set during derivative generation for independently allocated,
    /// non-composite blocks.
    pub allocate_to_site: bool,

    /// site classes this instance deploys to.
    pub site_classes: Vec<String>,

    /// the persisted instance row.
    pub row_id: InstanceId,
}

/// one resolved binding between two base interfaces.
#[derive(Debug, Clone)]
pub struct BuiltBinding {
    /// the shared interface role.
    pub role: String,

    /// (instance index, interface name) of the north end.
    pub north: (usize, String),

    /// (instance index, interface name) of the south end.
    pub south: (usize, String),

    /// the persisted binding row id.
    pub row_id: i64,
}

/// a fully built application.
#[derive(Debug, Clone)]
pub struct BuiltApplication {
    /// the application row id.
    pub id: ApplicationId,

    /// the application name.
    pub name: String,

    /// index of the root instance.
    pub root: usize,

    /// every instance, root first.
    pub instances: Vec<BuiltInstance>,

    /// every resolved binding.
    pub bindings: Vec<BuiltBinding>,

    /// unmatched-interface warnings.
    pub warnings: Vec<String>,

    /// binding and typing errors.
    pub errors: Vec<String>,
}

/// build an application and persist its derived rows.
pub async fn build(db: &SkywayDb, id: ApplicationId) -> Result<BuiltApplication> {
    let app = ops::get_application(db.conn(), id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("application {id}")))?;

    let library = load_library(db, &app.root_block).await?;

    let mut instances = Vec::new();
    instantiate(&library, &app.root_block, "/".to_string(), Map::new(), &mut instances)?;

    let mut errors = Vec::new();
    wire_delegations(&mut instances, &mut errors);
    let mut bindings = wire_bindings(&mut instances, &mut errors);
    let warnings = unmatched_interfaces(&instances);
    derive_allocation(&mut instances);

    // persist the instance tree and bindings
    let txn = db.begin().await?;
    for instance in &mut instances {
        let row = ops::insert_instance(
            &txn,
            id,
            &instance.path,
            instance.block.id,
            &Value::Object(instance.config.clone()),
        )
        .await?;
        ops::set_instance_allocation(
            &txn,
            row.id,
            instance.allocate_to_site,
            &instance.site_classes,
        )
        .await?;
        instance.row_id = row.id;
    }
    for binding in &mut bindings {
        let row = ops::insert_binding(
            &txn,
            id,
            &binding.role,
            instances[binding.north.0].row_id,
            &binding.north.1,
            instances[binding.south.0].row_id,
            &binding.south.1,
        )
        .await?;
        binding.row_id = row.id;
    }

    let lifecycle = if !errors.is_empty() {
        "build-errors"
    } else if !warnings.is_empty() {
        "build-warnings"
    } else {
        "built"
    };
    let mut log = errors.clone();
    log.extend(warnings.iter().cloned());
    ops::set_application_outcome(&txn, id, lifecycle, &log).await?;
    txn.commit().await.map_err(skyway_db::Error::from)?;

    debug!(application = %id, lifecycle, instances = instances.len(),
           bindings = bindings.len(), "application built");

    Ok(BuiltApplication {
        id,
        name: app.name,
        root: 0,
        instances,
        bindings,
        warnings,
        errors,
    })
}

/// load the root block and, transitively, every child block it names.
async fn load_library(
    db: &SkywayDb,
    root: &str,
) -> Result<BTreeMap<String, Arc<LibraryBlock>>> {
    let mut library = BTreeMap::new();
    let mut pending = vec![root.to_string()];

    while let Some(name) = pending.pop() {
        if library.contains_key(&name) {
            continue;
        }
        let row = ops::get_library_block_latest(db.conn(), &name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("library block {name:?}")))?;
        let block_type = ops::get_block_type(db.conn(), &row.block_type)
            .await?
            .ok_or_else(|| Error::NotFound(format!("block type {:?}", row.block_type)))?;
        let block = Arc::new(LibraryBlock::from_row(&row, &block_type)?);
        if let BlockBody::Composite { children, .. } = &block.body {
            for child in children.values() {
                pending.push(child.block.clone());
            }
        }
        library.insert(name, block);
    }
    Ok(library)
}

/// instantiate a block and, recursively, its children. returns the new
/// instance's index.
fn instantiate(
    library: &BTreeMap<String, Arc<LibraryBlock>>,
    block_name: &str,
    path: String,
    config: Map<String, Value>,
    instances: &mut Vec<BuiltInstance>,
) -> Result<usize> {
    let block = library
        .get(block_name)
        .ok_or_else(|| Error::NotFound(format!("library block {block_name:?}")))?
        .clone();

    let interfaces = block
        .interfaces
        .iter()
        .map(|(name, spec)| {
            (
                name.clone(),
                BuiltInterface {
                    spec: spec.clone(),
                    bindings: 0,
                    bound_through: false,
                    delegate: None,
                    peers: Vec::new(),
                },
            )
        })
        .collect();

    let index = instances.len();
    instances.push(BuiltInstance {
        path: path.clone(),
        block: block.clone(),
        config,
        interfaces,
        children: BTreeMap::new(),
        allocate_to_site: false,
        site_classes: Vec::new(),
        row_id: InstanceId(0),
    });

    if let BlockBody::Composite { children, .. } = &block.body {
        for (child_name, child_ref) in children {
            let child_path = if path == "/" {
                format!("/{child_name}")
            } else {
                format!("{path}/{child_name}")
            };
            let child_index = instantiate(
                library,
                &child_ref.block,
                child_path,
                child_ref.config.clone(),
                instances,
            )?;
            instances[index].children.insert(child_name.clone(), child_index);
        }
    }

    Ok(index)
}

/// record `super` bindings as interface delegations. a super binding does
/// not create a binding at the composite level.
fn wire_delegations(instances: &mut Vec<BuiltInstance>, errors: &mut Vec<String>) {
    for index in 0..instances.len() {
        let Some(composite_bindings) = composite_bindings(&instances[index]) else {
            continue;
        };
        for binding in composite_bindings {
            let (super_end, child_end) = match (binding.north.is_super(), binding.south.is_super())
            {
                (true, false) => (binding.north.clone(), binding.south.clone()),
                (false, true) => (binding.south.clone(), binding.north.clone()),
                (true, true) => {
                    errors.push(format!(
                        "{}: binding connects two super interfaces",
                        instances[index].path
                    ));
                    continue;
                }
                (false, false) => continue,
            };
            match resolve_child_end(instances, index, &child_end) {
                Ok(target) => {
                    if let Some(iface) =
                        instances[index].interfaces.get_mut(&super_end.interface)
                    {
                        iface.delegate = Some(target);
                    } else {
                        errors.push(format!(
                            "{}: super binding names unknown interface {:?}",
                            instances[index].path, super_end.interface
                        ));
                    }
                }
                Err(e) => errors.push(e),
            }
        }
    }
}

/// create bindings for every composite binding connecting two children.
fn wire_bindings(instances: &mut Vec<BuiltInstance>, errors: &mut Vec<String>) -> Vec<BuiltBinding> {
    let mut bindings = Vec::new();

    for index in 0..instances.len() {
        let Some(composite_bindings) = composite_bindings(&instances[index]) else {
            continue;
        };
        for declared in composite_bindings {
            if declared.north.is_super() || declared.south.is_super() {
                continue;
            }

            let north_start = match resolve_child_end(instances, index, &declared.north) {
                Ok(start) => start,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let south_start = match resolve_child_end(instances, index, &declared.south) {
                Ok(start) => start,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            let north = match resolve_base(instances, north_start) {
                Ok(base) => base,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let south = match resolve_base(instances, south_start) {
                Ok(base) => base,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            if let Err(e) = validate_pair(instances, &north, &south) {
                errors.push(e);
                continue;
            }

            let role = instances[north.0].interfaces[&north.1].spec.role.clone();
            record_binding(instances, &north, &south);
            bindings.push(BuiltBinding {
                role,
                north,
                south,
                row_id: 0,
            });
        }
    }

    bindings
}

fn composite_bindings(
    instance: &BuiltInstance,
) -> Option<Vec<crate::compose::library::CompositeBinding>> {
    match &instance.block.body {
        BlockBody::Composite { bindings, .. } => Some(bindings.clone()),
        BlockBody::Simple { .. } => None,
    }
}

fn resolve_child_end(
    instances: &[BuiltInstance],
    composite: usize,
    end: &EndRef,
) -> std::result::Result<(usize, String), String> {
    let child_name = end.child.as_deref().expect("caller checked is_super");
    let child = instances[composite]
        .children
        .get(child_name)
        .copied()
        .ok_or_else(|| {
            format!(
                "{}: binding names unknown child {child_name:?}",
                instances[composite].path
            )
        })?;
    Ok((child, end.interface.clone()))
}

/// walk downward through delegations to the base interface, marking every
/// intermediate interface bound-through.
fn resolve_base(
    instances: &mut [BuiltInstance],
    start: (usize, String),
) -> std::result::Result<(usize, String), String> {
    let (mut index, mut iface_name) = start;
    loop {
        let instance = &mut instances[index];
        let Some(iface) = instance.interfaces.get_mut(&iface_name) else {
            return Err(format!(
                "{}: no interface named {iface_name:?}",
                instance.path
            ));
        };
        match iface.delegate.clone() {
            Some((next_index, next_iface)) => {
                iface.bound_through = true;
                index = next_index;
                iface_name = next_iface;
            }
            None => return Ok((index, iface_name)),
        }
    }
}

fn validate_pair(
    instances: &[BuiltInstance],
    north: &(usize, String),
    south: &(usize, String),
) -> std::result::Result<(), String> {
    let north_iface = &instances[north.0].interfaces[&north.1];
    let south_iface = &instances[south.0].interfaces[&south.1];

    if north_iface.spec.polarity != Polarity::North {
        return Err(format!(
            "{}.{}: expected a north-polarity interface",
            instances[north.0].path, north.1
        ));
    }
    if south_iface.spec.polarity != Polarity::South {
        return Err(format!(
            "{}.{}: expected a south-polarity interface",
            instances[south.0].path, south.1
        ));
    }
    if north_iface.spec.role != south_iface.spec.role {
        return Err(format!(
            "role mismatch: {}.{} is {:?}, {}.{} is {:?}",
            instances[north.0].path,
            north.1,
            north_iface.spec.role,
            instances[south.0].path,
            south.1,
            south_iface.spec.role
        ));
    }
    for (iface, end) in [(north_iface, north), (south_iface, south)] {
        if let Some(max) = iface.spec.max_bindings
            && iface.bindings >= max
        {
            return Err(format!(
                "{}.{}: binding budget of {max} exhausted",
                instances[end.0].path, end.1
            ));
        }
    }
    Ok(())
}

fn record_binding(instances: &mut [BuiltInstance], north: &(usize, String), south: &(usize, String)) {
    {
        let iface = instances[north.0].interfaces.get_mut(&north.1).expect("validated");
        iface.bindings += 1;
        iface.peers.push(south.clone());
    }
    {
        let iface = instances[south.0].interfaces.get_mut(&south.1).expect("validated");
        iface.bindings += 1;
        iface.peers.push(north.clone());
    }
}

/// interfaces with no bindings that were never bound through, and that do
/// not delegate, are unmatched.
fn unmatched_interfaces(instances: &[BuiltInstance]) -> Vec<String> {
    let mut warnings = Vec::new();
    for instance in instances {
        for (name, iface) in &instance.interfaces {
            if iface.bindings == 0 && !iface.bound_through && iface.delegate.is_none() {
                warnings.push(format!("unmatched interface {}.{name}", instance.path));
            }
        }
    }
    warnings
}

/// derivative generation: independently allocated, non-composite blocks
/// deploy to sites.
fn derive_allocation(instances: &mut [BuiltInstance]) {
    for instance in instances {
        instance.allocate_to_site =
            instance.block.allocation == "independent" && instance.block.body.is_simple();
        if !instance.allocate_to_site {
            continue;
        }
        // site classes from the instance config, falling back to the
        // block's defaults
        let from_config = instance.config.get("siteClasses").cloned();
        let from_defaults = match &instance.block.body {
            BlockBody::Simple { defaults, .. } => defaults.get("siteClasses").cloned(),
            BlockBody::Composite { .. } => None,
        };
        instance.site_classes = from_config
            .or(from_defaults)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
    }
}
