//! library-block shapes: interface declarations and block bodies as
//! stored in the library-blocks table.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

use skyway_db::ops::{BlockTypeRow, LibraryBlockRow};

use crate::error::{Error, Result};

/// interface polarity. bindings pair one north end with one south end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// the consuming side.
    North,
    /// the providing side.
    South,
}

impl Polarity {
    /// the opposite polarity.
    pub fn opposite(&self) -> Polarity {
        match self {
            Polarity::North => Polarity::South,
            Polarity::South => Polarity::North,
        }
    }

    /// lowercase string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Polarity::North => "north",
            Polarity::South => "south",
        }
    }
}

impl FromStr for Polarity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "north" => Ok(Polarity::North),
            "south" => Ok(Polarity::South),
            other => Err(Error::Validation(format!("unknown polarity: {other:?}"))),
        }
    }
}

/// one declared interface on a library block.
#[derive(Debug, Clone)]
pub struct InterfaceSpec {
    /// interface name, unique within the block.
    pub name: String,

    /// interface polarity.
    pub polarity: Polarity,

    /// interface role; both ends of a binding must agree.
    pub role: String,

    /// binding budget; unlimited when absent.
    pub max_bindings: Option<u32>,
}

/// one template of a simple block body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleTemplate {
    /// the template text, expanded per member site.
    pub template: String,

    /// optional interface whose bound peer fills the template's
    /// `affif`/`affblock` scope.
    #[serde(default)]
    pub affinity: Option<String>,

    /// platforms the template applies to; all when absent.
    #[serde(default)]
    pub target_platforms: Option<Vec<String>>,
}

/// a child reference inside a composite body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChildRef {
    /// the child's library-block name (latest revision).
    pub block: String,

    /// configuration overlay for the child instance.
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// one end of a composite-body binding: a child's interface, or the
/// composite's own (`super`) interface.
#[derive(Debug, Clone, Deserialize)]
pub struct EndRef {
    /// child name; absent for a `super` reference.
    #[serde(default)]
    pub child: Option<String>,

    /// the interface name at that end.
    pub interface: String,
}

impl EndRef {
    /// true when this end names the composite's own interface.
    pub fn is_super(&self) -> bool {
        self.child.is_none()
    }
}

/// an intra-composite binding declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositeBinding {
    /// the north end.
    pub north: EndRef,

    /// the south end.
    pub south: EndRef,
}

/// a parsed block body.
#[derive(Debug, Clone)]
pub enum BlockBody {
    /// a list of templates with configuration defaults.
    Simple {
        /// the templates, expanded in order.
        templates: Vec<SimpleTemplate>,
        /// configuration defaults under the instance config.
        defaults: Map<String, Value>,
    },
    /// a map of child blocks plus intra-child bindings.
    Composite {
        /// child name to child reference.
        children: BTreeMap<String, ChildRef>,
        /// bindings among children and the composite's own interfaces.
        bindings: Vec<CompositeBinding>,
    },
}

impl BlockBody {
    /// true for simple bodies.
    pub fn is_simple(&self) -> bool {
        matches!(self, BlockBody::Simple { .. })
    }
}

/// one fully parsed library-block revision.
#[derive(Debug, Clone)]
pub struct LibraryBlock {
    /// library row id.
    pub id: i64,

    /// block name.
    pub name: String,

    /// revision number.
    pub revision: i64,

    /// block type name.
    pub block_type: String,

    /// allocation mode from the block type ("independent" or "none").
    pub allocation: String,

    /// declared interfaces by name.
    pub interfaces: BTreeMap<String, InterfaceSpec>,

    /// the block body.
    pub body: BlockBody,
}

impl LibraryBlock {
    /// parse a library row against its block type, validating that the
    /// declared interface polarities are allowed.
    pub fn from_row(row: &LibraryBlockRow, block_type: &BlockTypeRow) -> Result<Self> {
        let mut interfaces = BTreeMap::new();
        let declarations = row
            .interfaces
            .as_object()
            .cloned()
            .unwrap_or_default();
        for (name, decl) in declarations {
            let polarity: Polarity = decl
                .get("polarity")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    Error::Validation(format!(
                        "interface {name:?} of block {:?} has no polarity",
                        row.name
                    ))
                })?
                .parse()?;

            let allowed = match polarity {
                Polarity::North => block_type.allow_north,
                Polarity::South => block_type.allow_south,
            };
            if !allowed {
                return Err(Error::Validation(format!(
                    "block type {:?} does not allow {:?}-polarity interface {name:?}",
                    block_type.name, polarity
                )));
            }

            let role = decl
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or("api")
                .to_string();
            let max_bindings = decl
                .get("maxBindings")
                .and_then(Value::as_u64)
                .map(|m| m as u32);

            interfaces.insert(
                name.clone(),
                InterfaceSpec {
                    name,
                    polarity,
                    role,
                    max_bindings,
                },
            );
        }

        let body = parse_body(&row.body)
            .map_err(|e| Error::Validation(format!("block {:?}: {e}", row.name)))?;

        Ok(LibraryBlock {
            id: row.id,
            name: row.name.clone(),
            revision: row.revision,
            block_type: row.block_type.clone(),
            allocation: block_type.allocation.clone(),
            interfaces,
            body,
        })
    }
}

/// a body with a `children` map is composite; anything else is simple.
fn parse_body(body: &Value) -> Result<BlockBody> {
    if body.get("children").is_some() {
        #[derive(Deserialize)]
        struct CompositeShape {
            children: BTreeMap<String, ChildRef>,
            #[serde(default)]
            bindings: Vec<CompositeBinding>,
        }
        let shape: CompositeShape = serde_json::from_value(body.clone())
            .map_err(|e| Error::Validation(e.to_string()))?;
        Ok(BlockBody::Composite {
            children: shape.children,
            bindings: shape.bindings,
        })
    } else {
        #[derive(Deserialize)]
        struct SimpleShape {
            #[serde(default)]
            templates: Vec<SimpleTemplate>,
            #[serde(default)]
            defaults: Map<String, Value>,
        }
        let shape: SimpleShape = serde_json::from_value(body.clone())
            .map_err(|e| Error::Validation(e.to_string()))?;
        Ok(BlockBody::Simple {
            templates: shape.templates,
            defaults: shape.defaults,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(interfaces: Value, body: Value) -> LibraryBlockRow {
        LibraryBlockRow {
            id: 1,
            name: "web".to_string(),
            revision: 1,
            block_type: "component".to_string(),
            interfaces,
            body,
            created_at: chrono::Utc::now(),
        }
    }

    fn component_type() -> BlockTypeRow {
        BlockTypeRow {
            name: "component".to_string(),
            allow_north: true,
            allow_south: false,
            allocation: "independent".to_string(),
        }
    }

    #[test]
    fn parses_simple_block() {
        let block = LibraryBlock::from_row(
            &row(
                json!({"api": {"polarity": "north", "role": "api", "maxBindings": 1}}),
                json!({"templates": [{"template": "x: {{ .name }}"}], "defaults": {"name": "w"}}),
            ),
            &component_type(),
        )
        .unwrap();

        assert!(block.body.is_simple());
        let iface = &block.interfaces["api"];
        assert_eq!(iface.polarity, Polarity::North);
        assert_eq!(iface.max_bindings, Some(1));
    }

    #[test]
    fn rejects_disallowed_polarity() {
        let result = LibraryBlock::from_row(
            &row(
                json!({"serve": {"polarity": "south", "role": "api"}}),
                json!({"templates": []}),
            ),
            &component_type(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn parses_composite_block() {
        let mut block_type = component_type();
        block_type.name = "toplevel".to_string();
        block_type.allow_north = false;
        block_type.allocation = "none".to_string();

        let block = LibraryBlock::from_row(
            &row(
                json!({}),
                json!({
                    "children": {
                        "front": {"block": "web"},
                        "back": {"block": "db", "config": {"size": 10}}
                    },
                    "bindings": [
                        {"north": {"child": "front", "interface": "store"},
                         "south": {"child": "back", "interface": "store"}}
                    ]
                }),
            ),
            &block_type,
        )
        .unwrap();

        match &block.body {
            BlockBody::Composite { children, bindings } => {
                assert_eq!(children.len(), 2);
                assert_eq!(bindings.len(), 1);
                assert!(!bindings[0].north.is_super());
            }
            _ => panic!("expected composite body"),
        }
    }
}
