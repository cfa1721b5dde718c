use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::schema::EntityType;

mod entity;

pub use entity::{strip_structural, Entity, ATTR_IDENTITY, ATTR_NAME, ATTR_TYPE};

/// Store operation failures.
///
/// These are the store's whole failure contract; the request router maps
/// them to protocol-level error responses.
#[derive(Debug, PartialEq)]
pub enum StoreError {
    /// No entity matched the selector (or more than one matched a name)
    NotFound(String),
    /// A config entity of the same type already holds this name
    Conflict(String),
    /// Create/update/delete attempted on a runtime-derived type
    NotConfigType(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(detail) => write!(f, "not found: {}", detail),
            StoreError::Conflict(detail) => write!(f, "conflict: {}", detail),
            StoreError::NotConfigType(detail) => {
                write!(f, "not a config type: {}", detail)
            }
        }
    }
}

/// Entity selector: exact identity or unique name
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup {
    Identity(String),
    Name(String),
}

impl Lookup {
    fn describe(&self) -> String {
        match self {
            Lookup::Identity(identity) => format!("identity '{}'", identity),
            Lookup::Name(name) => format!("name '{}'", name),
        }
    }
}

/// One element of a batch create
pub struct CreateSpec {
    pub entity_type: Arc<EntityType>,
    pub attributes: Map<String, Value>,
}

/// One element of a batch update
pub struct UpdateSpec {
    pub lookup: Lookup,
    pub entity_type: Option<Arc<EntityType>>,
    pub attributes: Map<String, Value>,
}

/// In-memory entity table, shared by both management endpoints.
///
/// One coarse RwLock serializes mutations so the name-uniqueness check and
/// the insert are a single atomic step; reads and query snapshots take the
/// read side and only ever see fully-published entities.
pub struct EntityStore {
    entities: RwLock<HashMap<String, Entity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
        }
    }

    /// Create a config entity, minting a fresh identity.
    ///
    /// Structural `type`/`identity` keys in the payload are dropped; the
    /// stored attribute set is otherwise verbatim. Fails Conflict when the
    /// payload `name` collides with an existing entity of the same type.
    pub fn create(
        &self,
        entity_type: Arc<EntityType>,
        mut attributes: Map<String, Value>,
    ) -> Result<Entity, StoreError> {
        if !entity_type.is_config {
            return Err(StoreError::NotConfigType(format!(
                "cannot create entities of type '{}'",
                entity_type.qualified_name
            )));
        }
        strip_structural(&mut attributes);

        let mut entities = self.entities.write();
        if let Some(name) = attributes.get(ATTR_NAME).and_then(Value::as_str) {
            if Self::name_taken(&entities, &entity_type, name, None) {
                return Err(StoreError::Conflict(format!(
                    "name '{}' already exists for type '{}'",
                    name, entity_type.qualified_name
                )));
            }
        }

        let entity = Entity {
            identity: mint_identity(&entity_type),
            entity_type,
            attributes,
        };
        info!(
            identity = %entity.identity,
            entity_type = %entity.entity_type.qualified_name,
            "entity created"
        );
        entities.insert(entity.identity.clone(), entity.clone());
        Ok(entity)
    }

    /// Apply `create` to each element independently.
    ///
    /// Not transactional: element k failing does not roll back or abort its
    /// siblings. Output order matches input order.
    pub fn create_many(&self, batch: Vec<CreateSpec>) -> Vec<Result<Entity, StoreError>> {
        batch
            .into_iter()
            .map(|spec| self.create(spec.entity_type, spec.attributes))
            .collect()
    }

    /// Read one entity by identity (exact) or name (must match exactly one)
    pub fn read(
        &self,
        lookup: &Lookup,
        entity_type: Option<&EntityType>,
    ) -> Result<Entity, StoreError> {
        let entities = self.entities.read();
        Self::find(&entities, lookup, entity_type).cloned()
    }

    /// Replace an entity's full attribute set.
    ///
    /// Attributes omitted from the new map are dropped, not retained. A
    /// `name` in the new map renames the entity, subject to the same
    /// uniqueness check as create.
    pub fn update(
        &self,
        lookup: &Lookup,
        entity_type: Option<&EntityType>,
        mut attributes: Map<String, Value>,
    ) -> Result<Entity, StoreError> {
        strip_structural(&mut attributes);

        let mut entities = self.entities.write();
        let identity = Self::find(&entities, lookup, entity_type)?.identity.clone();

        let current = &entities[&identity];
        if !current.entity_type.is_config {
            return Err(StoreError::NotConfigType(format!(
                "cannot update entities of type '{}'",
                current.entity_type.qualified_name
            )));
        }
        if let Some(new_name) = attributes.get(ATTR_NAME).and_then(Value::as_str) {
            if current.name() != Some(new_name)
                && Self::name_taken(&entities, &current.entity_type, new_name, Some(identity.as_str()))
            {
                return Err(StoreError::Conflict(format!(
                    "name '{}' already exists for type '{}'",
                    new_name, current.entity_type.qualified_name
                )));
            }
        }

        let entity = entities.get_mut(&identity).unwrap();
        entity.attributes = attributes;
        Ok(entity.clone())
    }

    /// Apply `update` to each element independently, preserving order
    pub fn update_many(&self, batch: Vec<UpdateSpec>) -> Vec<Result<Entity, StoreError>> {
        batch
            .into_iter()
            .map(|spec| self.update(&spec.lookup, spec.entity_type.as_deref(), spec.attributes))
            .collect()
    }

    /// Remove an entity; its identity thereafter resolves to NotFound
    pub fn delete(
        &self,
        lookup: &Lookup,
        entity_type: Option<&EntityType>,
    ) -> Result<(), StoreError> {
        let mut entities = self.entities.write();
        let found = Self::find(&entities, lookup, entity_type)?;
        if !found.entity_type.is_config {
            return Err(StoreError::NotConfigType(format!(
                "cannot delete entities of type '{}'",
                found.entity_type.qualified_name
            )));
        }
        let identity = found.identity.clone();
        entities.remove(&identity);
        info!(identity = %identity, "entity deleted");
        Ok(())
    }

    /// Point-in-time snapshot of every entity, for the query engine
    pub fn list_all(&self) -> Vec<Entity> {
        self.entities.read().values().cloned().collect()
    }

    /// Publish a runtime-derived entity (live link, connection, address).
    ///
    /// Daemon-internal path: these entities are query-only through the
    /// management protocol, so no name-uniqueness check applies.
    pub fn insert_runtime(
        &self,
        entity_type: Arc<EntityType>,
        mut attributes: Map<String, Value>,
    ) -> Entity {
        strip_structural(&mut attributes);
        let entity = Entity {
            identity: mint_identity(&entity_type),
            entity_type,
            attributes,
        };
        self.entities
            .write()
            .insert(entity.identity.clone(), entity.clone());
        entity
    }

    fn find<'a>(
        entities: &'a HashMap<String, Entity>,
        lookup: &Lookup,
        entity_type: Option<&EntityType>,
    ) -> Result<&'a Entity, StoreError> {
        let not_found = || StoreError::NotFound(format!("no entity with {}", lookup.describe()));
        match lookup {
            Lookup::Identity(identity) => {
                let entity = entities.get(identity).ok_or_else(not_found)?;
                match entity_type {
                    Some(t) if entity.entity_type.as_ref() != t => Err(not_found()),
                    _ => Ok(entity),
                }
            }
            Lookup::Name(name) => {
                let mut matches = entities.values().filter(|e| {
                    e.name() == Some(name.as_str())
                        && entity_type.map_or(true, |t| e.entity_type.as_ref() == t)
                });
                match (matches.next(), matches.next()) {
                    (Some(entity), None) => Ok(entity),
                    _ => Err(not_found()),
                }
            }
        }
    }

    fn name_taken(
        entities: &HashMap<String, Entity>,
        entity_type: &EntityType,
        name: &str,
        exclude_identity: Option<&str>,
    ) -> bool {
        entities.values().any(|e| {
            e.entity_type.as_ref() == entity_type
                && e.name() == Some(name)
                && exclude_identity != Some(e.identity.as_str())
        })
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity format: `<shortName>/<uuid>`. Minted once, never reused.
fn mint_identity(entity_type: &EntityType) -> String {
    format!("{}/{}", entity_type.short_name, Uuid::new_v4())
}
