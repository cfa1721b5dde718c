use serde_json::Value;
use std::sync::Arc;

use crate::schema::EntityType;
use crate::store::EntityStore;

/// Evaluates type/attribute-name filters over the entity store.
///
/// Queries never mutate the store: they work on a point-in-time snapshot,
/// so mutations racing a query are not reflected in its result.
pub struct QueryEngine {
    store: Arc<EntityStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// Return views of all matching entities.
    ///
    /// With no type filter, every entity of every type matches, runtime-
    /// derived ones included. Projection applies after filtering and never
    /// narrows which entities match; requested keys absent from an entity
    /// are omitted from its view rather than null-filled.
    pub fn query(
        &self,
        type_filter: Option<&EntityType>,
        attribute_names: Option<&[String]>,
    ) -> Vec<Value> {
        self.store
            .list_all()
            .into_iter()
            .filter(|entity| {
                type_filter.map_or(true, |t| entity.entity_type.as_ref() == t)
            })
            .map(|entity| match attribute_names {
                Some(names) => entity.project(names),
                None => entity.view(),
            })
            .collect()
    }
}
