use serde_json::{Map, Value};
use std::sync::Arc;

use crate::schema::EntityType;

/// Structural key reporting the qualified type on read
pub const ATTR_TYPE: &str = "type";
/// Structural key reporting the store-assigned identity on read
pub const ATTR_IDENTITY: &str = "identity";
/// Conventional attribute used as an alternate lookup key
pub const ATTR_NAME: &str = "name";

/// A managed entity: store-assigned identity, registered type, and an
/// attribute map. `type` and `identity` are structural and never live
/// inside `attributes`; they are re-attached when building views.
#[derive(Clone, Debug)]
pub struct Entity {
    pub identity: String,
    pub entity_type: Arc<EntityType>,
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// The `name` attribute, when present and a string
    pub fn name(&self) -> Option<&str> {
        self.attributes.get(ATTR_NAME).and_then(Value::as_str)
    }

    /// Full view: attributes plus structural `type`/`identity` keys
    pub fn view(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert(
            ATTR_TYPE.to_string(),
            Value::String(self.entity_type.qualified_name.clone()),
        );
        map.insert(
            ATTR_IDENTITY.to_string(),
            Value::String(self.identity.clone()),
        );
        Value::Object(map)
    }

    /// View restricted to the requested keys.
    ///
    /// Keys the entity does not carry are omitted, not null-filled.
    pub fn project(&self, attribute_names: &[String]) -> Value {
        let full = self.view();
        let mut map = Map::new();
        if let Value::Object(full) = full {
            for key in attribute_names {
                if let Some(value) = full.get(key) {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(map)
    }
}

/// Strips structural keys from an incoming attribute payload.
///
/// Clients may echo `type`/`identity` back in update payloads; they are
/// selectors, never stored attribute data.
pub fn strip_structural(attributes: &mut Map<String, Value>) {
    attributes.remove(ATTR_TYPE);
    attributes.remove(ATTR_IDENTITY);
}
