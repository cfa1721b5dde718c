use std::collections::HashMap;
use std::sync::Arc;

/// Namespace prefix for all qualified type names
pub const TYPE_PREFIX: &str = "io.courier.";

/// A managed entity type.
///
/// Config types can be created/updated/deleted by management clients;
/// runtime-derived types (live links, connections) are query-only and
/// enter the store through the daemon internals.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityType {
    /// Short name (e.g. "listener")
    pub short_name: String,
    /// Fully-qualified dotted name (e.g. "io.courier.listener")
    pub qualified_name: String,
    /// True if clients may create/update/delete entities of this type
    pub is_config: bool,
}

impl EntityType {
    fn new(short_name: &str, is_config: bool) -> Arc<Self> {
        Arc::new(Self {
            short_name: short_name.to_string(),
            qualified_name: format!("{}{}", TYPE_PREFIX, short_name),
            is_config,
        })
    }
}

/// Type name resolution errors
#[derive(Debug, PartialEq)]
pub enum SchemaError {
    /// No type registered under the given short or qualified name
    UnknownType(String),
    /// A type with this name is already registered
    DuplicateType(String),
}

/// Maps short and qualified type names to their registered type.
///
/// Populated once before the store accepts requests; extension types
/// declared in the daemon config register through the same path as
/// built-ins. Immutable afterwards, so lookups take no lock.
pub struct TypeRegistry {
    /// Index over both short and qualified names
    types: HashMap<String, Arc<EntityType>>,
}

impl TypeRegistry {
    /// Create an empty registry (extension-only setups, tests)
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
        }
    }

    /// Registry pre-populated with the daemon's built-in types
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, is_config) in [
            ("router", true),
            ("container", true),
            ("listener", true),
            ("log", true),
            ("router.link", false),
            ("connection", false),
            ("router.address", false),
        ] {
            // Built-in names never collide
            registry.register(name, is_config).unwrap();
        }
        registry
    }

    /// Register a type under its short name.
    ///
    /// Fails if the short or qualified name is already taken.
    pub fn register(&mut self, short_name: &str, is_config: bool) -> Result<(), SchemaError> {
        let entity_type = EntityType::new(short_name, is_config);
        if self.types.contains_key(&entity_type.short_name)
            || self.types.contains_key(&entity_type.qualified_name)
        {
            return Err(SchemaError::DuplicateType(short_name.to_string()));
        }
        self.types
            .insert(entity_type.short_name.clone(), entity_type.clone());
        self.types
            .insert(entity_type.qualified_name.clone(), entity_type);
        Ok(())
    }

    /// Resolve a short or qualified name to its registered type
    pub fn resolve(&self, name: &str) -> Result<Arc<EntityType>, SchemaError> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownType(name.to_string()))
    }

    /// All registered types, one entry per type
    pub fn all(&self) -> Vec<Arc<EntityType>> {
        let mut all: Vec<_> = self
            .types
            .iter()
            .filter(|(key, t)| **key == t.qualified_name)
            .map(|(_, t)| t.clone())
            .collect();
        all.sort_by(|a, b| a.qualified_name.cmp(&b.qualified_name));
        all
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
