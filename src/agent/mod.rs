use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::warn;

use crate::protocol::{Error, Operation, Payload, Request, Response};
use crate::query::QueryEngine;
use crate::schema::{EntityType, TypeRegistry};
use crate::store::{CreateSpec, EntityStore, Lookup, UpdateSpec, ATTR_NAME};

mod legacy;
#[cfg(test)]
mod tests;

pub use legacy::LegacyAdapter;

/// Request router for the primary management address.
///
/// Decodes each request's target, resolves type names against the registry,
/// reconciles top-level `name`/`type` arguments with payload keys, and
/// dispatches to the store or query engine. All failures surface here as
/// structured error responses; nothing below this layer panics outward.
pub struct ManagementAgent {
    registry: Arc<TypeRegistry>,
    store: Arc<EntityStore>,
    engine: QueryEngine,
}

impl ManagementAgent {
    pub fn new(registry: Arc<TypeRegistry>, store: Arc<EntityStore>) -> Self {
        let engine = QueryEngine::new(store.clone());
        Self {
            registry,
            store,
            engine,
        }
    }

    pub fn handle(&self, request: Request) -> Response {
        let operation = request.operation;
        let result = match operation {
            Operation::Create => self.create(request),
            Operation::Read => read_entity(&self.registry, &self.store, &request),
            Operation::Update => self.update(request),
            Operation::Delete => self.delete(&request),
            Operation::Query => self.query(&request),
        };
        result.unwrap_or_else(|e| {
            warn!(%operation, status = e.status(), description = %e.description, "request rejected");
            Response::Error(e)
        })
    }

    fn create(&self, mut request: Request) -> Result<Response, Error> {
        match request.attributes.take() {
            Some(Payload::Batch(batch)) => {
                // Per-element independence: a bad element reports in place
                // and never aborts its siblings.
                let mut slots = Vec::with_capacity(batch.len());
                let mut specs = Vec::new();
                for attributes in batch {
                    match self.create_spec(request.entity_type.as_deref(), None, attributes) {
                        Ok(spec) => {
                            slots.push(None);
                            specs.push(spec);
                        }
                        Err(e) => slots.push(Some(e)),
                    }
                }
                let created = self.store.create_many(specs);
                Ok(Response::List(merge_batch(slots, created)))
            }
            payload => {
                let attributes = match payload {
                    Some(Payload::Single(map)) => map,
                    _ => Map::new(),
                };
                let spec = self.create_spec(
                    request.entity_type.as_deref(),
                    request.name.as_deref(),
                    attributes,
                )?;
                let entity = self.store.create(spec.entity_type, spec.attributes)?;
                Ok(Response::Entity(entity.view()))
            }
        }
    }

    /// Reconcile top-level type/name arguments with payload keys.
    ///
    /// The explicit top-level value is authoritative and is merged into the
    /// stored attribute set; a payload `type` disagreeing with the resolved
    /// top-level type is rejected rather than silently overridden.
    fn create_spec(
        &self,
        top_type: Option<&str>,
        top_name: Option<&str>,
        mut attributes: Map<String, Value>,
    ) -> Result<CreateSpec, Error> {
        let entity_type = self
            .effective_type(top_type, &attributes)?
            .ok_or_else(|| Error::bad_request("CREATE requires an entity type"))?;
        if let Some(name) = top_name {
            attributes.insert(ATTR_NAME.to_string(), Value::String(name.to_string()));
        }
        Ok(CreateSpec {
            entity_type,
            attributes,
        })
    }

    fn update(&self, mut request: Request) -> Result<Response, Error> {
        match request.attributes.take() {
            None => Err(Error::bad_request("UPDATE requires attributes")),
            Some(Payload::Batch(batch)) => {
                let mut slots = Vec::with_capacity(batch.len());
                let mut specs = Vec::new();
                for attributes in batch {
                    match self.update_spec(&request, attributes, true) {
                        Ok(spec) => {
                            slots.push(None);
                            specs.push(spec);
                        }
                        Err(e) => slots.push(Some(e)),
                    }
                }
                let updated = self.store.update_many(specs);
                Ok(Response::List(merge_batch(slots, updated)))
            }
            Some(Payload::Single(attributes)) => {
                let spec = self.update_spec(&request, attributes, false)?;
                let entity =
                    self.store
                        .update(&spec.lookup, spec.entity_type.as_deref(), spec.attributes)?;
                Ok(Response::Entity(entity.view()))
            }
        }
    }

    /// Build one update element: selector from the top-level arguments or,
    /// for batch elements, from the element's own identity/name keys.
    fn update_spec(
        &self,
        request: &Request,
        mut attributes: Map<String, Value>,
        batch_element: bool,
    ) -> Result<UpdateSpec, Error> {
        let entity_type = self.effective_type(request.entity_type.as_deref(), &attributes)?;
        let top_name = if batch_element {
            None
        } else {
            request.name.as_deref()
        };
        let top_identity = if batch_element {
            None
        } else {
            request.identity.as_deref()
        };

        let lookup = selector(
            top_identity,
            top_name,
            attributes.get("identity").and_then(Value::as_str),
            attributes.get(ATTR_NAME).and_then(Value::as_str),
        )
        .ok_or_else(|| Error::bad_request("UPDATE requires a name or identity"))?;

        // Selector name becomes part of the replacement attribute set, so an
        // update that omits it from the payload does not strip the name.
        if let Some(name) = top_name {
            attributes.insert(ATTR_NAME.to_string(), Value::String(name.to_string()));
        }
        Ok(UpdateSpec {
            lookup,
            entity_type,
            attributes,
        })
    }

    fn delete(&self, request: &Request) -> Result<Response, Error> {
        let entity_type = self.resolve_optional(request.entity_type.as_deref())?;
        let lookup = selector(request.identity.as_deref(), request.name.as_deref(), None, None)
            .ok_or_else(|| Error::bad_request("DELETE requires a name or identity"))?;
        self.store.delete(&lookup, entity_type.as_deref())?;
        Ok(Response::Entity(Value::Object(Map::new())))
    }

    fn query(&self, request: &Request) -> Result<Response, Error> {
        let type_filter = self.resolve_optional(request.entity_type.as_deref())?;
        let views = self.engine.query(
            type_filter.as_deref(),
            request.attribute_names.as_deref(),
        );
        Ok(Response::List(views))
    }

    fn resolve_optional(&self, name: Option<&str>) -> Result<Option<Arc<EntityType>>, Error> {
        match name {
            Some(name) => Ok(Some(self.registry.resolve(name)?)),
            None => Ok(None),
        }
    }

    /// Effective type of one payload element: top-level argument first,
    /// falling back to the payload's own `type` key.
    fn effective_type(
        &self,
        top_type: Option<&str>,
        attributes: &Map<String, Value>,
    ) -> Result<Option<Arc<EntityType>>, Error> {
        let payload_type = attributes.get("type").and_then(Value::as_str);
        match (top_type, payload_type) {
            (Some(top), Some(payload)) => {
                let resolved = self.registry.resolve(top)?;
                let from_payload = self.registry.resolve(payload)?;
                if resolved != from_payload {
                    return Err(Error::bad_request(format!(
                        "payload type '{}' disagrees with requested type '{}'",
                        payload, top
                    )));
                }
                Ok(Some(resolved))
            }
            (Some(top), None) => Ok(Some(self.registry.resolve(top)?)),
            (None, Some(payload)) => Ok(Some(self.registry.resolve(payload)?)),
            (None, None) => Ok(None),
        }
    }
}

/// READ shared by the primary agent and the legacy adapter: both entry
/// points observe the same store.
pub(crate) fn read_entity(
    registry: &TypeRegistry,
    store: &EntityStore,
    request: &Request,
) -> Result<Response, Error> {
    let entity_type = match request.entity_type.as_deref() {
        Some(name) => Some(registry.resolve(name)?),
        None => None,
    };
    let lookup = selector(request.identity.as_deref(), request.name.as_deref(), None, None)
        .ok_or_else(|| Error::bad_request("READ requires a name or identity"))?;
    let entity = store.read(&lookup, entity_type.as_deref())?;
    Ok(Response::Entity(entity.view()))
}

/// Zip store results back into their input-order slots; elements rejected
/// before reaching the store keep their decode error in place.
fn merge_batch(
    slots: Vec<Option<Error>>,
    results: Vec<Result<crate::store::Entity, crate::store::StoreError>>,
) -> Vec<Value> {
    let mut results = results.into_iter();
    slots
        .into_iter()
        .map(|slot| match slot {
            Some(e) => e.to_value(),
            None => match results.next() {
                Some(Ok(entity)) => entity.view(),
                Some(Err(e)) => Error::from(e).to_value(),
                // Unreachable: the store returns one result per spec
                None => Error::bad_request("batch element lost").to_value(),
            },
        })
        .collect()
}

/// Selector precedence: top-level identity, top-level name, then the
/// payload's identity/name keys.
fn selector(
    top_identity: Option<&str>,
    top_name: Option<&str>,
    payload_identity: Option<&str>,
    payload_name: Option<&str>,
) -> Option<Lookup> {
    if let Some(identity) = top_identity {
        return Some(Lookup::Identity(identity.to_string()));
    }
    if let Some(name) = top_name {
        return Some(Lookup::Name(name.to_string()));
    }
    if let Some(identity) = payload_identity {
        return Some(Lookup::Identity(identity.to_string()));
    }
    payload_name.map(|name| Lookup::Name(name.to_string()))
}
