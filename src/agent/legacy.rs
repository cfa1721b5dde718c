use std::sync::Arc;
use tracing::warn;

use super::read_entity;
use crate::protocol::{Error, Operation, Request, Response};
use crate::schema::TypeRegistry;
use crate::store::EntityStore;

/// Capability-restricted facade for the legacy management address.
///
/// Holds the same store and registry as the primary agent, so it observes
/// every write made through the primary address. Only READ is supported;
/// every other verb is rejected here rather than deeper in the stack.
pub struct LegacyAdapter {
    registry: Arc<TypeRegistry>,
    store: Arc<EntityStore>,
}

impl LegacyAdapter {
    pub fn new(registry: Arc<TypeRegistry>, store: Arc<EntityStore>) -> Self {
        Self { registry, store }
    }

    pub fn handle(&self, request: Request) -> Response {
        match request.operation {
            Operation::Read => read_entity(&self.registry, &self.store, &request)
                .unwrap_or_else(Response::Error),
            unsupported => {
                warn!(operation = %unsupported, "operation not supported on legacy address");
                Response::Error(Error::unsupported(format!(
                    "operation {} not supported by the legacy management interface",
                    unsupported
                )))
            }
        }
    }
}
