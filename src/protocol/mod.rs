use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;

use crate::schema::SchemaError;
use crate::store::StoreError;

/// Primary management address
pub const ADDRESS_MANAGEMENT: &str = "/management";
/// Legacy-compatible address: same store, read-only capability subset
pub const ADDRESS_LEGACY: &str = "/management/legacy";

/// Management operation verbs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Create => "CREATE",
            Operation::Read => "READ",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Query => "QUERY",
        };
        f.write_str(verb)
    }
}

/// CREATE/UPDATE payload: one entity's attributes, or a batch.
///
/// The shape is resolved here, once, at the protocol boundary; the store
/// only ever sees the already-discriminated form.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Single(Map<String, Value>),
    Batch(Vec<Map<String, Value>>),
}

/// Decoded management request envelope
#[derive(Clone, Debug, Deserialize)]
pub struct Request {
    pub operation: Operation,
    /// Short or qualified target type name
    #[serde(default, rename = "type")]
    pub entity_type: Option<String>,
    /// Target selector: store-assigned identity
    #[serde(default)]
    pub identity: Option<String>,
    /// Target selector: name attribute
    #[serde(default)]
    pub name: Option<String>,
    /// Entity attributes for CREATE/UPDATE
    #[serde(default)]
    pub attributes: Option<Payload>,
    /// QUERY projection keys
    #[serde(default, rename = "attributeNames")]
    pub attribute_names: Option<Vec<String>>,
}

/// Protocol error categories with their wire status codes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Conflict,
    Unsupported,
}

impl ErrorKind {
    pub fn status(self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unsupported => 501,
        }
    }
}

/// Structured error response: `{status, description}`
#[derive(Clone, Debug, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn bad_request(description: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BadRequest,
            description: description.into(),
        }
    }

    pub fn unsupported(description: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Unsupported,
            description: description.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.kind.status()
    }

    pub fn to_value(&self) -> Value {
        json!({
            "status": self.status(),
            "description": self.description,
        })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status(), self.description)
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        let kind = match e {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::NotConfigType(_) => ErrorKind::BadRequest,
        };
        Self {
            kind,
            description: e.to_string(),
        }
    }
}

impl From<SchemaError> for Error {
    fn from(e: SchemaError) -> Self {
        let description = match e {
            SchemaError::UnknownType(name) => format!("unknown entity type '{}'", name),
            SchemaError::DuplicateType(name) => format!("duplicate entity type '{}'", name),
        };
        Error::bad_request(description)
    }
}

/// Management response: one entity view, a list (batch/query, input order,
/// failed batch elements as error objects in place), or an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Response {
    Entity(Value),
    List(Vec<Value>),
    Error(Error),
}

impl Response {
    pub fn status(&self) -> u16 {
        match self {
            Response::Entity(_) | Response::List(_) => 200,
            Response::Error(e) => e.status(),
        }
    }

    pub fn body(&self) -> Value {
        match self {
            Response::Entity(view) => view.clone(),
            Response::List(views) => Value::Array(views.clone()),
            Response::Error(e) => e.to_value(),
        }
    }
}

impl From<Error> for Response {
    fn from(e: Error) -> Self {
        Response::Error(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_with_single_payload_decodes() {
        let request: Request = serde_json::from_value(json!({
            "operation": "CREATE",
            "type": "dummy",
            "name": "mydummy",
            "attributes": {"arg1": "foo"}
        }))
        .unwrap();
        assert_eq!(request.operation, Operation::Create);
        assert_eq!(request.entity_type.as_deref(), Some("dummy"));
        assert!(matches!(request.attributes, Some(Payload::Single(_))));
    }

    #[test]
    fn request_with_batch_payload_decodes() {
        let request: Request = serde_json::from_value(json!({
            "operation": "UPDATE",
            "attributes": [{"name": "a"}, {"name": "b"}]
        }))
        .unwrap();
        match request.attributes {
            Some(Payload::Batch(batch)) => assert_eq!(batch.len(), 2),
            other => panic!("expected batch payload, got {:?}", other),
        }
    }

    #[test]
    fn query_request_carries_attribute_names() {
        let request: Request = serde_json::from_value(json!({
            "operation": "QUERY",
            "attributeNames": ["type", "name"]
        }))
        .unwrap();
        assert_eq!(
            request.attribute_names,
            Some(vec!["type".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn unknown_operation_is_rejected_at_decode() {
        let result: Result<Request, _> =
            serde_json::from_value(json!({"operation": "PATCH"}));
        assert!(result.is_err());
    }

    #[test]
    fn error_wire_shape() {
        let error = Error::bad_request("no type given");
        assert_eq!(
            error.to_value(),
            json!({"status": 400, "description": "no type given"})
        );
        assert_eq!(Response::from(error).status(), 400);
    }

    #[test]
    fn store_errors_map_to_protocol_statuses() {
        let not_found: Error = StoreError::NotFound("x".to_string()).into();
        assert_eq!(not_found.status(), 404);
        let conflict: Error = StoreError::Conflict("x".to_string()).into();
        assert_eq!(conflict.status(), 409);
        let bad: Error = StoreError::NotConfigType("x".to_string()).into();
        assert_eq!(bad.status(), 400);
    }
}
