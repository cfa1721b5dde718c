use super::*;
use crate::protocol::ErrorKind;
use serde_json::json;
use std::collections::HashSet;

fn agent() -> ManagementAgent {
    let mut registry = TypeRegistry::builtin();
    registry.register("dummy", true).unwrap();
    ManagementAgent::new(Arc::new(registry), Arc::new(EntityStore::new()))
}

fn request(value: Value) -> Request {
    serde_json::from_value(value).unwrap()
}

fn entity(response: Response) -> Value {
    match response {
        Response::Entity(view) => view,
        other => panic!("expected entity response, got {:?}", other),
    }
}

fn list(response: Response) -> Vec<Value> {
    match response {
        Response::List(views) => views,
        other => panic!("expected list response, got {:?}", other),
    }
}

fn error(response: Response) -> Error {
    match response {
        Response::Error(e) => e,
        other => panic!("expected error response, got {:?}", other),
    }
}

#[test]
fn crud_round_trip() {
    let agent = agent();

    // Type and name inside the attributes payload
    let created = entity(agent.handle(request(json!({
        "operation": "CREATE",
        "attributes": {"type": "io.courier.dummy", "name": "mydummy2", "arg1": "foo"}
    }))));
    assert_eq!(created["type"], json!("io.courier.dummy"));
    assert_eq!(created["name"], json!("mydummy2"));
    assert_eq!(created["arg1"], json!("foo"));

    // Type and name as top-level arguments
    let created = entity(agent.handle(request(json!({
        "operation": "CREATE",
        "type": "dummy",
        "name": "mydummy",
        "attributes": {"arg1": "foo"}
    }))));
    let identity = created["identity"].as_str().unwrap().to_string();
    assert_eq!(created["name"], json!("mydummy"));

    let by_name = entity(agent.handle(request(json!({
        "operation": "READ", "name": "mydummy"
    }))));
    assert_eq!(by_name, created);
    let by_identity = entity(agent.handle(request(json!({
        "operation": "READ", "identity": identity
    }))));
    assert_eq!(by_identity, created);

    // Full replace through a payload-selected update
    let updated = entity(agent.handle(request(json!({
        "operation": "UPDATE",
        "attributes": {"name": "mydummy", "arg1": "bar", "num1": 555}
    }))));
    assert_eq!(
        updated,
        json!({
            "type": "io.courier.dummy",
            "identity": identity,
            "name": "mydummy",
            "arg1": "bar",
            "num1": 555
        })
    );

    // Selector name outside the attributes is retained in the new set
    let updated = entity(agent.handle(request(json!({
        "operation": "UPDATE",
        "name": "mydummy",
        "attributes": {"arg1": "xxx", "num1": 888}
    }))));
    assert_eq!(updated["name"], json!("mydummy"));
    assert_eq!(updated["arg1"], json!("xxx"));

    entity(agent.handle(request(json!({
        "operation": "DELETE", "name": "mydummy"
    }))));
    let e = error(agent.handle(request(json!({
        "operation": "READ", "name": "mydummy"
    }))));
    assert_eq!(e.kind, ErrorKind::NotFound);
}

#[test]
fn create_requires_a_type() {
    let agent = agent();
    let e = error(agent.handle(request(json!({
        "operation": "CREATE",
        "attributes": {"name": "untyped"}
    }))));
    assert_eq!(e.kind, ErrorKind::BadRequest);
}

#[test]
fn unresolvable_type_is_bad_request() {
    let agent = agent();
    let e = error(agent.handle(request(json!({
        "operation": "CREATE",
        "type": "no.such.type",
        "attributes": {"name": "x"}
    }))));
    assert_eq!(e.kind, ErrorKind::BadRequest);
}

#[test]
fn disagreeing_payload_type_is_bad_request() {
    let agent = agent();
    let e = error(agent.handle(request(json!({
        "operation": "CREATE",
        "type": "dummy",
        "attributes": {"type": "listener", "name": "x"}
    }))));
    assert_eq!(e.kind, ErrorKind::BadRequest);
}

#[test]
fn top_level_name_overrides_payload_name() {
    let agent = agent();
    let created = entity(agent.handle(request(json!({
        "operation": "CREATE",
        "type": "dummy",
        "name": "outer",
        "attributes": {"name": "inner"}
    }))));
    assert_eq!(created["name"], json!("outer"));
}

#[test]
fn duplicate_name_is_conflict() {
    let agent = agent();
    agent.handle(request(json!({
        "operation": "CREATE", "type": "dummy", "name": "taken", "attributes": {}
    })));
    let e = error(agent.handle(request(json!({
        "operation": "CREATE", "type": "dummy", "name": "taken", "attributes": {}
    }))));
    assert_eq!(e.kind, ErrorKind::Conflict);
}

#[test]
fn read_without_selector_is_bad_request() {
    let agent = agent();
    let e = error(agent.handle(request(json!({"operation": "READ"}))));
    assert_eq!(e.kind, ErrorKind::BadRequest);
}

#[test]
fn batch_create_and_update() {
    let agent = agent();

    let batch: Vec<Value> = (0..3)
        .map(|i| json!({"type": "dummy", "name": format!("mydummyx{}", i)}))
        .collect();
    let created = list(agent.handle(request(json!({
        "operation": "CREATE",
        "attributes": batch
    }))));
    assert_eq!(created.len(), 3);
    let identities: HashSet<&str> = created
        .iter()
        .map(|v| v["identity"].as_str().unwrap())
        .collect();
    assert_eq!(identities.len(), 3);
    for (i, view) in created.iter().enumerate() {
        assert_eq!(view["name"], json!(format!("mydummyx{}", i)));
    }

    // Each element selects itself by name and is fully replaced
    let updates: Vec<Value> = (0..3)
        .map(|i| {
            json!({
                "type": "dummy",
                "name": format!("mydummyx{}", i),
                "arg1": "bar",
                "num1": i
            })
        })
        .collect();
    let updated = list(agent.handle(request(json!({
        "operation": "UPDATE",
        "attributes": updates
    }))));
    for (i, view) in updated.iter().enumerate() {
        assert_eq!(view["num1"], json!(i));
        assert_eq!(view["arg1"], json!("bar"));
    }
}

#[test]
fn batch_element_failure_reports_in_place() {
    let agent = agent();
    agent.handle(request(json!({
        "operation": "CREATE", "type": "dummy", "name": "taken", "attributes": {}
    })));

    let created = list(agent.handle(request(json!({
        "operation": "CREATE",
        "attributes": [
            {"type": "dummy", "name": "ok1"},
            {"type": "dummy", "name": "taken"},
            {"name": "no-type-given"},
            {"type": "dummy", "name": "ok2"}
        ]
    }))));
    assert_eq!(created.len(), 4);
    assert_eq!(created[0]["name"], json!("ok1"));
    assert_eq!(created[1]["status"], json!(409));
    assert_eq!(created[2]["status"], json!(400));
    assert_eq!(created[3]["name"], json!("ok2"));
}

#[test]
fn query_filters_and_projects() {
    let mut registry = TypeRegistry::builtin();
    registry.register("dummy", true).unwrap();
    let registry = Arc::new(registry);
    let store = Arc::new(EntityStore::new());
    let agent = ManagementAgent::new(registry.clone(), store.clone());

    for (entity_type, attributes) in [
        ("router", json!({"name": "router/test", "mode": "standalone"})),
        ("container", json!({"name": "container/test"})),
        ("listener", json!({"name": "l1", "port": 20000})),
        ("log", json!({"name": "log0", "level": "info"})),
    ] {
        agent.handle(request(json!({
            "operation": "CREATE",
            "type": entity_type,
            "attributes": attributes
        })));
    }
    store.insert_runtime(
        registry.resolve("router.link").unwrap(),
        json!({"linkDir": "in"}).as_object().unwrap().clone(),
    );
    store.insert_runtime(
        registry.resolve("connection").unwrap(),
        json!({"host": "localhost:20000"}).as_object().unwrap().clone(),
    );

    // Unfiltered query covers config and runtime-derived types
    let all = list(agent.handle(request(json!({"operation": "QUERY"}))));
    let all_types: HashSet<String> = all
        .iter()
        .map(|v| v["type"].as_str().unwrap().to_string())
        .collect();
    for t in [
        "io.courier.listener",
        "io.courier.log",
        "io.courier.container",
        "io.courier.router",
        "io.courier.router.link",
    ] {
        assert!(all_types.contains(t), "missing {}", t);
    }

    // Type-filtered query
    let listeners = list(agent.handle(request(json!({
        "operation": "QUERY", "type": "listener"
    }))));
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0]["port"], json!(20000));

    // Projection: exactly the requested keys, per entity
    let projected = list(agent.handle(request(json!({
        "operation": "QUERY",
        "attributeNames": ["type", "name"]
    }))));
    for view in &projected {
        assert!(view.as_object().unwrap().len() <= 2);
    }

    // Same (name, type) pairs with and without projection, for name-stable types
    let name_type = |views: &[Value]| -> HashSet<(String, String)> {
        let ignore = ["io.courier.router.link", "io.courier.connection"];
        views
            .iter()
            .filter(|v| !ignore.contains(&v["type"].as_str().unwrap()))
            .map(|v| {
                (
                    v["name"].as_str().unwrap().to_string(),
                    v["type"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    };
    assert_eq!(name_type(&all), name_type(&projected));
}

#[test]
fn legacy_adapter_reads_but_rejects_everything_else() {
    let mut registry = TypeRegistry::builtin();
    registry.register("dummy", true).unwrap();
    let registry = Arc::new(registry);
    let store = Arc::new(EntityStore::new());
    let agent = ManagementAgent::new(registry.clone(), store.clone());
    let legacy = LegacyAdapter::new(registry, store);

    // Written through the primary address, visible through the legacy one
    let created = entity(agent.handle(request(json!({
        "operation": "CREATE", "type": "dummy", "name": "shared", "attributes": {"arg1": "foo"}
    }))));
    let read = entity(legacy.handle(request(json!({
        "operation": "READ", "name": "shared"
    }))));
    assert_eq!(read, created);

    for operation in ["CREATE", "UPDATE", "DELETE", "QUERY"] {
        let e = error(legacy.handle(request(json!({
            "operation": operation,
            "type": "dummy",
            "name": "shared",
            "attributes": {}
        }))));
        assert_eq!(e.kind, ErrorKind::Unsupported, "{}", operation);
        assert_eq!(e.status(), 501);
    }
}
