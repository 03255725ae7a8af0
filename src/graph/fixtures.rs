//! Canvas snapshots shared by unit tests

use crate::graph::node_ref::Handle;
use crate::graph::types::{
    CanvasSnapshot, DataResource, ImplDataLink, ImplLink, Implementation, Process, ProcessEdge,
    Step, StepImplLink,
};

/// Steps A → B → C
pub fn chain() -> CanvasSnapshot {
    let mut snapshot = CanvasSnapshot::new(Process::new("p-chain", "Chain"));
    snapshot.steps = vec![
        Step::new("a", "Intake"),
        Step::new("b", "Review"),
        Step::new("c", "Approve"),
    ];
    snapshot.edges = vec![
        ProcessEdge { id: Some(1), ..ProcessEdge::new("a", "b") },
        ProcessEdge { id: Some(2), ..ProcessEdge::new("b", "c") },
    ];
    snapshot
}

/// Steps A → B, both implemented by X
pub fn shared_implementation() -> CanvasSnapshot {
    let mut snapshot = CanvasSnapshot::new(Process::new("p-shared", "Shared"));
    snapshot.steps = vec![Step::new("a", "Submit claim"), Step::new("b", "Assess claim")];
    snapshot.edges = vec![ProcessEdge { id: Some(1), ..ProcessEdge::new("a", "b") }];
    snapshot.implementations = vec![Implementation::new("x", "Claims service")];
    snapshot.step_impl_links = vec![
        StepImplLink { id: Some(1), ..StepImplLink::new("a", "x") },
        StepImplLink { id: Some(2), ..StepImplLink::new("b", "x") },
    ];
    snapshot
}

/// A small but complete process touching every entity and relation kind
pub fn full_process() -> CanvasSnapshot {
    let mut process = Process::new("p-orders", "Order fulfilment");
    process.channel = Some("web".to_string());
    process.entrypoints = Some(vec!["s1".to_string()]);

    let mut snapshot = CanvasSnapshot::new(process);
    snapshot.revision = Some(3);
    snapshot.steps = vec![
        Step {
            step_type: Some("automated".to_string()),
            ..Step::new("s1", "Receive order")
        },
        Step {
            description: Some("Reject orders over the credit limit".to_string()),
            step_type: Some("decision".to_string()),
            ..Step::new("s2", "Check credit")
        },
        Step::new("s3", "Ship"),
    ];
    snapshot.edges = vec![
        ProcessEdge {
            id: Some(10),
            source_handle: Some(Handle::RightOut),
            target_handle: Some(Handle::LeftIn),
            ..ProcessEdge::new("s1", "s2")
        },
        ProcessEdge {
            id: Some(11),
            edge_type: Some("conditional".to_string()),
            condition: Some("credit_ok".to_string()),
            label: Some("approved".to_string()),
            ..ProcessEdge::new("s2", "s3")
        },
    ];
    snapshot.implementations = vec![
        Implementation {
            impl_type: Some("api".to_string()),
            system: Some("oms".to_string()),
            code_ref: Some("oms/src/orders.rs".to_string()),
            ..Implementation::new("i1", "Order API")
        },
        Implementation::new("i2", "Credit service"),
        Implementation {
            impl_type: Some("job".to_string()),
            ..Implementation::new("i3", "Warehouse job")
        },
    ];
    snapshot.step_impl_links = vec![
        StepImplLink {
            id: Some(20),
            step_handle: Some(Handle::BottomOut),
            impl_handle: Some(Handle::TopIn),
            ..StepImplLink::new("s1", "i1")
        },
        StepImplLink { id: Some(21), ..StepImplLink::new("s2", "i2") },
        StepImplLink { id: Some(22), ..StepImplLink::new("s3", "i3") },
    ];
    snapshot.impl_links = vec![ImplLink {
        id: Some(30),
        label: Some("credit check".to_string()),
        ..ImplLink::new("i1", "i2")
    }];
    snapshot.data_resources = vec![
        DataResource {
            resource_type: Some("table".to_string()),
            system: Some("oms".to_string()),
            ..DataResource::new("d1", "orders")
        },
        DataResource::new("d2", "credit_scores"),
    ];
    snapshot.impl_data_links = vec![
        ImplDataLink {
            id: Some(40),
            access_type: Some("write".to_string()),
            ..ImplDataLink::new("i1", "d1")
        },
        ImplDataLink {
            id: Some(41),
            access_type: Some("read".to_string()),
            access_pattern: Some("point_lookup".to_string()),
            ..ImplDataLink::new("i2", "d2")
        },
        ImplDataLink { id: Some(42), ..ImplDataLink::new("i3", "d1") },
    ];
    snapshot
}
