//! Demo resource set installed at startup

use crate::models::{NewResource, ResourceStatus};

/// The three demo instances the dashboard starts with
pub fn demo_resources() -> Vec<NewResource> {
    vec![
        NewResource::new("dev-server", 3.0, ResourceStatus::Running, 25.0),
        NewResource::new("test-server", 0.0, ResourceStatus::Idle, 15.0),
        NewResource::new("burst-server", 65.0, ResourceStatus::Running, 60.0),
    ]
}
