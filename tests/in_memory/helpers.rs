//! Shared fixtures for in-memory integration tests.

use std::sync::Arc;

use palladio::registry::adapters::{InMemoryServerStore, StandardDescriptorValidator};
use palladio::registry::services::RegistryService;
use rstest::fixture;

use crate::test_helpers::StepClock;

/// Registry service wired to the in-memory store and a stepped clock.
pub type TestService =
    RegistryService<InMemoryServerStore, StandardDescriptorValidator, StepClock>;

/// Service plus the handles tests use to steer it.
pub struct Harness {
    /// Service under test.
    pub service: TestService,
    /// Clock shared with the service.
    pub clock: Arc<StepClock>,
}

/// Provides a fresh service, store, and clock for each test.
#[fixture]
pub fn harness() -> Harness {
    let clock = Arc::new(StepClock::new());
    let service = RegistryService::new(
        Arc::new(InMemoryServerStore::new()),
        Arc::new(StandardDescriptorValidator::new()),
        Arc::clone(&clock),
    );
    Harness { service, clock }
}
