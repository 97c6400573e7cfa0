//! Orchestration services for the server registry.

mod registry;

pub use registry::{
    RegistryService, RegistryServiceError, RegistryServiceResult, MAX_VERSIONS_PER_SERVER,
};
