//! Client code for shelter.
//!
//! This crate provides the network layer and the offline cache manager with
//! its host-side registration, shared by the server and integration tests.

pub mod fetch;
pub mod worker;

pub use fetch::{HttpNetwork, MemoryNetwork, Network, NetworkConfig, NetworkError};
pub use worker::{
    ClientCommand, ClientId, Dispatch, Fetched, ManagerConfig, OfflineCacheManager, Registration, RegistrationStatus,
    ResponseSource, WorkerState,
};
