//! Video catalog access: the Invidious API, mirrored across independently run
//! instances.

pub mod client;
pub mod instance;

pub use client::VideoCatalogClient;
pub use instance::InstanceSelector;
