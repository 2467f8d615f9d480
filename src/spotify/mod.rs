//! Track catalog access: the Spotify Web API under the client-credentials
//! grant.

pub mod client;
pub mod lease;

pub use client::TrackCatalogClient;
pub use lease::TokenLease;
