//! Cirrus Server Client
//!
//! HTTP client for the Cirrus backend, which lists the tracks in blob
//! storage and mints time-limited signed URLs for them.
//!
//! # Features
//!
//! - **Catalog**: `GET /api/tracks`
//! - **Signed URLs**: `GET /api/getsasurl/<track>`, cached until shortly
//!   before expiry
//! - **Server info**: `GET /api/version`
//!
//! [`CirrusClient`] implements the playback core's `CatalogSource` and
//! `UrlIssuer`, so it plugs straight into a `PlaybackController`.
//!
//! # Example
//!
//! ```ignore
//! use cirrus_server_client::{CirrusClient, ClientConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = CirrusClient::new(ClientConfig::new("https://music.example.com"))?;
//!
//!     let tracks = client.get_tracks().await?;
//!     println!("Found {} tracks", tracks.len());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

// Re-export main types
pub use client::CirrusClient;
pub use error::{Result, ServerClientError};
pub use types::{ClientConfig, SasUrlResponse, ServerInfo, TracksResponse};
