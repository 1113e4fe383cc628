//! # Corral
//!
//! A continuous-integration build results server, usable both as a
//! standalone binary and as a library.
//!
//! Clients report build results over a REST API and browse them back as
//! JSON or HTML. Every resource document carries a `links` array, so a
//! client can walk from the project list to any build without hardcoding
//! URLs.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use corral::server::{AppState, create_router};
//! use corral::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/corral.db".as_ref()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState { store: Arc::new(store) });
//! let router = create_router(state);
//! // Serve with axum...
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod server;
pub mod store;
pub mod types;
