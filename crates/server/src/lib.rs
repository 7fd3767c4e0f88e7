//! Server crate for the Top Movies ranked lists.
//!
//! This crate contains the service that serializes writes per list, the
//! JSON API built on top of it, and the server configuration.

pub mod api;
pub mod config;
pub mod error;
pub mod service;

pub use api::{router, TopMoviesView};
pub use config::ServerConfig;
pub use error::{AppError, AppResult};
pub use service::TopMoviesService;
