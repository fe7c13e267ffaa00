//! # twtsync-api
//!
//! Blocking HTTP client for the ticketing provider's REST API. Implements
//! [`twtsync_core::ports::TicketingApi`] on top of `ureq`.
//!
//! ```rust,no_run
//! use twtsync_api::ApiConnection;
//!
//! fn connect() -> Result<ApiConnection, Box<dyn std::error::Error>> {
//!     let settings = twtsync_core::settings::load()?;
//!     Ok(ApiConnection::new(&settings.api_settings()?))
//! }
//! ```

pub mod connection;
pub mod response;

pub use connection::{generate_query_string, ApiConnection};
