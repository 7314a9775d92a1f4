//! Worker lifecycle MCP tools.
//!
//! These drive the registration the way a browser would: registering new
//! versions, routing page fetches, posting messages and opening or closing
//! pages.

pub mod clients;
pub mod fetch;
pub mod message;
pub mod register;
pub mod status;

pub use clients::{SwClientsParams, clients_impl};
pub use fetch::{SwFetchParams, fetch_impl};
pub use message::{SwMessageParams, message_impl};
pub use register::{SwRegisterParams, register_impl};
pub use status::status_impl;
