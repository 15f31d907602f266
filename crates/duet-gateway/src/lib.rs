//! duet-gateway - HTTP surface for the duet chat backend
//!
//! Exposes the chat routes over axum. Requests are tied to an owner through a
//! bearer token; everything past identity is delegated to
//! [`duet_core::ChatService`].

pub mod auth;
pub mod protocol;
pub mod server;

pub use auth::{IdentityResolver, UserCredential};
pub use server::GatewayServer;
