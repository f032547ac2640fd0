//! # hubnet server
//!
//! Server-side engine for framed TCP messaging.
//!
//! This crate provides:
//! - [`Server`] with configuration, lifecycle hooks and graceful stop
//! - [`Connection`] with buffered and direct sends and a property store
//! - [`Router`] trait and the [`MessageDispatcher`] that routes by message id
//! - [`WorkerPool`] that keeps per-connection message order
//! - [`ConnectionManager`] registry of live connections

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod request;
pub mod router;
pub mod server;
pub mod worker;

#[cfg(test)]
pub(crate) mod test_util;

pub use config::ServerConfig;
pub use connection::{Connection, ConnectionState, Property};
pub use dispatcher::MessageDispatcher;
pub use error::ServerError;
pub use hooks::{ConnHook, LifecycleHooks, conn_hook};
pub use manager::ConnectionManager;
pub use request::Request;
pub use router::{FnRouter, Router};
pub use server::Server;
pub use worker::WorkerPool;
