//! Outer surface of the simulation: the sqlite state store and the
//! HTTP/websocket API over a running engine handle.

mod persistence;
mod server;

pub use persistence::SqliteStateStore;
pub use server::{router, serve};
