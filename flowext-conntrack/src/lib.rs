//! # flowext-conntrack
//!
//! In-process connection tracking that carries flowext extension buffers.
//!
//! Connections are created unconfirmed, gather side slots (`nat`, `acct`,
//! ...) and optionally a flow extension record, then get confirmed into a
//! [`ConnTable`]. [`Conn`] implements [`flowext_core::FlowObject`].

pub mod conn;
pub mod error;
pub mod ext;
pub mod table;

pub use conn::{Conn, ConnId, FlowTuple, Proto};
pub use error::ConnError;
pub use ext::{ExtKind, ExtType};
pub use table::ConnTable;
