//! ## flowext-conntrack::table
//! **Connection table**
//!
//! Hands out connection identities and holds confirmed connections keyed by
//! both directions of their tuple. Unconfirmed connections live only with
//! their creator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use flowext_core::alloc::{BlobAllocator, SizeClassAllocator};

use crate::conn::{Conn, ConnId, FlowTuple};
use crate::error::ConnError;

pub struct ConnTable {
    next_id: AtomicU64,
    conns: RwLock<HashMap<FlowTuple, Arc<Conn>>>,
    allocator: Arc<dyn BlobAllocator>,
}

impl ConnTable {
    pub fn new() -> Self {
        Self::with_allocator(Arc::new(SizeClassAllocator::default()))
    }

    /// Table whose connections grow their extension buffers with `allocator`.
    pub fn with_allocator(allocator: Arc<dyn BlobAllocator>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            conns: RwLock::new(HashMap::new()),
            allocator,
        }
    }

    /// Creates a new, unconfirmed connection. It is not yet in the table.
    pub fn create(&self, tuple: FlowTuple) -> Arc<Conn> {
        let raw = self.next_id.fetch_add(1, Ordering::Relaxed);
        // The counter starts at 1 and would need 2^64 connections to wrap.
        let id = ConnId::new(raw).unwrap_or_else(|| unreachable!("connection id counter wrapped"));
        debug!(conn = %id, %tuple, "connection created");
        Arc::new(Conn::with_allocator(id, tuple, Arc::clone(&self.allocator)))
    }

    /// Confirms `conn` and inserts it under both tuple directions.
    /// Confirming an already confirmed connection does nothing.
    pub fn confirm(&self, conn: &Arc<Conn>) -> Result<(), ConnError> {
        if conn.is_confirmed() {
            return Ok(());
        }
        let tuple = *conn.tuple();
        let reply = tuple.reverse();
        let mut conns = self.conns.write();
        if conns.contains_key(&tuple) || conns.contains_key(&reply) {
            return Err(ConnError::Clash(tuple));
        }
        if conn.confirm() {
            conns.insert(tuple, Arc::clone(conn));
            conns.insert(reply, Arc::clone(conn));
            info!(conn = %conn.id(), %tuple, "connection confirmed");
        }
        Ok(())
    }

    /// Finds a confirmed connection by either direction of its tuple.
    pub fn find(&self, tuple: &FlowTuple) -> Option<Arc<Conn>> {
        self.conns.read().get(tuple).cloned()
    }

    /// Removes a confirmed connection (both directions) from the table.
    pub fn remove(&self, tuple: &FlowTuple) -> Option<Arc<Conn>> {
        let mut conns = self.conns.write();
        let conn = conns.remove(tuple)?;
        conns.remove(&tuple.reverse());
        debug!(conn = %conn.id(), "connection removed");
        Some(conn)
    }

    /// Number of confirmed connections.
    pub fn len(&self) -> usize {
        self.conns.read().len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.conns.read().is_empty()
    }
}

impl Default for ConnTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::Proto;
    use tracing_test::traced_test;

    fn tuple(port: u16) -> FlowTuple {
        FlowTuple::new(
            Proto::Tcp,
            format!("192.168.1.10:{port}").parse().unwrap(),
            "93.184.216.34:443".parse().unwrap(),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let table = ConnTable::new();
        let a = table.create(tuple(1000));
        let b = table.create(tuple(1001));
        assert_ne!(a.id(), b.id());
        assert!(table.is_empty());
    }

    #[traced_test]
    #[test]
    fn test_confirm_inserts_both_directions() {
        let table = ConnTable::new();
        let conn = table.create(tuple(2000));
        table.confirm(&conn).unwrap();

        assert!(conn.is_confirmed());
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&tuple(2000)).unwrap().id(), conn.id());
        assert_eq!(table.find(&tuple(2000).reverse()).unwrap().id(), conn.id());

        table.confirm(&conn).unwrap();
        assert_eq!(table.len(), 1);
        assert!(logs_contain("connection confirmed"));
    }

    #[test]
    fn test_clash_leaves_connection_unconfirmed() {
        let table = ConnTable::new();
        let first = table.create(tuple(3000));
        let second = table.create(tuple(3000));
        table.confirm(&first).unwrap();

        assert_eq!(table.confirm(&second), Err(ConnError::Clash(tuple(3000))));
        assert!(!second.is_confirmed());
    }

    #[test]
    fn test_remove() {
        let table = ConnTable::new();
        let conn = table.create(tuple(4000));
        table.confirm(&conn).unwrap();

        let removed = table.remove(&tuple(4000).reverse()).unwrap();
        assert_eq!(removed.id(), conn.id());
        assert!(table.is_empty());
        assert!(table.remove(&tuple(4000)).is_none());
    }
}
