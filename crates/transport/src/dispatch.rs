//! Fixed-size, type-byte-indexed packet dispatch.

use std::sync::Arc;

use crate::Inbound;

/// Something that can handle one inbound packet. Implementors are invoked
/// from a freshly spawned thread per datagram/frame, so a slow handler never
/// blocks the endpoint's receive loop.
pub trait PacketHandler: Send + Sync {
    /// Handles one inbound packet.
    fn handle(&self, inbound: Inbound);
}

impl<F> PacketHandler for F
where
    F: Fn(Inbound) + Send + Sync,
{
    fn handle(&self, inbound: Inbound) {
        self(inbound);
    }
}

/// A 256-entry table mapping a packet's raw type byte to its handler.
/// Unregistered slots are simply skipped — dispatch is closed over the
/// whole `u8` range rather than growing a dynamic registry at runtime.
#[derive(Default, Clone)]
pub struct DispatchTable {
    handlers: [Option<Arc<dyn PacketHandler>>; 256],
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered = self.handlers.iter().filter(|h| h.is_some()).count();
        f.debug_struct("DispatchTable")
            .field("registered", &registered)
            .finish()
    }
}

impl DispatchTable {
    /// Builds an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: std::array::from_fn(|_| None),
        }
    }

    /// Registers a handler for `packet_type`. Replaces any previous
    /// registration for that byte.
    pub fn register(&mut self, packet_type: u8, handler: Arc<dyn PacketHandler>) {
        self.handlers[packet_type as usize] = Some(handler);
    }

    /// Removes the handler registered for `packet_type`, if any.
    pub fn unregister(&mut self, packet_type: u8) {
        self.handlers[packet_type as usize] = None;
    }

    /// Dispatches `inbound` to its registered handler, if one is present.
    /// Returns whether a handler was found.
    pub fn dispatch(&self, inbound: Inbound) -> bool {
        let idx = inbound.packet.packet_type() as usize;
        match &self.handlers[idx] {
            Some(handler) => {
                handler.handle(inbound);
                true
            }
            None => false,
        }
    }

    /// Like [`Self::dispatch`], but only clones `inbound` when a handler is
    /// actually registered for its type — lets callers hold a shared
    /// reference (e.g. a multiplexer routing the same packet through
    /// several layers) without paying for a clone on every miss.
    pub fn dispatch_ref(&self, inbound: &Inbound) -> bool {
        let idx = inbound.packet.packet_type() as usize;
        match &self.handlers[idx] {
            Some(handler) => {
                handler.handle(inbound.clone());
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshwire_wire::Packet;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr() -> SocketAddr {
        "127.0.0.1:9000".parse().unwrap()
    }

    #[test]
    fn dispatches_to_registered_handler_only() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counted = hits.clone();
        let mut table = DispatchTable::new();
        table.register(
            5,
            Arc::new(move |_: Inbound| {
                counted.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let handled = table.dispatch(Inbound {
            from: addr(),
            packet: Packet::new(5, vec![1]),
        });
        assert!(handled);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let missed = table.dispatch(Inbound {
            from: addr(),
            packet: Packet::new(6, vec![1]),
        });
        assert!(!missed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_stops_dispatch() {
        let mut table = DispatchTable::new();
        table.register(1, Arc::new(|_: Inbound| {}));
        table.unregister(1);
        assert!(!table.dispatch(Inbound {
            from: addr(),
            packet: Packet::new(1, vec![1]),
        }));
    }
}
