//! Per-type packet routing layered over the multiplexer's connection map.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;

use meshwire_transport::{DispatchTable, Inbound, PacketHandler};

/// Wraps a [`DispatchTable`] with a default handler and a counter for
/// packets that matched neither, matching the spec's "type-specific
/// handler or the default handler; unmatched packets bump a routing-error
/// counter".
#[derive(Default)]
pub(crate) struct Router {
    table: RwLock<DispatchTable>,
    default_handler: RwLock<Option<Arc<dyn PacketHandler>>>,
    routing_errors: AtomicU64,
}

impl Router {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(&self, packet_type: u8, handler: Arc<dyn PacketHandler>) {
        self.table.write().expect("router lock poisoned").register(packet_type, handler);
    }

    pub(crate) fn unregister(&self, packet_type: u8) {
        self.table.write().expect("router lock poisoned").unregister(packet_type);
    }

    pub(crate) fn set_default(&self, handler: Arc<dyn PacketHandler>) {
        *self.default_handler.write().expect("router lock poisoned") = Some(handler);
    }

    /// Routes one inbound packet, trying the type-specific handler first,
    /// then the default handler. Bumps the routing-error counter if
    /// neither is registered.
    pub(crate) fn route(&self, inbound: Inbound) {
        let handled = self.table.read().expect("router lock poisoned").dispatch_ref(&inbound);
        if handled {
            return;
        }
        let default = self.default_handler.read().expect("router lock poisoned").clone();
        match default {
            Some(handler) => handler.handle(inbound),
            None => {
                self.routing_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub(crate) fn routing_errors(&self) -> u64 {
        self.routing_errors.load(Ordering::Relaxed)
    }
}
