//! Arena of connection slots backing [`ConnectionId`].
//!
//! A transport owns one [`ConnectionSlots`]. Each accepted connection
//! holds a [`SlotLease`]; when the connection is dropped the lease returns
//! its slot to the free list and bumps the slot's generation, so any
//! `ConnectionId` still floating around for the old connection can never
//! alias the next connection that lands in the same slot.

use std::sync::{Arc, Mutex, PoisonError};

use crate::ConnectionId;

#[derive(Debug, Default)]
struct SlotTable {
    /// Current generation of every slot ever allocated.
    generations: Vec<u32>,
    /// Whether the slot is currently leased.
    occupied: Vec<bool>,
    /// Released slots, reused LIFO.
    free: Vec<u32>,
}

/// Shared allocator of generation-stamped connection ids.
///
/// Cheap to clone; clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSlots {
    table: Arc<Mutex<SlotTable>>,
}

impl ConnectionSlots {
    /// Creates an empty slot arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leases a slot for a new connection.
    pub fn acquire(&self) -> SlotLease {
        let mut table = self.lock();
        let slot = match table.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = table.generations.len() as u32;
                table.generations.push(0);
                table.occupied.push(false);
                slot
            }
        };
        table.occupied[slot as usize] = true;
        let id = ConnectionId::new(slot, table.generations[slot as usize]);
        SlotLease {
            id,
            slots: self.clone(),
        }
    }

    /// Returns `true` if `id` refers to a connection that is still alive.
    pub fn is_live(&self, id: ConnectionId) -> bool {
        let table = self.lock();
        let slot = id.slot() as usize;
        slot < table.generations.len()
            && table.occupied[slot]
            && table.generations[slot] == id.generation()
    }

    /// Number of slots currently leased.
    pub fn live_count(&self) -> usize {
        self.lock().occupied.iter().filter(|o| **o).count()
    }

    fn release(&self, id: ConnectionId) {
        let mut table = self.lock();
        let slot = id.slot() as usize;
        if slot >= table.generations.len()
            || !table.occupied[slot]
            || table.generations[slot] != id.generation()
        {
            return;
        }
        table.occupied[slot] = false;
        table.generations[slot] = table.generations[slot].wrapping_add(1);
        table.free.push(id.slot());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotTable> {
        // Every critical section leaves the table consistent, so a
        // poisoned lock is still safe to use.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one slot. Releases the slot when dropped.
#[derive(Debug)]
pub struct SlotLease {
    id: ConnectionId,
    slots: ConnectionSlots,
}

impl SlotLease {
    /// The id issued for this lease.
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slots.release(self.id);
    }
}
