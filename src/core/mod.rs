//! Core module: Lock-Free Ring Buffer dan message slot
//!
//! Prinsip desain:
//! - Lock-Free: Hanya atomic operations di jalur data, tidak ada Mutex
//! - No-Allocation: Semua slot pre-allocated saat init
//! - Move-Only: Payload berpindah ownership, tidak pernah dipegang dua sisi

mod message;
mod ring_buffer;

pub use message::{Message, Payload};
pub use ring_buffer::{ReadSlot, RingBuffer, WriteSlot};

/// Kapasitas inbox per port (power of 2)
pub const PORT_CAPACITY: usize = 1024;

/// Ring buffer inbox sebuah port
pub type Inbox = RingBuffer<Message, PORT_CAPACITY>;
