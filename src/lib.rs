//! Twinport - Bounded Two-Port Duplex Channel
//!
//! Arsitektur:
//! - Lock-Free: dua inbox SPSC, satu per arah
//! - Bounded: kapasitas tetap, backpressure lewat `write` yang gagal
//! - Event-Driven: wake drain/flush/end digabung ke run loop pemilik port
//! - Graceful Teardown: handshake End dua arah, bisa dipaksa oleh host

pub mod channel;
pub mod config;
pub mod core;
pub mod endpoint;
pub mod error;
pub mod signal;

pub use crate::channel::{Channel, Port, PortId, PortState};
pub use crate::config::EndpointConfig;
pub use crate::core::{Message, Payload, PORT_CAPACITY};
pub use crate::endpoint::Endpoint;
pub use crate::error::{ChannelError, Result};
pub use crate::signal::{Notify, PortEvent, RunLoop};
