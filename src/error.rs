//! Error taxonomy
//!
//! Hanya usage error dan kegagalan I/O run loop yang menjadi `Err`.
//! Backpressure dilaporkan lewat return value biasa, pelanggaran invariant
//! ring buffer adalah panic.

use std::io;

use thiserror::Error;

use crate::channel::PortId;

pub type Result<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, Error)]
pub enum ChannelError {
    /// Port ketiga pada channel yang sudah terhubung penuh
    #[error("channel already fully connected")]
    FullyConnected,

    /// Port sudah ditutup atau stream ke arah itu tidak bisa dikirim lagi
    #[error("port {0} is closed")]
    Closed(PortId),

    #[error("run loop I/O failure: {0}")]
    Io(#[from] io::Error),
}
