//! Channel: alokasi bersama berisi tepat dua port
//!
//! Arsitektur:
//! - Arena dua slot: identitas port 0/1 dibagikan first-come via atomic `next`
//! - Inbox per port: ditulis peer, dibaca pemilik (single writer per cursor)
//! - Handshake End dua arah sebelum resource dilepas
//!
//! `Channel` boleh di-share antar thread (`Arc`); `Port` terikat ke thread
//! yang meng-claim-nya.

pub(crate) mod handshake;
mod port;
pub(crate) mod teardown;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::{ChannelError, Result};

pub(crate) use port::PortShared;
pub use port::Port;

/// Identitas port di dalam channel
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortId {
    Zero = 0,
    One = 1,
}

impl PortId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline(always)]
    pub const fn peer(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Zero),
            1 => Some(Self::One),
            _ => None,
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}

bitflags! {
    /// Flag lifecycle port; independen, tidak saling eksklusif
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortState: u8 {
        /// Port sudah di-claim dan terikat ke run loop
        const ACTIVE = 0x01;
        /// End sudah dikirim ke peer
        const ENDED = 0x02;
        /// End milik peer sudah terbaca
        const REMOTE_ENDED = 0x04;
        /// Host meminta teardown
        const EXITING = 0x08;
        /// Close handle sedang berjalan
        const CLOSING = 0x10;
        /// Resource sudah dilepas
        const CLOSED = 0x20;
    }
}

/// Shared channel dengan dua port
pub struct Channel {
    // >= 2 berarti terhubung penuh
    next: AtomicUsize,
    ports: [PortShared; 2],
}

impl Channel {
    /// Alokasi channel baru; `Arc` adalah handle yang di-share ke thread lain.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next: AtomicUsize::new(0),
            ports: [PortShared::new(PortId::Zero), PortShared::new(PortId::One)],
        })
    }

    /// Claim identitas port berikutnya.
    ///
    /// Claim ketiga gagal tanpa mengubah state apa pun.
    pub(crate) fn claim(&self) -> Result<PortId> {
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                (next < 2).then_some(next + 1)
            })
            .ok()
            .and_then(PortId::from_index)
            .ok_or(ChannelError::FullyConnected)
    }

    #[inline(always)]
    pub(crate) fn port(&self, id: PortId) -> &PortShared {
        &self.ports[id.index()]
    }

    /// Dua identitas sudah di-claim
    pub fn is_fully_connected(&self) -> bool {
        self.next.load(Ordering::Acquire) >= 2
    }

    /// Snapshot flag lifecycle sebuah port
    pub fn state(&self, id: PortId) -> PortState {
        self.port(id).state()
    }

    /// Jumlah pesan belum dibaca di inbox port `id`
    pub fn unread(&self, id: PortId) -> usize {
        self.port(id).inbox().len()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("next", &self.next.load(Ordering::Relaxed))
            .field("port0", &self.state(PortId::Zero))
            .field("port1", &self.state(PortId::One))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_assigns_zero_then_one() {
        let channel = Channel::new();

        assert_eq!(channel.claim().unwrap(), PortId::Zero);
        assert!(!channel.is_fully_connected());
        assert_eq!(channel.claim().unwrap(), PortId::One);
        assert!(channel.is_fully_connected());
    }

    #[test]
    fn test_third_claim_fails_without_side_effects() {
        let channel = Channel::new();
        channel.claim().unwrap();
        channel.claim().unwrap();

        assert!(matches!(channel.claim(), Err(ChannelError::FullyConnected)));
        assert!(matches!(channel.claim(), Err(ChannelError::FullyConnected)));
        assert_eq!(channel.next.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_port_id_peer() {
        assert_eq!(PortId::Zero.peer(), PortId::One);
        assert_eq!(PortId::One.peer(), PortId::Zero);
        assert_eq!(PortId::from_index(2), None);
        assert_eq!(PortId::One.to_string(), "1");
    }

    #[test]
    fn test_fresh_channel_state() {
        let channel = Channel::new();

        assert!(channel.state(PortId::Zero).is_empty());
        assert!(channel.state(PortId::One).is_empty());
        assert_eq!(channel.unread(PortId::Zero), 0);
    }
}
