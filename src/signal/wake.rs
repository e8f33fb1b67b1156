//! Async wake handle per port
//!
//! Satu bit "pending" per handle (level-independent, bukan counter):
//! banyak `send` di antara dua dispatch digabung jadi satu notifikasi.
//! Semua handle satu run loop berbagi satu `mio::Waker`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::Waker;
use tracing::{trace, warn};

/// Jenis async wake handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeKind {
    /// Inbox peer punya ruang lagi
    Drain,
    /// Inbox sendiri punya data
    Flush,
    /// Peer sudah membaca End milik kita
    End,
}

impl WakeKind {
    pub const ALL: [WakeKind; 3] = [WakeKind::Drain, WakeKind::Flush, WakeKind::End];
}

/// Handle wake yang bisa dikirim dari thread mana pun
pub struct Wake {
    kind: WakeKind,
    pending: AtomicBool,
    closed: AtomicBool,
    waker: Arc<Waker>,
}

impl Wake {
    fn new(kind: WakeKind, waker: Arc<Waker>) -> Self {
        Self {
            kind,
            pending: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            waker,
        }
    }

    /// Tandai event pending dan bangunkan run loop pemilik.
    ///
    /// Returns `false` jika handle sudah ditutup (wake dibuang).
    pub fn send(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        // Hanya transisi 0 -> 1 yang menyentuh waker
        if !self.pending.swap(true, Ordering::AcqRel) {
            trace!(kind = ?self.kind, "wake");
            if let Err(e) = self.waker.wake() {
                warn!(kind = ?self.kind, error = %e, "failed to wake run loop");
            }
        }

        true
    }

    /// Ambil dan reset bit pending (dipanggil run loop sebelum dispatch)
    pub(crate) fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Tutup handle. Returns `true` hanya untuk pemanggilan pertama.
    pub(crate) fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Handle sudah ditutup, wake berikutnya dibuang
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Ada wake yang belum di-dispatch
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Jenis handle ini
    pub fn kind(&self) -> WakeKind {
        self.kind
    }
}

impl fmt::Debug for Wake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wake")
            .field("kind", &self.kind)
            .field("pending", &self.is_pending())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Tiga wake handle milik satu port
#[derive(Debug)]
pub struct PortSignals {
    pub drain: Wake,
    pub flush: Wake,
    pub end: Wake,
    waker: Arc<Waker>,
}

impl PortSignals {
    pub(crate) fn new(waker: Arc<Waker>) -> Self {
        Self {
            drain: Wake::new(WakeKind::Drain, Arc::clone(&waker)),
            flush: Wake::new(WakeKind::Flush, Arc::clone(&waker)),
            end: Wake::new(WakeKind::End, Arc::clone(&waker)),
            waker,
        }
    }

    pub fn get(&self, kind: WakeKind) -> &Wake {
        match kind {
            WakeKind::Drain => &self.drain,
            WakeKind::Flush => &self.flush,
            WakeKind::End => &self.end,
        }
    }

    /// Bangunkan run loop tanpa event handle (notifikasi lokal, close queue)
    pub(crate) fn wake_loop(&self) {
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake run loop");
        }
    }
}
