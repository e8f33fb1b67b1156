//! Batas ke managed callback milik binding layer
//!
//! Core hanya memanggil `notify`; lifetime callback dimiliki binding layer.

use crate::channel::Port;

/// Event yang dikirim ke pemilik port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortEvent {
    /// Ada ruang lagi di inbox peer
    Drain,
    /// Ada data di inbox sendiri (bisa lebih dari satu pesan)
    Flush,
    /// Peer sudah membaca End kita
    End,
    /// End milik peer sudah terbaca
    RemoteEnd,
    /// Semua resource port sudah dilepas
    Close,
}

pub trait Notify {
    fn notify(&mut self, port: &Port, event: PortEvent);
}

impl<F> Notify for F
where
    F: FnMut(&Port, PortEvent),
{
    fn notify(&mut self, port: &Port, event: PortEvent) {
        self(port, event)
    }
}
