//! Message Slot: Data (move-only buffer) atau End sentinel
//!
//! Payload berpindah ownership saat di-enqueue. Setelah `Port::write`
//! berhasil, handle milik pengirim sudah di-move ke slot dan tidak bisa
//! dipakai lagi (dijamin compiler, bukan pointer nulling manual).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Buffer yang dipindahkan lewat channel
#[derive(Clone)]
pub enum Payload {
    /// Byte buffer milik tunggal
    Bytes(Vec<u8>),
    /// Backing store bersama; hanya handle-nya yang berpindah, bytes tidak di-copy
    Shared(Arc<[u8]>),
    /// Handle opaque milik aplikasi; channel tidak pernah melihat isinya
    External(Arc<dyn Any + Send + Sync>),
}

impl Payload {
    /// Bungkus value apa pun sebagai handle opaque
    pub fn external<T: Any + Send + Sync>(value: T) -> Self {
        Self::External(Arc::new(value))
    }

    /// View ke isi buffer (zero-copy). Handle opaque tidak punya bytes.
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Shared(store) => store,
            Self::External(_) => &[],
        }
    }

    /// Akses value di balik handle opaque, jika tipenya cocok
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::External(handle) => handle.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Panjang payload dalam byte
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Cek apakah payload kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Ambil isi sebagai `Vec<u8>`; backing store bersama di-copy.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Shared(store) => store.to_vec(),
            Self::External(_) => Vec::new(),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Shared(a), Self::Shared(b)) => a == b,
            // Handle opaque hanya sama dengan dirinya sendiri
            (Self::External(a), Self::External(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Payload {}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Shared(store) => f.debug_tuple("Shared").field(&store.len()).finish(),
            Self::External(_) => f.write_str("External(..)"),
        }
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl<const L: usize> From<[u8; L]> for Payload {
    fn from(bytes: [u8; L]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Self::Bytes(text.as_bytes().to_vec())
    }
}

impl From<Arc<[u8]>> for Payload {
    fn from(store: Arc<[u8]>) -> Self {
        Self::Shared(store)
    }
}

impl AsRef<[u8]> for Payload {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Isi satu slot inbox
#[derive(Debug)]
pub enum Message {
    /// Data dari peer, ownership buffer ikut berpindah
    Data(Payload),
    /// Tidak ada Data lagi setelah ini untuk arah tersebut
    End,
}

impl Message {
    /// Cek apakah slot berisi End sentinel
    #[inline(always)]
    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}
