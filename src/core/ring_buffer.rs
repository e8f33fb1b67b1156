//! Lock-Free Single-Producer Single-Consumer (SPSC) Ring Buffer
//!
//! Lamport Queue dengan cursor modulo `N` (bitmask). Satu slot selalu
//! dikosongkan sebagai pembeda penuh/kosong, jadi kapasitas efektif `N - 1`.
//!
//! Operasi dipecah dua fase seperti inbox port:
//! - `peek_write` / `WriteSlot::commit` (producer)
//! - `peek_read` / `ReadSlot::take` (consumer)
//!
//! Fase kedua melakukan release-store cursor, fase pertama acquire-load
//! cursor lawan. Tidak ada Mutex, tidak ada alokasi setelah inisialisasi.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Slot dalam ring buffer
struct Slot<T> {
    data: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    const fn new() -> Self {
        Self {
            data: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Padding untuk cache line isolation (64 bytes pada x86-64)
#[repr(C, align(64))]
struct CacheLinePadded<T> {
    value: T,
}

impl<T> CacheLinePadded<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

/// Lock-Free SPSC Ring Buffer
///
/// `write` hanya dimutasi producer, `read` hanya dimutasi consumer.
/// Keduanya selalu berada di `[0, N)`.
#[repr(C)]
pub struct RingBuffer<T, const N: usize> {
    // Producer side - cache line aligned
    write: CacheLinePadded<AtomicUsize>,
    // Consumer side - cache line aligned
    read: CacheLinePadded<AtomicUsize>,
    buffer: Box<[Slot<T>]>,
    mask: usize,
}

// SAFETY: Slot hanya disentuh oleh satu producer (sebelum publish) atau
// satu consumer (setelah acquire). Kontrak ini dijaga oleh pemanggil
// `peek_write`/`peek_read`.
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot kosong yang sudah dicadangkan untuk producer.
///
/// Belum terlihat oleh consumer sampai `commit` dipanggil.
pub struct WriteSlot<'a, T, const N: usize> {
    ring: &'a RingBuffer<T, N>,
    index: usize,
}

impl<T, const N: usize> WriteSlot<'_, T, N> {
    /// Tulis value lalu publish slot (release-store cursor `write`).
    #[inline(always)]
    pub fn commit(self, value: T) {
        let slot = &self.ring.buffer[self.index];

        // SAFETY: `peek_write` menjamin slot ini di luar jangkauan consumer
        unsafe {
            (*slot.data.get()).write(value);
        }

        self.ring
            .write
            .value
            .store((self.index + 1) & self.ring.mask, Ordering::Release);
    }

    /// Index slot di dalam buffer
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Slot berisi data yang siap dibaca consumer.
pub struct ReadSlot<'a, T, const N: usize> {
    ring: &'a RingBuffer<T, N>,
    index: usize,
}

impl<T, const N: usize> ReadSlot<'_, T, N> {
    /// Lihat isi slot tanpa mengambil ownership
    #[inline(always)]
    pub fn get(&self) -> &T {
        // SAFETY: Acquire-load pada `peek_read` menjamin slot sudah diinisialisasi
        unsafe { (*self.ring.buffer[self.index].data.get()).assume_init_ref() }
    }

    /// Ambil value lalu bebaskan slot (release-store cursor `read`).
    #[inline(always)]
    pub fn take(self) -> T {
        let slot = &self.ring.buffer[self.index];

        // SAFETY: Slot sudah ditulis producer dan belum dibaca siapa pun
        let value = unsafe { (*slot.data.get()).assume_init_read() };

        self.ring
            .read
            .value
            .store((self.index + 1) & self.ring.mask, Ordering::Release);

        value
    }

    /// Index slot di dalam buffer
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Membuat ring buffer baru. N HARUS power of 2.
    ///
    /// # Panics
    /// Panic jika N bukan power of 2 atau N < 2
    pub fn new() -> Self {
        assert!(N >= 2 && N.is_power_of_two(), "N must be power of 2");

        // Alokasi buffer di heap untuk menghindari stack overflow
        let mut buffer = Vec::with_capacity(N);
        for _ in 0..N {
            buffer.push(Slot::new());
        }

        Self {
            write: CacheLinePadded::new(AtomicUsize::new(0)),
            read: CacheLinePadded::new(AtomicUsize::new(0)),
            buffer: buffer.into_boxed_slice(),
            mask: N - 1,
        }
    }

    /// Cadangkan slot berikutnya untuk ditulis (Producer side).
    ///
    /// Returns `None` jika `write + 1 == read` (penuh).
    ///
    /// # Safety
    /// Hanya boleh ada satu producer aktif: tidak boleh ada `WriteSlot` lain
    /// yang hidup bersamaan, dari thread mana pun.
    #[inline(always)]
    pub unsafe fn peek_write(&self) -> Option<WriteSlot<'_, T, N>> {
        let write = self.write.value.load(Ordering::Relaxed);
        let read = self.read.value.load(Ordering::Acquire);
        assert!(write <= self.mask && read <= self.mask, "cursor out of range");

        if (write + 1) & self.mask == read {
            return None;
        }

        Some(WriteSlot {
            ring: self,
            index: write,
        })
    }

    /// Ambil slot berikutnya yang belum dibaca (Consumer side).
    ///
    /// Returns `None` jika `read == write` (kosong).
    ///
    /// # Safety
    /// Hanya boleh ada satu consumer aktif: tidak boleh ada `ReadSlot` lain
    /// yang hidup bersamaan, dari thread mana pun.
    #[inline(always)]
    pub unsafe fn peek_read(&self) -> Option<ReadSlot<'_, T, N>> {
        let read = self.read.value.load(Ordering::Relaxed);
        let write = self.write.value.load(Ordering::Acquire);
        assert!(write <= self.mask && read <= self.mask, "cursor out of range");

        if read == write {
            return None;
        }

        Some(ReadSlot {
            ring: self,
            index: read,
        })
    }

    /// Push tanpa kontrak unsafe; `&mut self` menjamin producer tunggal.
    ///
    /// Returns `Err(value)` jika buffer penuh.
    #[inline(always)]
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        // SAFETY: exclusive borrow
        match unsafe { self.peek_write() } {
            Some(slot) => {
                slot.commit(value);
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Pop tanpa kontrak unsafe; `&mut self` menjamin consumer tunggal.
    #[inline(always)]
    pub fn pop(&mut self) -> Option<T> {
        // SAFETY: exclusive borrow
        unsafe { self.peek_read() }.map(ReadSlot::take)
    }

    /// Cek apakah buffer kosong
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        let read = self.read.value.load(Ordering::Acquire);
        let write = self.write.value.load(Ordering::Acquire);
        read == write
    }

    /// Cek apakah buffer penuh (`N - 1` pesan belum dibaca)
    #[inline(always)]
    pub fn is_full(&self) -> bool {
        let write = self.write.value.load(Ordering::Acquire);
        let read = self.read.value.load(Ordering::Acquire);
        (write + 1) & self.mask == read
    }

    /// Jumlah elemen dalam buffer
    #[inline(always)]
    pub fn len(&self) -> usize {
        let write = self.write.value.load(Ordering::Acquire);
        let read = self.read.value.load(Ordering::Acquire);
        write.wrapping_sub(read) & self.mask
    }

    /// Kapasitas efektif buffer
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        // Slot yang belum dibaca masih memegang ownership value
        while self.pop().is_some() {}
    }
}
