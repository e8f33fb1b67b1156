//! Port: satu endpoint channel
//!
//! `PortShared` adalah bagian yang terlihat dua thread (inbox, cursor,
//! flag lifecycle, pasangan mutex+condvar). `Port` adalah handle milik
//! thread pemilik: terikat ke `RunLoop` dan memegang callback binding layer.
//!
//! Aturan mutasi:
//! - cursor `write` inbox X hanya digeser oleh peer X (pengirim)
//! - cursor `read` inbox X hanya digeser oleh pemilik X
//!
//! `Port` sengaja `!Send` (berisi `Rc`), jadi setiap sisi cursor hanya
//! pernah disentuh satu thread.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{fence, AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use super::{teardown, Channel, PortId, PortState};
use crate::core::{Inbox, Message, Payload};
use crate::error::Result;
use crate::signal::{LoopShared, Notify, PortEvent, PortSignals, RunLoop};

/// Pasangan mutex+condvar untuk blocking wait
pub(crate) struct Gate {
    lock: Mutex<()>,
    cond: Condvar,
    waiting: AtomicBool,
}

impl Gate {
    fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
            waiting: AtomicBool::new(false),
        }
    }

    /// Blok thread pemanggil selama `blocked()` bernilai true.
    ///
    /// Predicate dicek ulang di bawah mutex setelah setiap wake.
    fn wait_while(&self, mut blocked: impl FnMut() -> bool) {
        let mut guard = self.lock.lock();

        // Berpasangan dengan fence di `signal`: salah satu pihak pasti
        // melihat store pihak lain
        self.waiting.store(true, Ordering::Relaxed);
        fence(Ordering::SeqCst);

        while blocked() {
            self.cond.wait(&mut guard);
        }

        self.waiting.store(false, Ordering::Relaxed);
    }

    /// Bangunkan waiter (jika ada). Dipanggil setelah release-store cursor.
    fn signal(&self) {
        fence(Ordering::SeqCst);
        if self.waiting.load(Ordering::Relaxed) {
            let _guard = self.lock.lock();
            self.cond.notify_all();
        }
    }
}

/// Bagian port yang di-share ke peer
pub(crate) struct PortShared {
    id: PortId,
    inbox: Inbox,
    state: AtomicU8,
    // "space available" di inbox peer
    drain: Gate,
    // "data available" di inbox sendiri
    flush: Gate,
    signals: OnceLock<Arc<PortSignals>>,
}

impl PortShared {
    pub(crate) fn new(id: PortId) -> Self {
        Self {
            id,
            inbox: Inbox::new(),
            state: AtomicU8::new(0),
            drain: Gate::new(),
            flush: Gate::new(),
            signals: OnceLock::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn inbox(&self) -> &Inbox {
        &self.inbox
    }

    #[inline(always)]
    pub(crate) fn state(&self) -> PortState {
        PortState::from_bits_truncate(self.state.load(Ordering::Acquire))
    }

    #[inline(always)]
    pub(crate) fn any(&self, flags: PortState) -> bool {
        self.state().intersects(flags)
    }

    /// Set flag, returns state sebelumnya
    #[inline(always)]
    pub(crate) fn insert(&self, flags: PortState) -> PortState {
        PortState::from_bits_truncate(self.state.fetch_or(flags.bits(), Ordering::AcqRel))
    }

    pub(crate) fn signals(&self) -> Option<&Arc<PortSignals>> {
        self.signals.get()
    }

    /// Peer tidak akan membaca atau mengirim apa pun lagi
    pub(crate) fn is_gone(&self) -> bool {
        let state = self.state();
        !state.contains(PortState::ACTIVE)
            || state.intersects(PortState::CLOSING | PortState::CLOSED)
    }

    /// Setelah slot inbox ini dipublish: bangunkan pemiliknya (flush)
    fn push_write(&self) {
        self.flush.signal();
        if let Some(signals) = self.signals.get() {
            signals.flush.send();
        }
    }

    /// Setelah slot inbox peer dibebaskan: bangunkan port ini (drain)
    fn push_drain(&self) {
        self.drain.signal();
        if self.any(PortState::ENDED) {
            return;
        }
        if let Some(signals) = self.signals.get() {
            signals.drain.send();
        }
    }

    /// Bangunkan semua waiter dan handler port ini (peer menutup)
    pub(crate) fn nudge(&self) {
        trace!(port = %self.id, "nudged by closing peer");
        self.drain.signal();
        self.flush.signal();
        if let Some(signals) = self.signals.get() {
            signals.drain.send();
            signals.flush.send();
        }
    }
}

pub(crate) struct PortInner {
    channel: Arc<Channel>,
    id: PortId,
    run_loop: Rc<LoopShared>,
    signals: Arc<PortSignals>,
    notify: RefCell<Option<Box<dyn Notify>>>,
    // Sisa handle yang belum selesai ditutup
    pub(crate) closing: Cell<u8>,
    referenced: Cell<bool>,
    pub(crate) remote_end_pending: Cell<bool>,
    released: Cell<bool>,
}

/// Handle port milik thread pemilik
#[derive(Clone)]
pub struct Port {
    inner: Rc<PortInner>,
}

impl Port {
    /// Claim identitas port berikutnya dan ikat ke `run_loop`.
    ///
    /// Gagal dengan `ChannelError::FullyConnected` jika dua port sudah
    /// di-claim; tidak ada state yang berubah pada kasus itu.
    pub fn init<N>(channel: &Arc<Channel>, run_loop: &RunLoop, notify: N) -> Result<Self>
    where
        N: Notify + 'static,
    {
        let id = channel.claim()?;
        let shared = channel.port(id);
        let loop_shared = run_loop.shared();

        let signals = Arc::new(PortSignals::new(loop_shared.waker()));
        if shared.signals.set(Arc::clone(&signals)).is_err() {
            unreachable!("port {id} bound twice");
        }

        let port = Self {
            inner: Rc::new(PortInner {
                channel: Arc::clone(channel),
                id,
                run_loop: Rc::clone(loop_shared),
                signals: Arc::clone(&signals),
                notify: RefCell::new(Some(Box::new(notify))),
                closing: Cell::new(0),
                referenced: Cell::new(true),
                remote_end_pending: Cell::new(false),
                released: Cell::new(false),
            }),
        };

        loop_shared.register(&port);
        shared.insert(PortState::ACTIVE);

        // Peer mungkin sudah menulis sebelum sisi ini selesai init
        signals.flush.send();

        debug!(port = %id, "port claimed");
        Ok(port)
    }

    #[inline(always)]
    pub fn id(&self) -> PortId {
        self.inner.id
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.inner.channel
    }

    #[inline(always)]
    pub(crate) fn shared(&self) -> &PortShared {
        self.inner.channel.port(self.inner.id)
    }

    #[inline(always)]
    pub(crate) fn peer(&self) -> &PortShared {
        self.inner.channel.port(self.inner.id.peer())
    }

    pub(crate) fn signals(&self) -> &PortSignals {
        &self.inner.signals
    }

    pub(crate) fn run_loop(&self) -> &LoopShared {
        &self.inner.run_loop
    }

    pub(crate) fn inner(&self) -> &PortInner {
        &self.inner
    }

    pub(crate) fn same_port(&self, other: &Port) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Kirim payload ke inbox peer. Tidak pernah blocking.
    ///
    /// `Err` mengembalikan payload ke pemanggil: inbox peer penuh
    /// (backpressure), End sudah dikirim, atau salah satu sisi sedang ditutup.
    pub fn write(&self, payload: impl Into<Payload>) -> std::result::Result<(), Payload> {
        let payload = payload.into();

        if self
            .shared()
            .any(PortState::ENDED | PortState::EXITING | PortState::CLOSING)
        {
            return Err(payload);
        }

        let receiver = self.peer();
        if receiver.any(PortState::CLOSING | PortState::CLOSED) {
            return Err(payload);
        }

        // SAFETY: Port !Send dan hanya satu per id, jadi thread ini
        // satu-satunya producer inbox peer
        match unsafe { receiver.inbox.peek_write() } {
            Some(slot) => {
                slot.commit(Message::Data(payload));
                receiver.push_write();
                Ok(())
            }
            None => Err(payload),
        }
    }

    /// Kirim End sentinel. Idempotent setelah berhasil.
    ///
    /// Returns `false` jika inbox peer penuh atau port sedang ditutup.
    pub fn end(&self) -> bool {
        let state = self.shared().state();
        if state.contains(PortState::ENDED) {
            return true;
        }
        if state.contains(PortState::CLOSING) {
            return false;
        }

        self.enqueue_end()
    }

    pub(crate) fn enqueue_end(&self) -> bool {
        let receiver = self.peer();

        // SAFETY: lihat `write`
        match unsafe { receiver.inbox.peek_write() } {
            Some(slot) => {
                slot.commit(Message::End);
                self.shared().insert(PortState::ENDED);
                debug!(port = %self.id(), "end sent");
                receiver.push_write();
                true
            }
            None => false,
        }
    }

    /// Baca pesan berikutnya dari inbox sendiri. Tidak pernah blocking.
    ///
    /// `None` berarti belum ada pesan, atau yang terbaca adalah End peer
    /// (notifikasi `RemoteEnd` dikirim lewat run loop, tepat sekali).
    /// Setelah teardown dimulai, Data tidak lagi diserahkan ke aplikasi.
    pub fn read(&self) -> Option<Payload> {
        if self.shared().any(PortState::EXITING) {
            return None;
        }

        match self.retire() {
            Some(Message::Data(payload)) => Some(payload),
            Some(Message::End) | None => None,
        }
    }

    /// Ambil satu slot dari inbox sendiri lalu bebaskan slot tersebut
    pub(crate) fn retire(&self) -> Option<Message> {
        let own = self.shared();

        // SAFETY: Port !Send dan hanya satu per id, jadi thread ini
        // satu-satunya consumer inbox sendiri
        let message = unsafe { own.inbox.peek_read() }?.take();

        self.peer().push_drain();

        if message.is_end() {
            self.observe_remote_end();
        }

        Some(message)
    }

    fn observe_remote_end(&self) {
        let previous = self.shared().insert(PortState::REMOTE_ENDED);
        if previous.contains(PortState::REMOTE_ENDED) {
            return;
        }

        debug!(port = %self.id(), "remote end observed");

        // Pengirim End tahu End-nya sudah diterima, bukan sekadar terkirim
        if let Some(signals) = self.peer().signals() {
            signals.end.send();
        }

        if !previous.contains(PortState::EXITING) {
            self.inner.remote_end_pending.set(true);
            self.inner.signals.wake_loop();
        }
    }

    /// Blok sampai inbox peer punya ruang.
    ///
    /// Returns `false` jika tidak akan pernah ada ruang untuk port ini lagi
    /// (End sudah dikirim, port ditutup, atau peer sedang ditutup).
    pub fn wait_drain(&self) -> bool {
        let receiver = self.peer();

        self.shared()
            .drain
            .wait_while(|| !self.is_send_stopped() && receiver.inbox.is_full());

        !self.is_send_stopped() && !receiver.inbox.is_full()
    }

    /// Arah kirim sudah selesai: End terkirim, atau salah satu sisi ditutup
    pub(crate) fn is_send_stopped(&self) -> bool {
        self.shared()
            .any(PortState::ENDED | PortState::CLOSING | PortState::CLOSED)
            || self.peer().any(PortState::CLOSING | PortState::CLOSED)
    }

    /// Blok sampai inbox sendiri berisi pesan (Data atau End).
    ///
    /// Returns `false` jika tidak akan pernah ada pesan lagi (End peer
    /// sudah terbaca, atau peer ditutup dengan inbox kosong).
    pub fn wait_flush(&self) -> bool {
        let own = self.shared();
        let sender = self.peer();
        let stopped = || {
            own.any(PortState::REMOTE_ENDED | PortState::CLOSED)
                || sender.any(PortState::CLOSING | PortState::CLOSED)
        };

        own.flush.wait_while(|| own.inbox.is_empty() && !stopped());

        !own.inbox.is_empty()
    }

    /// Handle port ikut menjaga run loop tetap hidup
    pub fn ref_handles(&self) {
        self.inner.referenced.set(true);
    }

    /// Handle port tidak lagi menjaga run loop tetap hidup
    pub fn unref_handles(&self) {
        self.inner.referenced.set(false);
    }

    /// Handle ikut menjaga run loop tetap hidup
    pub fn is_referenced(&self) -> bool {
        self.inner.referenced.get()
    }

    /// Mulai melepas resource secara asinkron; idempotent.
    ///
    /// Selesai pada iterasi run loop berikutnya dengan `PortEvent::Close`.
    pub fn close(&self) {
        teardown::begin_close(self);
    }

    /// Snapshot flag lifecycle port ini
    pub fn state(&self) -> PortState {
        self.shared().state()
    }

    /// End milik port ini sudah di-enqueue
    pub fn is_ended(&self) -> bool {
        self.shared().any(PortState::ENDED)
    }

    /// End milik peer sudah terbaca
    pub fn is_remote_ended(&self) -> bool {
        self.shared().any(PortState::REMOTE_ENDED)
    }

    /// Close sudah dimulai (explicit atau teardown)
    pub fn is_closing(&self) -> bool {
        self.shared().any(PortState::CLOSING)
    }

    /// Semua handle selesai ditutup dan resource sudah dilepas
    pub fn is_released(&self) -> bool {
        self.inner.released.get()
    }

    pub(crate) fn mark_released(&self) -> Option<Box<dyn Notify>> {
        self.inner.released.set(true);
        self.inner.notify.borrow_mut().take()
    }

    /// Panggil callback pemilik, kecuali teardown sudah dimulai
    pub(crate) fn deliver(&self, event: PortEvent) {
        if self.shared().any(PortState::EXITING) || self.run_loop().is_exiting() {
            trace!(port = %self.id(), ?event, "suppressed during teardown");
            return;
        }

        // Dikeluarkan dulu supaya callback boleh memanggil port secara re-entrant
        let taken = self.inner.notify.borrow_mut().take();
        if let Some(mut notify) = taken {
            notify.notify(self, event);
            if !self.is_released() {
                *self.inner.notify.borrow_mut() = Some(notify);
            }
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("id", &self.id())
            .field("state", &self.state())
            .field("released", &self.is_released())
            .finish()
    }
}
