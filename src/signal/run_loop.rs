//! Run loop pemilik port (event-driven, berbasis mio)
//!
//! Satu `Poll` + satu `Waker` per thread. Setiap wake membuat loop
//! men-dispatch bit pending semua port yang terdaftar. Loop juga menjadi
//! mekanisme deferred-teardown host: setiap port mendaftar saat init dan
//! melapor selesai saat resource-nya dilepas.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use mio::{Events, Poll, Token, Waker};
use tracing::debug;

use crate::channel::{handshake, teardown, Port};
use crate::error::Result;
use crate::signal::WakeKind;

const WAKE_TOKEN: Token = Token(0);
const EVENTS_CAPACITY: usize = 64;
const TEARDOWN_POLL: Duration = Duration::from_millis(10);

/// State loop yang ikut dipegang setiap `Port`
pub(crate) struct LoopShared {
    waker: Arc<Waker>,
    ports: RefCell<Vec<Port>>,
    closing: RefCell<VecDeque<(Port, WakeKind)>>,
    pending_teardowns: Cell<usize>,
    exiting: Cell<bool>,
}

impl LoopShared {
    pub(crate) fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }

    /// Daftarkan port sekaligus teardown hook-nya
    pub(crate) fn register(&self, port: &Port) {
        self.ports.borrow_mut().push(port.clone());
        self.pending_teardowns.set(self.pending_teardowns.get() + 1);
    }

    pub(crate) fn unregister(&self, port: &Port) {
        self.ports.borrow_mut().retain(|p| !p.same_port(port));
    }

    /// Close handle selesai pada iterasi loop berikutnya
    pub(crate) fn push_close(&self, port: &Port, kind: WakeKind) {
        self.closing.borrow_mut().push_back((port.clone(), kind));
    }

    /// Port melapor resource-nya sudah dilepas
    pub(crate) fn complete_teardown(&self) {
        let pending = self.pending_teardowns.get();
        assert!(pending > 0, "teardown completion without registration");
        self.pending_teardowns.set(pending - 1);
    }

    pub(crate) fn is_exiting(&self) -> bool {
        self.exiting.get()
    }
}

pub struct RunLoop {
    poll: Poll,
    events: Events,
    shared: Rc<LoopShared>,
}

impl RunLoop {
    pub fn new() -> Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKE_TOKEN)?);

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            shared: Rc::new(LoopShared {
                waker,
                ports: RefCell::new(Vec::new()),
                closing: RefCell::new(VecDeque::new()),
                pending_teardowns: Cell::new(0),
                exiting: Cell::new(false),
            }),
        })
    }

    pub(crate) fn shared(&self) -> &Rc<LoopShared> {
        &self.shared
    }

    /// Jalankan loop sampai tidak ada handle ter-ref yang masih hidup
    pub fn run(&mut self) -> Result<()> {
        while self.is_alive() {
            self.run_once(None)?;
        }
        Ok(())
    }

    /// Satu iterasi: poll, dispatch bit pending, selesaikan close handle.
    ///
    /// Returns `true` jika loop masih alive.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> Result<bool> {
        let timeout = if self.shared.closing.borrow().is_empty() {
            timeout
        } else {
            Some(Duration::ZERO)
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }

        // Bit pending dicek langsung, event waker cukup sebagai pemicu
        let ports = self.shared.ports.borrow().clone();
        for port in &ports {
            handshake::dispatch(port);
        }

        self.process_closing();

        Ok(self.is_alive())
    }

    fn process_closing(&mut self) {
        loop {
            let next = self.shared.closing.borrow_mut().pop_front();
            match next {
                Some((port, kind)) => teardown::complete_close(&port, kind),
                None => break,
            }
        }
    }

    /// Ada close yang belum selesai, atau port ter-ref yang belum dilepas
    pub fn is_alive(&self) -> bool {
        !self.shared.closing.borrow().is_empty()
            || self
                .shared
                .ports
                .borrow()
                .iter()
                .any(|port| port.is_referenced() && !port.is_released())
    }

    /// Host-driven teardown.
    ///
    /// Menjalankan teardown hook setiap port lalu memompa loop sampai semua
    /// port melapor resource-nya sudah dilepas. Handshake dipaksa selesai
    /// tanpa partisipasi kode aplikasi; tidak ada callback yang dipanggil
    /// setelah titik ini.
    pub fn teardown(&mut self) -> Result<()> {
        if !self.shared.exiting.replace(true) {
            let ports = self.shared.ports.borrow().clone();
            debug!(ports = ports.len(), "run loop teardown");
            for port in &ports {
                teardown::on_teardown(port);
            }
        }

        while self.shared.pending_teardowns.get() > 0 {
            self.run_once(Some(TEARDOWN_POLL))?;
        }

        Ok(())
    }

    pub fn is_exiting(&self) -> bool {
        self.shared.is_exiting()
    }

    /// Jumlah port yang belum melapor selesai ke mekanisme deferred-teardown
    pub fn pending_teardowns(&self) -> usize {
        self.shared.pending_teardowns.get()
    }

    /// Jumlah port yang masih terdaftar
    pub fn port_count(&self) -> usize {
        self.shared.ports.borrow().len()
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        // Putus siklus Rc port <-> loop
        self.shared.closing.borrow_mut().clear();
        let ports = std::mem::take(&mut *self.shared.ports.borrow_mut());
        for port in &ports {
            teardown::abandon(port);
        }
    }
}
