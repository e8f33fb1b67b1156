//! Endpoint blocking di atas satu `Port`
//!
//! Untuk thread yang lebih suka menunggu daripada event-driven:
//! - `send`: retry + `wait_drain` saat backpressure
//! - `recv`: buffer lokal, di-refill sampai `max_buffered` per `wait_flush`
//! - `close`: End, buang sisa stream sampai End peer, lalu lepas resource

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::channel::{Channel, Port, PortId};
use crate::config::EndpointConfig;
use crate::core::Payload;
use crate::error::{ChannelError, Result};
use crate::signal::{PortEvent, RunLoop};

pub struct Endpoint {
    run_loop: RunLoop,
    port: Port,
    buffer: VecDeque<Payload>,
    config: EndpointConfig,
}

impl Endpoint {
    /// Claim port pada `channel` dengan konfigurasi default
    pub fn connect(channel: &Arc<Channel>) -> Result<Self> {
        Self::with_config(channel, EndpointConfig::default())
    }

    pub fn with_config(channel: &Arc<Channel>, config: EndpointConfig) -> Result<Self> {
        let run_loop = RunLoop::new()?;
        let port = Port::init(channel, &run_loop, |port: &Port, event: PortEvent| {
            trace!(port = %port.id(), ?event, "endpoint event");
        })?;

        // Endpoint blocking tidak memompa loop kecuali saat close
        port.unref_handles();

        Ok(Self {
            run_loop,
            port,
            buffer: VecDeque::with_capacity(config.max_buffered),
            config,
        })
    }

    pub fn id(&self) -> PortId {
        self.port.id()
    }

    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Pesan yang sudah ditarik ke buffer lokal tapi belum di-`recv`
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_remote_ended(&self) -> bool {
        self.port.is_remote_ended()
    }

    /// Kirim payload, blocking selama inbox peer penuh.
    pub fn send(&mut self, payload: impl Into<Payload>) -> Result<()> {
        let mut payload = payload.into();

        loop {
            match self.port.write(payload) {
                Ok(()) => return Ok(()),
                Err(rejected) => {
                    if !self.port.wait_drain() {
                        return Err(ChannelError::Closed(self.id()));
                    }
                    payload = rejected;
                }
            }
        }
    }

    /// Kirim tanpa blocking; `Err` mengembalikan payload
    pub fn try_send(&mut self, payload: impl Into<Payload>) -> std::result::Result<(), Payload> {
        self.port.write(payload)
    }

    /// Terima pesan berikutnya, blocking sampai ada.
    ///
    /// `None` berarti stream dari peer sudah selesai.
    pub fn recv(&mut self) -> Option<Payload> {
        loop {
            if let Some(payload) = self.buffer.pop_front() {
                return Some(payload);
            }

            if self.refill() == 0 && !self.port.wait_flush() {
                return None;
            }
        }
    }

    /// Terima tanpa blocking
    pub fn try_recv(&mut self) -> Option<Payload> {
        if self.buffer.is_empty() {
            self.refill();
        }
        self.buffer.pop_front()
    }

    fn refill(&mut self) -> usize {
        let mut pulled = 0;
        while self.buffer.len() < self.config.max_buffered {
            match self.port.read() {
                Some(payload) => {
                    self.buffer.push_back(payload);
                    pulled += 1;
                }
                None => break,
            }
        }
        pulled
    }

    /// Tutup graceful: End, tunggu End peer, lalu lepas resource port.
    pub fn close(mut self) -> Result<()> {
        let id = self.id();

        // Sisa stream masuk tidak lagi diserahkan ke siapa pun
        self.buffer.clear();
        let mut discarded = 0usize;

        // Peer bisa sedang blocking di `send` ke inbox kita yang penuh:
        // inbox dikuras selama End belum muat, poll bangun oleh drain atau flush
        while !self.port.end() {
            while self.port.read().is_some() {
                discarded += 1;
            }
            if self.port.is_send_stopped() {
                break;
            }
            self.run_loop.run_once(Some(self.config.poll_interval))?;
        }

        while !self.port.is_remote_ended() {
            while self.port.read().is_some() {
                discarded += 1;
            }
            if !self.port.is_remote_ended() && !self.port.wait_flush() {
                break;
            }
        }

        debug!(port = %id, discarded, "endpoint handshake done");
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        self.port.close();
        while !self.port.is_released() {
            self.run_loop.run_once(Some(self.config.poll_interval))?;
        }
        Ok(())
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        if !self.port.is_released() {
            // Peer yang masih menunggu harus tahu sisi ini sudah pergi
            let _ = self.shutdown();
        }
    }
}
