//! Termination handshake dan dispatch wake
//!
//! Per arah: `open -> ended` (kita berhenti mengirim) dan, independen,
//! `open -> remote_ended` (End peer terbaca). Port selesai hanya jika
//! kedua arah sudah resolved.
//!
//! Jalur paksa (host teardown): handler drain menyintesis End atas nama
//! aplikasi, handler flush membuang Data yang tersisa sampai End peer.

use tracing::{debug, trace};

use super::{teardown, Port, PortState};
use crate::core::Message;
use crate::signal::PortEvent;

/// Dispatch bit pending milik satu port (dipanggil run loop)
pub(crate) fn dispatch(port: &Port) {
    if port.is_released() {
        return;
    }

    let signals = port.signals();
    let drain = signals.drain.take();
    let flush = signals.flush.take();
    let end = signals.end.take();
    let remote_end = port.inner().remote_end_pending.replace(false);

    // Handle sedang ditutup: event tidak relevan lagi, kecuali RemoteEnd
    // yang sudah terbaca sebelum close dan harus tetap sampai tepat sekali
    if port.shared().any(PortState::CLOSING) {
        if remote_end {
            port.deliver(PortEvent::RemoteEnd);
        }
        return;
    }

    if drain {
        on_drain(port);
    }
    if flush {
        on_flush(port);
    }
    if end {
        on_end(port);
    }
    if remote_end {
        port.deliver(PortEvent::RemoteEnd);
    }
}

fn on_drain(port: &Port) {
    let state = port.shared().state();

    if state.contains(PortState::EXITING) {
        if !state.contains(PortState::ENDED) {
            force_end(port);
        }
        teardown::maybe_finish(port);
        return;
    }

    if state.contains(PortState::ENDED) {
        trace!(port = %port.id(), "drain after end ignored");
        return;
    }

    port.deliver(PortEvent::Drain);
}

fn on_flush(port: &Port) {
    let state = port.shared().state();

    if state.contains(PortState::EXITING) {
        discard_until_end(port);
        teardown::maybe_finish(port);
        return;
    }

    if state.contains(PortState::REMOTE_ENDED) {
        trace!(port = %port.id(), "flush after remote end ignored");
        return;
    }

    port.deliver(PortEvent::Flush);
}

fn on_end(port: &Port) {
    if port.shared().any(PortState::EXITING) {
        teardown::maybe_finish(port);
        return;
    }

    port.deliver(PortEvent::End);
}

/// Sintesis End atas nama aplikasi yang tidak pernah memanggil `end`.
///
/// Jika inbox peer penuh, End dicoba lagi pada drain berikutnya (setiap
/// `read` peer mengirim drain). Peer yang tidak akan pernah membaca lagi
/// dianggap sudah menerima.
fn force_end(port: &Port) {
    if port.enqueue_end() {
        debug!(port = %port.id(), "end synthesized on teardown");
        return;
    }

    if port.peer().is_gone() {
        port.shared().insert(PortState::ENDED);
        debug!(port = %port.id(), "peer gone, end direction resolved");
    } else {
        trace!(port = %port.id(), "peer inbox full, end retried on next drain");
    }
}

/// Buang Data yang belum dibaca sampai End peer.
fn discard_until_end(port: &Port) {
    // Dibaca sebelum inbox dikuras: End yang ditulis sebelum peer mulai
    // close pasti sudah terlihat setelah load ini
    let peer_gone = port.peer().is_gone();
    let mut discarded = 0usize;

    while !port.is_remote_ended() {
        match port.retire() {
            Some(Message::Data(_)) => discarded += 1,
            Some(Message::End) | None => break,
        }
    }

    if discarded > 0 {
        debug!(port = %port.id(), discarded, "pending data discarded on teardown");
    }

    if !port.is_remote_ended() && peer_gone {
        port.shared().insert(PortState::REMOTE_ENDED);
        debug!(port = %port.id(), "peer gone, remote end direction resolved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, PortId};
    use crate::core::PORT_CAPACITY;
    use crate::signal::RunLoop;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    #[test]
    fn test_drain_after_end_is_noop() {
        let channel = Channel::new();
        let mut run_loop = RunLoop::new().unwrap();
        let events: Rc<RefCell<Vec<PortEvent>>> = Rc::default();
        let sink = Rc::clone(&events);
        let a = Port::init(&channel, &run_loop, move |_: &Port, event: PortEvent| {
            sink.borrow_mut().push(event)
        })
        .unwrap();
        let b = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).unwrap();

        a.write("x").unwrap();
        b.read().unwrap(); // drain pending untuk a
        assert!(a.end());
        run_loop.run_once(Some(Duration::ZERO)).unwrap();

        assert!(!events.borrow().contains(&PortEvent::Drain));
    }

    #[test]
    fn test_forced_end_retries_after_peer_drains() {
        let channel = Channel::new();
        let mut run_loop = RunLoop::new().unwrap();
        let a = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).unwrap();
        let b = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).unwrap();

        for _ in 0..PORT_CAPACITY - 1 {
            a.write("fill").unwrap();
        }
        assert_eq!(channel.unread(PortId::One), PORT_CAPACITY - 1);

        // Inbox b penuh: End dari a baru masuk setelah b membuang Data
        run_loop.teardown().unwrap();

        assert!(a.is_released() && b.is_released());
        assert!(b.state().contains(PortState::REMOTE_ENDED));
        assert_eq!(channel.unread(PortId::One), 0);
    }

    #[test]
    fn test_remote_end_not_delivered_while_exiting() {
        let channel = Channel::new();
        let mut run_loop = RunLoop::new().unwrap();
        let events: Rc<RefCell<Vec<PortEvent>>> = Rc::default();
        let sink = Rc::clone(&events);
        let a = Port::init(&channel, &run_loop, |_: &Port, _: PortEvent| {}).unwrap();
        let _b = Port::init(&channel, &run_loop, move |_: &Port, event: PortEvent| {
            sink.borrow_mut().push(event)
        })
        .unwrap();

        assert!(a.end());
        run_loop.teardown().unwrap();

        assert!(!events.borrow().contains(&PortEvent::RemoteEnd));
    }
}
