//! Teardown / close state machine
//!
//! `active -> exiting? -> closing -> closed`
//!
//! - Explicit close: semua wake handle langsung mulai ditutup
//! - Host teardown: set `EXITING`, dorong handshake paksa lewat wake
//!   drain/flush, close ditunda sampai `ENDED && REMOTE_ENDED`
//! - Release: setiap handle menyelesaikan close pada iterasi loop
//!   berikutnya; penyelesaian terakhir melepas resource port

use tracing::{debug, trace};

use super::{Port, PortState};
use crate::signal::{PortEvent, WakeKind};

/// Jumlah wake handle per port yang harus selesai ditutup
pub(crate) const HANDLE_COUNT: u8 = WakeKind::ALL.len() as u8;

/// Teardown hook yang didaftarkan setiap port saat init
pub(crate) fn on_teardown(port: &Port) {
    let previous = port.shared().insert(PortState::EXITING);
    if previous.contains(PortState::CLOSING) {
        return;
    }

    debug!(port = %port.id(), state = ?previous, "teardown requested");

    let signals = port.signals();
    if !previous.contains(PortState::ENDED) {
        signals.drain.send();
    }
    if !previous.contains(PortState::REMOTE_ENDED) {
        signals.flush.send();
    }

    maybe_finish(port);
}

/// Mulai close setelah handshake paksa selesai di kedua arah
pub(crate) fn maybe_finish(port: &Port) {
    let state = port.shared().state();
    if state.contains(PortState::EXITING | PortState::ENDED | PortState::REMOTE_ENDED)
        && !state.contains(PortState::CLOSING)
    {
        begin_close(port);
    }
}

/// Mulai menutup semua wake handle; idempotent
pub(crate) fn begin_close(port: &Port) {
    let previous = port.shared().insert(PortState::CLOSING);
    if previous.contains(PortState::CLOSING) {
        return;
    }

    debug!(port = %port.id(), state = ?previous, "closing");

    let signals = port.signals();
    port.inner().closing.set(HANDLE_COUNT);
    for kind in WakeKind::ALL {
        signals.get(kind).close();
        port.run_loop().push_close(port, kind);
    }
    signals.wake_loop();

    // Peer yang menunggu End atau ruang dari kita harus mengevaluasi ulang
    port.peer().nudge();
}

/// Satu handle selesai ditutup
pub(crate) fn complete_close(port: &Port, kind: WakeKind) {
    let remaining = port.inner().closing.get();
    assert!(remaining > 0, "close completion without pending handle");

    let remaining = remaining - 1;
    port.inner().closing.set(remaining);
    trace!(port = %port.id(), ?kind, remaining, "handle closed");

    if remaining == 0 {
        release(port);
    }
}

/// Lepas resource port setelah handle terakhir selesai ditutup
fn release(port: &Port) {
    // End peer terbaca di iterasi yang sama dengan close: RemoteEnd dulu
    if port.inner().remote_end_pending.replace(false) {
        port.deliver(PortEvent::RemoteEnd);
    }

    let previous = port.shared().insert(PortState::CLOSED);

    let notify = port.mark_released();
    port.run_loop().unregister(port);

    // Waiter yang masih tersisa di kedua sisi dibangunkan
    port.shared().nudge();
    port.peer().nudge();

    debug!(port = %port.id(), "released");

    // Teardown host: tidak aman lagi memanggil callback
    if !previous.contains(PortState::EXITING) && !port.run_loop().is_exiting() {
        if let Some(mut notify) = notify {
            notify.notify(port, PortEvent::Close);
        }
    }

    port.run_loop().complete_teardown();
}

/// Run loop di-drop tanpa teardown: lepas port tanpa callback apa pun.
///
/// Peer harus melihat `CLOSING | CLOSED` supaya waiter dan handshake
/// paksanya tidak menunggu sisi ini selamanya.
pub(crate) fn abandon(port: &Port) {
    if port.is_released() {
        return;
    }

    let previous = port
        .shared()
        .insert(PortState::CLOSING | PortState::CLOSED);
    for kind in WakeKind::ALL {
        port.signals().get(kind).close();
    }
    drop(port.mark_released());

    port.shared().nudge();
    port.peer().nudge();

    debug!(port = %port.id(), state = ?previous, "abandoned with run loop");
}
