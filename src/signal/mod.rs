//! Signaling Subsystem: async wake + run loop
//!
//! - `Wake`: bit pending per handle (drain, flush, end), digabung
//! - `RunLoop`: mio `Poll` milik thread pemilik port
//! - `Notify`: batas ke callback milik binding layer

mod notify;
mod run_loop;
mod wake;

pub use notify::{Notify, PortEvent};
pub(crate) use run_loop::LoopShared;
pub use run_loop::RunLoop;
pub use wake::{PortSignals, Wake, WakeKind};
