//! Cross-process transport objects.
//!
//! The region is a file mapped with `MAP_SHARED`; each signal is a FIFO.
//! Both live under the configured runtime directory so the command producer
//! can open them by name.

mod fifo;
mod region;

pub use fifo::FifoSignal;
pub use region::MappedRegion;
