//! Boundary with the transport-control widget.

pub mod transport;

pub use transport::{TransportCommand, TransportState, TransportUpdate};
