//! Peer connection management
//!
//! This module provides the pieces that link two parties:
//! - `PeerTransport` / `PeerEndpoint`: the seam to the signaling/relay service
//! - `ConnectionManager`: audio source, identity and `PeerLink` for one attempt
//! - `LoopbackNetwork`: in-process transport
//! - `TraversalConfig`: STUN/TURN servers handed to the transport

mod link;
mod loopback;
mod manager;
mod transport;
mod traversal;

pub use link::{MediaState, PeerLink, SideChannelState};
pub use loopback::LoopbackNetwork;
pub use manager::ConnectionManager;
pub use transport::{EventSink, OpenMode, PeerEndpoint, PeerEvent, PeerEventKind, PeerTransport};
pub use traversal::{IceServer, TransportPolicy, TraversalConfig};
