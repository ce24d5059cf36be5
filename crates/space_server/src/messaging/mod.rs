//! Message handling and routing for client-server communication.
//!
//! This module provides the wire types exchanged with clients and the router
//! that applies inbound messages to sessions and rooms.

pub mod router;
pub mod types;

pub use router::{Disposition, MessageRouter};
pub use types::{
    ClientMessage, ErrorPayload, JoinPayload, MemberView, MovePayload, MovementPayload, PeerSignal,
    ServerMessage, SpaceJoinedPayload, Spawn, UserLeftPayload,
};
