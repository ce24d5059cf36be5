//! Proximity evaluation.
//!
//! After a participant moves, every other member of the room is classified
//! as nearby (distance at or below the call radius) or far. Both sides of each
//! pair are told: nearby pairs get `call_init`, far pairs get `removePeerId`,
//! each naming the other side's media peer identifier.
//!
//! Evaluation works on plain snapshots so it can run without holding any
//! lock; the router takes the snapshots and delivers the results.

use crate::connection::{ConnectionId, Position, SessionState};
use crate::messaging::{PeerSignal, ServerMessage};

/// Classification of one pair of participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Proximity {
    Nearby,
    Far,
}

impl Proximity {
    /// Classifies two positions against `radius`. The boundary counts as nearby.
    pub fn classify(a: Position, b: Position, radius: f64) -> Self {
        if a.distance(b) <= radius {
            Proximity::Nearby
        } else {
            Proximity::Far
        }
    }
}

/// What the evaluator needs to know about one room member.
#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub user_id: Option<String>,
    pub peer_id: Option<String>,
    pub position: Position,
}

impl Participant {
    pub fn from_state(connection_id: ConnectionId, state: &SessionState) -> Self {
        Self {
            connection_id,
            user_id: state.user_id.clone(),
            peer_id: state.peer_id.clone(),
            position: state.position,
        }
    }

    /// Returns `true` if both entries belong to the same account.
    fn same_account(&self, other: &Participant) -> bool {
        matches!((&self.user_id, &other.user_id), (Some(a), Some(b)) if a == b)
    }
}

/// A signal to deliver to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProximitySignal {
    pub recipient: ConnectionId,
    pub proximity: Proximity,
    /// Peer identifier of the other side of the pair
    pub remote_peer_id: String,
}

impl ProximitySignal {
    pub fn into_message(self) -> ServerMessage {
        let signal = PeerSignal {
            remote_peer_id: self.remote_peer_id,
        };
        match self.proximity {
            Proximity::Nearby => ServerMessage::CallInit(signal),
            Proximity::Far => ServerMessage::RemovePeerId(signal),
        }
    }
}

/// Computes the signals produced by `mover` having moved.
///
/// `others` may include the mover itself; it is skipped, as is any entry
/// belonging to the mover's own account or lacking a peer identifier. For
/// every remaining member two signals are produced, one to each side.
pub fn evaluate(mover: &Participant, others: &[Participant], radius: f64) -> Vec<ProximitySignal> {
    let Some(mover_peer) = mover.peer_id.as_ref() else {
        return Vec::new();
    };

    let mut signals = Vec::with_capacity(others.len() * 2);
    for other in others {
        if other.connection_id == mover.connection_id || mover.same_account(other) {
            continue;
        }
        let Some(other_peer) = other.peer_id.as_ref() else {
            continue;
        };

        let proximity = Proximity::classify(mover.position, other.position, radius);
        signals.push(ProximitySignal {
            recipient: mover.connection_id,
            proximity,
            remote_peer_id: other_peer.clone(),
        });
        signals.push(ProximitySignal {
            recipient: other.connection_id,
            proximity,
            remote_peer_id: mover_peer.clone(),
        });
    }
    signals
}
