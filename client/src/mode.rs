//! Mode Detector
//!
//! Classifies the established transport path from candidate-pair stats.
//! Only the controller runs this; getStats semantics differ enough between
//! WebRTC implementations that a single authority is the only way to show
//! both peers the same mode.

use tandem_common::ConnectionMode;

use crate::events::ConnectionDetails;
use crate::peer::{CandidateKind, CandidatePair, PairState};

/// Pick the pair that carries the session.
///
/// Priority: the engine-selected pair; else a succeeded+nominated pair;
/// else any succeeded pair.
#[must_use]
pub fn select_pair(pairs: &[CandidatePair]) -> Option<&CandidatePair> {
    pairs
        .iter()
        .find(|p| p.selected)
        .or_else(|| {
            pairs
                .iter()
                .find(|p| p.state == PairState::Succeeded && p.nominated)
        })
        .or_else(|| pairs.iter().find(|p| p.state == PairState::Succeeded))
}

/// `turn` if either end of the pair is relayed, `p2p` otherwise.
#[must_use]
pub fn classify(pair: &CandidatePair) -> ConnectionMode {
    if pair.local.kind == CandidateKind::Relay || pair.remote.kind == CandidateKind::Relay {
        ConnectionMode::Turn
    } else {
        ConnectionMode::P2p
    }
}

/// Pair summary for the UI.
#[must_use]
pub fn details(pair: &CandidatePair) -> ConnectionDetails {
    ConnectionDetails {
        local_kind: pair.local.kind,
        remote_kind: pair.remote.kind,
        local_address: pair.local.address.clone(),
        remote_address: pair.remote.address.clone(),
    }
}
