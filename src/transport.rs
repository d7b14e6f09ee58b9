use thiserror::Error;

use crate::types::ParticipantId;

/// Delivery guarantee requested for one outbound message.
///
/// Everything goes reliable-ordered except state pushes, where loss is
/// acceptable: a fresh push supersedes a lost one.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Reliability {
    ReliableOrdered,
    UnreliableSequenced,
}

/// Errors reported by the transport on send
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The target is not currently connected
    #[error("Participant {target:?} is not connected")]
    NotConnected { target: ParticipantId },

    /// The transport could not accept the message
    #[error("Send to participant {target:?} failed: {reason}")]
    SendFailed {
        target: ParticipantId,
        reason: String,
    },
}

/// The narrow interface the manager needs from the reliable-datagram layer.
///
/// The transport is responsible for reliability within the chosen channel;
/// the manager never retries a send.
pub trait Transport {
    fn send(
        &mut self,
        channel: u8,
        reliability: Reliability,
        payload: &[u8],
        target: ParticipantId,
    ) -> Result<(), TransportError>;
}
