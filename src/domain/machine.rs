//! The payment lifecycle as a pure state machine.
//!
//! ```text
//! Idle --submit--> Created --approval--> AwaitingServerApproval
//!                     |                        |
//!                     |                   completion
//!                     |                        v
//!                     |              AwaitingServerCompletion --confirmed--> Completed
//!                     |                        |
//!                     +----- cancel / error ---+--> Cancelled | Failed
//! ```
//!
//! `error` is also accepted from `Idle`: a failure may surface before the
//! request was submitted.
//!
//! [`transition`] only decides the destination state. Identifier bookkeeping
//! lives in [`PaymentRequest::apply`].

use super::payment::{PaymentData, PaymentId, PaymentRequest, PaymentTicket, TxId};
use crate::error::TransitionError;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Idle,
    Created,
    AwaitingServerApproval,
    AwaitingServerCompletion,
    Completed,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// A payment in this state is attached to the session.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            Self::Created | Self::AwaitingServerApproval | Self::AwaitingServerCompletion
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Created => "created",
            Self::AwaitingServerApproval => "awaiting_server_approval",
            Self::AwaitingServerCompletion => "awaiting_server_completion",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Discrete inputs to the machine: the purchase action, the provider
/// callbacks, and the external completion confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Submit,
    ReadyForApproval(PaymentId),
    ReadyForCompletion(PaymentId, TxId),
    Cancel(PaymentId),
    Error(String),
    CompletionConfirmed(PaymentId),
}

impl PaymentEvent {
    fn payment_id(&self) -> Option<&PaymentId> {
        match self {
            Self::ReadyForApproval(id)
            | Self::ReadyForCompletion(id, _)
            | Self::Cancel(id)
            | Self::CompletionConfirmed(id) => Some(id),
            Self::Submit | Self::Error(_) => None,
        }
    }
}

impl fmt::Display for PaymentEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => f.write_str("submit"),
            Self::ReadyForApproval(id) => write!(f, "ready_for_approval({id})"),
            Self::ReadyForCompletion(id, txid) => write!(f, "ready_for_completion({id}, {txid})"),
            Self::Cancel(id) => write!(f, "cancel({id})"),
            Self::Error(reason) => write!(f, "error({reason})"),
            Self::CompletionConfirmed(id) => write!(f, "completion_confirmed({id})"),
        }
    }
}

/// Computes the destination of `event` applied in `state`.
pub fn transition(
    state: PaymentStatus,
    event: &PaymentEvent,
) -> Result<PaymentStatus, TransitionError> {
    use PaymentStatus::*;

    let next = match (state, event) {
        (Idle, PaymentEvent::Submit) => Some(Created),
        (Created, PaymentEvent::ReadyForApproval(_)) => Some(AwaitingServerApproval),
        (AwaitingServerApproval, PaymentEvent::ReadyForCompletion(..)) => {
            Some(AwaitingServerCompletion)
        }
        (AwaitingServerCompletion, PaymentEvent::CompletionConfirmed(_)) => Some(Completed),
        (s, PaymentEvent::Cancel(_)) if s.is_in_flight() => Some(Cancelled),
        (s, PaymentEvent::Error(_)) if !s.is_terminal() => Some(Failed),
        _ => None,
    };

    next.ok_or_else(|| TransitionError::Invalid {
        state,
        event: event.clone(),
    })
}

/// Result of feeding an event to an attached request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Moved(PaymentStatus),
    /// The event restated the current state; nothing changed.
    Duplicate,
}

impl PaymentRequest {
    /// Creates a request for `data` and moves it out of `Idle` with [`PaymentEvent::Submit`].
    pub fn submit(ticket: PaymentTicket, data: PaymentData) -> Result<Self, TransitionError> {
        let mut request = Self::new(ticket, data);
        request.apply(&PaymentEvent::Submit)?;
        Ok(request)
    }

    /// Applies `event`, keeping the provider payment id fixed once assigned.
    pub fn apply(&mut self, event: &PaymentEvent) -> Result<Applied, TransitionError> {
        if let (Some(expected), Some(got)) = (&self.payment_id, event.payment_id())
            && expected != got
        {
            return Err(TransitionError::PaymentIdMismatch {
                expected: expected.clone(),
                got: got.clone(),
            });
        }

        let duplicate = match event {
            PaymentEvent::ReadyForApproval(_) => {
                self.status == PaymentStatus::AwaitingServerApproval
            }
            PaymentEvent::ReadyForCompletion(_, txid) => {
                self.status == PaymentStatus::AwaitingServerCompletion
                    && self.txid.as_ref() == Some(txid)
            }
            _ => false,
        };
        if duplicate {
            return Ok(Applied::Duplicate);
        }

        let next = transition(self.status, event)?;
        match event {
            PaymentEvent::ReadyForApproval(id) | PaymentEvent::Cancel(id) => {
                self.payment_id.get_or_insert_with(|| id.clone());
            }
            PaymentEvent::ReadyForCompletion(_, txid) => self.txid = Some(txid.clone()),
            _ => {}
        }
        self.status = next;
        Ok(Applied::Moved(next))
    }
}
