//! Optimistic mutation flow.
//!
//! Each mutation is applied to the store before the server call, then
//! resolved against the store when the call returns. Responses for a
//! `(message, kind)` pair that has since been mutated again never touch the
//! optimistic state.

use std::sync::Arc;

use tracing::{debug, warn};

use super::mutation::{Mutation, MutationError, MutationOutcome};
use super::session::Shared;
use super::store::{Begin, MutationTicket, Resolution};
use crate::api::{ApiError, MailApi};
use crate::model::MessageId;

impl<A: MailApi> Shared<A> {
    /// Applies a mutation optimistically and waits for the server.
    pub(super) async fn mutate(
        &self,
        id: MessageId,
        mutation: Mutation,
    ) -> Result<MutationOutcome, MutationError> {
        match self.with_store(|store| store.begin_mutation(id, mutation))? {
            Begin::Unchanged => {
                debug!(message = %id, kind = %mutation.kind(), "Mutation already reflected");
                Ok(MutationOutcome::Unchanged)
            }
            Begin::Issued(ticket) => self.finish(ticket).await,
        }
    }

    /// Completes an issued mutation on a background task. Failures are logged.
    pub(super) fn finish_in_background(self: &Arc<Self>, begin: Begin) {
        let Begin::Issued(ticket) = begin else {
            return;
        };
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = shared.finish(ticket).await {
                warn!(error = %err, "Background mutation failed");
            }
        });
    }

    async fn finish(&self, ticket: MutationTicket) -> Result<MutationOutcome, MutationError> {
        let MutationTicket {
            message_id,
            mutation,
            sequence,
        } = ticket;
        debug!(message = %message_id, kind = %mutation.kind(), sequence, "Sending mutation");

        let result = self.call(message_id, mutation).await;
        let resolution = self.with_store(|store| store.resolve_mutation(ticket, &result));

        match result {
            Ok(()) if resolution == Resolution::Superseded => Ok(MutationOutcome::Superseded),
            Ok(()) => Ok(MutationOutcome::Confirmed),
            Err(cause) => {
                if cause.is_unauthorized() {
                    self.expire();
                }
                if resolution == Resolution::Superseded {
                    debug!(message = %message_id, error = %cause, "Superseded mutation failed");
                    return Ok(MutationOutcome::Superseded);
                }
                Err(MutationError::Failed {
                    kind: mutation.kind(),
                    message_id,
                    cause,
                })
            }
        }
    }

    async fn call(&self, id: MessageId, mutation: Mutation) -> Result<(), ApiError> {
        match mutation {
            Mutation::SetStarred(starred) => self.api.set_starred(id, starred, &self.token).await,
            Mutation::MarkRead => self.api.mark_read(id, &self.token).await,
            Mutation::MoveTo(folder) => self.api.move_message(id, folder, &self.token).await,
        }
    }
}
