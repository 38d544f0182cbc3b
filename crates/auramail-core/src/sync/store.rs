//! Mailbox snapshot store.
//!
//! The store is the only mutable mailbox state. It keeps the last listing the
//! server returned for the active folder's endpoint and overlays pending
//! optimistic mutations on top of it; the published snapshot is always the
//! projection of that overlay onto the active folder. Rolling a mutation back
//! is therefore just dropping its overlay: a reverted flag takes its server
//! value again and a message that was moved away reappears at its listing
//! position.
//!
//! Fetches and mutations are the two writers. Both are split into a begin
//! step, taken before the network call, and a completion step, taken after it.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::debug;

use super::mutation::{Mutation, MutationError, MutationKind, PendingMutation};
use super::projector;
use super::selection::{Selected, SelectionTracker};
use crate::api::{ApiError, RawMailboxPage};
use crate::model::{
    Endpoint, FolderContents, FolderCounts, FolderView, MailboxSnapshot, MailboxView, Message,
    MessageId, ServerFolder,
};

type MutationKey = (MessageId, MutationKind);

/// A fetch that has been started and not yet completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    /// Folder active when the fetch was issued.
    pub folder: FolderView,
    /// Issue order across all fetches of the store.
    pub generation: u64,
}

/// Why a fetch result was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The user switched folders while the fetch was in flight.
    FolderChanged,
    /// A fetch issued later was already applied.
    Superseded,
}

/// Result of completing a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The listing replaced the snapshot.
    Applied {
        /// Inbox messages that were not in the previous inbox listing.
        new_messages: Vec<MessageId>,
    },
    /// The listing was dropped.
    Discarded(DiscardReason),
}

/// A mutation that has been applied locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationTicket {
    /// Target message.
    pub message_id: MessageId,
    /// Value applied.
    pub mutation: Mutation,
    /// Sequence assigned at issue time.
    pub sequence: u64,
}

/// Result of beginning a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    /// Applied optimistically; the server call must follow.
    Issued(MutationTicket),
    /// The message already has the value.
    Unchanged,
}

/// What resolving a mutation did to the local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The server accepted the newest mutation for its key.
    Confirmed,
    /// The newest mutation failed and its optimistic value was removed.
    RolledBack,
    /// A mark-read failed; the local read state is kept.
    Kept,
    /// A newer mutation for the same key exists; the optimistic state was left alone.
    Superseded,
}

#[derive(Debug, Clone, Copy, Default)]
struct KeyState {
    /// Newest sequence issued for the key.
    latest_issued: u64,
    /// Newest sequence whose success was folded into the listing.
    folded: u64,
    /// Requests issued for the key that have not been resolved.
    outstanding: u32,
}

/// A confirmed mutation that fetches issued before its confirmation do not
/// reflect yet.
#[derive(Debug, Clone, Copy)]
struct Settled {
    message_id: MessageId,
    mutation: Mutation,
    /// Fetches with a lower generation were issued before the confirmation.
    before_generation: u64,
}

#[derive(Debug, Clone)]
struct Listing {
    messages: Vec<Message>,
    fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    generation: u64,
    started: Instant,
}

/// Single holder of the active folder's snapshot and of pending mutations.
#[derive(Debug)]
pub struct SnapshotStore {
    folder: FolderView,
    listing: Option<Listing>,
    pending: HashMap<MutationKey, PendingMutation>,
    keys: HashMap<MutationKey, KeyState>,
    settled: Vec<Settled>,
    next_sequence: u64,
    next_generation: u64,
    last_applied_generation: u64,
    in_flight: Option<InFlight>,
    known_inbox: Option<HashSet<MessageId>>,
    selection: SelectionTracker,
    counts: FolderCounts,
    contents: FolderContents,
    session_expired: bool,
}

impl SnapshotStore {
    /// Creates an empty store showing `folder`.
    #[must_use]
    pub fn new(folder: FolderView) -> Self {
        Self {
            folder,
            listing: None,
            pending: HashMap::new(),
            keys: HashMap::new(),
            settled: Vec::new(),
            next_sequence: 1,
            next_generation: 1,
            last_applied_generation: 0,
            in_flight: None,
            known_inbox: None,
            selection: SelectionTracker::default(),
            counts: FolderCounts::default(),
            contents: FolderContents::NotLoaded,
            session_expired: false,
        }
    }

    /// Folder being displayed.
    #[must_use]
    pub const fn folder(&self) -> FolderView {
        self.folder
    }

    /// The rendered snapshot, if the folder has loaded.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&MailboxSnapshot> {
        self.contents.snapshot()
    }

    /// The open message.
    #[must_use]
    pub const fn selected(&self) -> Option<MessageId> {
        self.selection.selected()
    }

    /// Pending mutation for a message and kind.
    #[must_use]
    pub fn pending(&self, id: MessageId, kind: MutationKind) -> Option<&PendingMutation> {
        self.pending.get(&(id, kind))
    }

    /// Number of pending mutations.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether the server rejected the session credential.
    #[must_use]
    pub const fn session_expired(&self) -> bool {
        self.session_expired
    }

    /// Records that the credential was rejected.
    pub const fn mark_session_expired(&mut self) {
        self.session_expired = true;
    }

    /// Builds the value published to observers.
    #[must_use]
    pub fn view(&self) -> MailboxView {
        MailboxView {
            folder: self.folder,
            contents: self.contents.clone(),
            selected: self.selection.selected(),
            counts: self.counts,
            refreshing: self.in_flight.is_some(),
            session_expired: self.session_expired,
        }
    }

    /// Switches the displayed folder. Returns `false` if it was already active.
    ///
    /// Folders fed by the same endpoint render immediately from the listing
    /// already held; otherwise the folder starts out not loaded.
    pub fn set_active_folder(&mut self, folder: FolderView) -> bool {
        if folder == self.folder {
            return false;
        }
        if projector::endpoint_for(folder) != projector::endpoint_for(self.folder) {
            self.listing = None;
        }
        debug!(from = %self.folder, to = %folder, "Switching folder");
        self.folder = folder;
        self.in_flight = None;
        self.recompute();
        true
    }

    /// Starts a fetch for the active folder, unless one younger than
    /// `coalesce_window` is still outstanding.
    pub fn begin_fetch(&mut self, now: Instant, coalesce_window: Duration) -> Option<FetchTicket> {
        if let Some(in_flight) = self.in_flight
            && now.saturating_duration_since(in_flight.started) < coalesce_window
        {
            debug!(generation = in_flight.generation, "Fetch already in flight");
            return None;
        }

        let generation = self.next_generation;
        self.next_generation += 1;
        self.in_flight = Some(InFlight {
            generation,
            started: now,
        });
        Some(FetchTicket {
            folder: self.folder,
            generation,
        })
    }

    /// Gives up on a fetch that failed.
    pub fn abandon_fetch(&mut self, ticket: FetchTicket) {
        self.clear_in_flight(ticket);
    }

    /// Applies a completed fetch, if it is still relevant.
    pub fn complete_fetch(&mut self, ticket: FetchTicket, page: RawMailboxPage) -> FetchOutcome {
        self.clear_in_flight(ticket);

        if ticket.folder != self.folder {
            debug!(fetched = %ticket.folder, active = %self.folder, "Discarding fetch for inactive folder");
            return FetchOutcome::Discarded(DiscardReason::FolderChanged);
        }
        if ticket.generation <= self.last_applied_generation {
            debug!(
                generation = ticket.generation,
                applied = self.last_applied_generation,
                "Discarding superseded fetch"
            );
            return FetchOutcome::Discarded(DiscardReason::Superseded);
        }

        let mut messages = page.messages;

        for settled in &self.settled {
            if ticket.generation < settled.before_generation
                && let Some(message) = messages.iter_mut().find(|m| m.id == settled.message_id)
            {
                settled.mutation.apply(message);
            }
        }
        self.settled
            .retain(|s| s.before_generation > ticket.generation + 1);

        self.pending.retain(|_, pending| {
            let satisfied = messages
                .iter()
                .find(|m| m.id == pending.message_id)
                .is_some_and(|m| pending.mutation.is_reflected_in(m));
            if satisfied {
                debug!(message = %pending.message_id, kind = %pending.mutation.kind(), "Pending mutation satisfied by fetch");
            }
            !satisfied
        });

        let new_messages = if page.endpoint == Endpoint::Inbox {
            self.track_inbox(&messages)
        } else {
            Vec::new()
        };

        self.listing = Some(Listing {
            messages,
            fetched_at: Utc::now(),
        });
        self.last_applied_generation = ticket.generation;
        self.recompute();

        FetchOutcome::Applied { new_messages }
    }

    /// Applies a mutation optimistically and records it as pending,
    /// superseding any pending mutation of the same kind on the message.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotInView`] if the message is not displayed.
    pub fn begin_mutation(
        &mut self,
        id: MessageId,
        mutation: Mutation,
    ) -> Result<Begin, MutationError> {
        let message = self
            .snapshot()
            .and_then(|s| s.get(id))
            .ok_or(MutationError::NotInView(id))?;

        if mutation.is_reflected_in(message) {
            return Ok(Begin::Unchanged);
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let pending = PendingMutation {
            message_id: id,
            mutation,
            sequence,
        };
        let key = pending.key();
        let state = self.keys.entry(key).or_default();
        state.latest_issued = sequence;
        state.outstanding += 1;
        if let Some(previous) = self.pending.insert(key, pending) {
            debug!(message = %id, kind = %key.1, superseded = previous.sequence, sequence, "Superseding pending mutation");
        }
        self.recompute();

        Ok(Begin::Issued(MutationTicket {
            message_id: id,
            mutation,
            sequence,
        }))
    }

    /// Resolves a mutation with the server's answer.
    pub fn resolve_mutation(
        &mut self,
        ticket: MutationTicket,
        result: &Result<(), ApiError>,
    ) -> Resolution {
        let key = (ticket.message_id, ticket.mutation.kind());
        let state = self.keys.entry(key).or_default();
        state.outstanding = state.outstanding.saturating_sub(1);
        let is_latest = state.latest_issued == ticket.sequence;
        let pending_matches = self
            .pending
            .get(&key)
            .is_some_and(|p| p.sequence == ticket.sequence);

        let resolution = match result {
            Ok(()) => {
                if ticket.sequence > state.folded {
                    state.folded = ticket.sequence;
                    self.fold(ticket);
                }
                if is_latest {
                    if pending_matches {
                        self.pending.remove(&key);
                    }
                    Resolution::Confirmed
                } else {
                    Resolution::Superseded
                }
            }
            Err(_) if !is_latest => Resolution::Superseded,
            Err(_) if ticket.mutation.kind() == MutationKind::MarkRead => {
                if pending_matches {
                    self.pending.remove(&key);
                    self.apply_to_listing(ticket.message_id, ticket.mutation);
                }
                Resolution::Kept
            }
            Err(_) => {
                if pending_matches {
                    self.pending.remove(&key);
                }
                Resolution::RolledBack
            }
        };

        debug!(message = %ticket.message_id, kind = %key.1, sequence = ticket.sequence, ?resolution, "Mutation resolved");
        // nothing older can still arrive for an idle key
        if self.keys.get(&key).is_some_and(|s| s.outstanding == 0)
            && !self.pending.contains_key(&key)
        {
            self.keys.remove(&key);
        }
        self.recompute();
        resolution
    }

    /// Selects a message in the current snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotInView`] if the message is not displayed.
    pub fn select(&mut self, id: MessageId) -> Result<Selected, MutationError> {
        let snapshot = self.contents.snapshot();
        self.selection
            .select(snapshot, id)
            .ok_or(MutationError::NotInView(id))
    }

    /// Drops the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn clear_in_flight(&mut self, ticket: FetchTicket) {
        if self
            .in_flight
            .is_some_and(|f| f.generation == ticket.generation)
        {
            self.in_flight = None;
        }
    }

    /// Folds a confirmed mutation into the known server state.
    fn fold(&mut self, ticket: MutationTicket) {
        self.apply_to_listing(ticket.message_id, ticket.mutation);
        self.settled.push(Settled {
            message_id: ticket.message_id,
            mutation: ticket.mutation,
            before_generation: self.next_generation,
        });
    }

    fn apply_to_listing(&mut self, id: MessageId, mutation: Mutation) {
        if let Some(message) = self
            .listing
            .as_mut()
            .and_then(|l| l.messages.iter_mut().find(|m| m.id == id))
        {
            mutation.apply(message);
        }
    }

    /// Records the inbox listing's ids and returns the ones not seen before.
    fn track_inbox(&mut self, messages: &[Message]) -> Vec<MessageId> {
        let ids: HashSet<MessageId> = messages.iter().map(|m| m.id).collect();
        let new_messages = self.known_inbox.as_ref().map_or_else(Vec::new, |known| {
            messages
                .iter()
                .filter(|m| m.folder == ServerFolder::Inbox && !known.contains(&m.id))
                .map(|m| m.id)
                .collect()
        });
        self.known_inbox = Some(ids);
        new_messages
    }

    /// Rebuilds the rendered snapshot and counts, then revalidates the selection.
    fn recompute(&mut self) {
        let Some(listing) = &self.listing else {
            self.contents = FolderContents::NotLoaded;
            self.selection.revalidate(None);
            return;
        };

        let mut overlays: HashMap<MessageId, Vec<Mutation>> = HashMap::new();
        for pending in self.pending.values() {
            overlays
                .entry(pending.message_id)
                .or_default()
                .push(pending.mutation);
        }

        let overlaid: Vec<Message> = listing
            .messages
            .iter()
            .map(|message| {
                let mut message = message.clone();
                for mutation in overlays.get(&message.id).into_iter().flatten() {
                    mutation.apply(&mut message);
                }
                message
            })
            .collect();

        match projector::endpoint_for(self.folder) {
            Endpoint::Inbox => {
                let (mut unread, mut starred, mut archive, mut trash) = (0, 0, 0, 0);
                for message in &overlaid {
                    match message.folder {
                        ServerFolder::Inbox if !message.is_read => unread += 1,
                        ServerFolder::Archive => archive += 1,
                        ServerFolder::Trash => trash += 1,
                        _ => {}
                    }
                    if message.starred {
                        starred += 1;
                    }
                }
                self.counts.inbox_unread = Some(unread);
                self.counts.starred = Some(starred);
                self.counts.archive = Some(archive);
                self.counts.trash = Some(trash);
            }
            Endpoint::Sent => {
                let sent = overlaid
                    .iter()
                    .filter(|m| projector::belongs_to(FolderView::Sent, m))
                    .count();
                self.counts.sent = Some(sent);
            }
        }

        self.contents = FolderContents::Loaded(MailboxSnapshot {
            folder: self.folder,
            messages: projector::project(self.folder, &overlaid),
            fetched_at: listing.fetched_at,
        });
        self.selection.revalidate(self.contents.snapshot());
    }
}
