//! Mailbox session: the public face of the sync core.
//!
//! A [`MailboxSession`] owns the snapshot store, the refresh timer and the
//! API client for one signed-in user. Every store write republishes a
//! [`MailboxView`] on a watch channel; observers never touch the store.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::mutation::{Mutation, MutationError, MutationOutcome};
use super::projector;
use super::scheduler::SyncScheduler;
use super::store::{Begin, DiscardReason, FetchOutcome, SnapshotStore};
use crate::api::{ApiError, AuthToken, Draft, MailApi};
use crate::config::SyncConfig;
use crate::model::{FolderView, MailboxView, MessageId, ServerFolder};

/// Result of a manual refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The fetched listing is now displayed.
    Applied {
        /// Inbox messages that arrived since the previous inbox fetch.
        new_messages: Vec<MessageId>,
    },
    /// A fetch for the folder was already outstanding; nothing was issued.
    Coalesced,
    /// The listing arrived but was no longer relevant.
    Discarded(DiscardReason),
}

/// A refresh whose fetch failed. The displayed snapshot is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Refreshing {folder} failed: {cause}")]
pub struct RefreshError {
    /// Folder the fetch was issued for.
    pub folder: FolderView,
    /// Underlying API failure.
    #[source]
    pub cause: ApiError,
}

/// A send that did not go through.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The draft is missing a required field; nothing was sent.
    #[error("Invalid draft: {0}")]
    Invalid(String),

    /// The server call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// State shared between the session handle, the timer and spawned calls.
pub(super) struct Shared<A> {
    pub(super) api: A,
    pub(super) token: AuthToken,
    config: SyncConfig,
    store: Mutex<SnapshotStore>,
    view_tx: watch::Sender<MailboxView>,
    scheduler: Mutex<Option<SyncScheduler>>,
    stopped: AtomicBool,
}

impl<A: MailApi> Shared<A> {
    fn lock_store(&self) -> MutexGuard<'_, SnapshotStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the store and publishes the resulting view.
    pub(super) fn with_store<R>(&self, f: impl FnOnce(&mut SnapshotStore) -> R) -> R {
        let mut store = self.lock_store();
        let result = f(&mut store);
        let view = store.view();
        drop(store);
        self.view_tx.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
        result
    }

    /// Handles a rejected credential: stop polling and flag the view.
    pub(super) fn expire(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let already_expired = self.with_store(|store| {
            let expired = store.session_expired();
            store.mark_session_expired();
            expired
        });
        if !already_expired {
            warn!("Session credential rejected, polling stopped");
        }
        self.cancel_timer();
    }

    fn cancel_timer(&self) {
        let scheduler = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
    }

    fn start_timer(self: &Arc<Self>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let weak: Weak<Self> = Arc::downgrade(self);
        let scheduler = SyncScheduler::start(self.config.poll_interval(), move || {
            let Some(shared) = weak.upgrade() else {
                return ControlFlow::Break(());
            };
            if shared.stopped.load(Ordering::SeqCst) {
                return ControlFlow::Break(());
            }
            tokio::spawn(async move {
                if let Err(err) = shared.refresh(true).await {
                    warn!(folder = %err.folder, error = %err.cause, "Scheduled refresh failed");
                }
            });
            ControlFlow::Continue(())
        });

        // replacing the previous timer drops and cancels it
        let previous = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(scheduler);
        drop(previous);
    }

    /// Fetches the active folder's endpoint and applies the listing.
    ///
    /// With `coalesce`, nothing is issued while a recent fetch is outstanding.
    async fn refresh(&self, coalesce: bool) -> Result<RefreshOutcome, RefreshError> {
        let window = if coalesce {
            self.config.poll_interval()
        } else {
            Duration::ZERO
        };
        let Some(ticket) = self.with_store(|store| store.begin_fetch(Instant::now(), window))
        else {
            return Ok(RefreshOutcome::Coalesced);
        };

        let endpoint = projector::endpoint_for(ticket.folder);
        debug!(folder = %ticket.folder, endpoint = endpoint.as_str(), generation = ticket.generation, "Fetching listing");

        match self.api.fetch_folder(endpoint, &self.token).await {
            Ok(page) => {
                let count = page.messages.len();
                match self.with_store(|store| store.complete_fetch(ticket, page)) {
                    FetchOutcome::Applied { new_messages } => {
                        debug!(folder = %ticket.folder, count, "Listing applied");
                        if !new_messages.is_empty() {
                            info!(count = new_messages.len(), "New mail arrived");
                        }
                        Ok(RefreshOutcome::Applied { new_messages })
                    }
                    FetchOutcome::Discarded(reason) => Ok(RefreshOutcome::Discarded(reason)),
                }
            }
            Err(cause) => {
                self.with_store(|store| store.abandon_fetch(ticket));
                if cause.is_unauthorized() {
                    self.expire();
                }
                Err(RefreshError {
                    folder: ticket.folder,
                    cause,
                })
            }
        }
    }
}

/// Sync core for one signed-in user.
///
/// Must be created inside a Tokio runtime. Dropping the session stops its
/// refresh timer; calls already on the wire run to completion and their
/// results are discarded or applied as usual.
pub struct MailboxSession<A: MailApi> {
    shared: Arc<Shared<A>>,
}

impl<A: MailApi> MailboxSession<A> {
    /// Creates a session showing `folder` and starts polling it.
    pub fn start(api: A, token: AuthToken, config: SyncConfig, folder: FolderView) -> Self {
        let store = SnapshotStore::new(folder);
        let (view_tx, _) = watch::channel(store.view());
        let shared = Arc::new(Shared {
            api,
            token,
            config,
            store: Mutex::new(store),
            view_tx,
            scheduler: Mutex::new(None),
            stopped: AtomicBool::new(false),
        });
        info!(%folder, "Starting mailbox session");
        shared.start_timer();
        Self { shared }
    }

    /// Receiver that observes every published view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<MailboxView> {
        self.shared.view_tx.subscribe()
    }

    /// The view as last published.
    #[must_use]
    pub fn view(&self) -> MailboxView {
        self.shared.view_tx.borrow().clone()
    }

    /// Folder being displayed.
    #[must_use]
    pub fn active_folder(&self) -> FolderView {
        self.shared.lock_store().folder()
    }

    /// Displays another folder and restarts the refresh timer for it.
    ///
    /// Fetches still in flight for the previous folder are discarded when
    /// they complete.
    pub fn switch_folder(&self, folder: FolderView) {
        if !self.shared.with_store(|store| store.set_active_folder(folder)) {
            return;
        }
        info!(%folder, "Switched folder");
        self.shared.start_timer();
    }

    /// Refreshes the active folder now.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError`] if the fetch failed.
    pub async fn refresh_now(&self) -> Result<RefreshOutcome, RefreshError> {
        self.shared.refresh(true).await
    }

    /// Opens a message, marking it read if it was unread.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotInView`] if the message is not displayed.
    pub fn select(&self, id: MessageId) -> Result<(), MutationError> {
        let begin = self.shared.with_store(|store| {
            let selected = store.select(id)?;
            if selected.needs_mark_read {
                store.begin_mutation(id, Mutation::MarkRead)
            } else {
                Ok(Begin::Unchanged)
            }
        })?;
        self.shared.finish_in_background(begin);
        Ok(())
    }

    /// Closes the open message.
    pub fn clear_selection(&self) {
        self.shared.with_store(SnapshotStore::clear_selection);
    }

    /// Stars or unstars a message.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] if the message is not displayed or the
    /// server rejected the change, which is then rolled back.
    pub async fn set_starred(
        &self,
        id: MessageId,
        starred: bool,
    ) -> Result<MutationOutcome, MutationError> {
        self.shared.mutate(id, Mutation::SetStarred(starred)).await
    }

    /// Moves a message to the archive.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] if the message is not displayed or the
    /// server rejected the move, which is then rolled back.
    pub async fn archive(&self, id: MessageId) -> Result<MutationOutcome, MutationError> {
        self.shared
            .mutate(id, Mutation::MoveTo(ServerFolder::Archive))
            .await
    }

    /// Moves a message to the trash.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError`] if the message is not displayed or the
    /// server rejected the move, which is then rolled back.
    pub async fn delete(&self, id: MessageId) -> Result<MutationOutcome, MutationError> {
        self.shared
            .mutate(id, Mutation::MoveTo(ServerFolder::Trash))
            .await
    }

    /// Marks a message read. The server call runs in the background and a
    /// failure is only logged.
    ///
    /// # Errors
    ///
    /// Returns [`MutationError::NotInView`] if the message is not displayed.
    pub fn mark_read(&self, id: MessageId) -> Result<MutationOutcome, MutationError> {
        let begin = self
            .shared
            .with_store(|store| store.begin_mutation(id, Mutation::MarkRead))?;
        if begin == Begin::Unchanged {
            return Ok(MutationOutcome::Unchanged);
        }
        self.shared.finish_in_background(begin);
        Ok(MutationOutcome::Issued)
    }

    /// Sends a message. If the sent folder is displayed it is refreshed
    /// before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Invalid`] without calling the server if the draft
    /// lacks a recipient or subject, or [`SendError::Api`] if sending failed.
    pub async fn send(&self, draft: &Draft) -> Result<MessageId, SendError> {
        draft.validate().map_err(SendError::Invalid)?;

        let id = match self.shared.api.send_message(draft, &self.shared.token).await {
            Ok(id) => id,
            Err(err) => {
                if err.is_unauthorized() {
                    self.shared.expire();
                }
                return Err(err.into());
            }
        };
        info!(message = %id, "Message sent");

        if self.active_folder() == FolderView::Sent
            && let Err(err) = self.shared.refresh(false).await
        {
            warn!(error = %err, "Refreshing sent folder after send failed");
        }
        Ok(id)
    }

    /// Stops polling. Safe to call more than once.
    pub fn stop(&self) {
        if !self.shared.stopped.swap(true, Ordering::SeqCst) {
            info!("Stopping mailbox session");
        }
        self.shared.cancel_timer();
    }

    /// Whether the refresh timer is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.shared
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }
}

impl<A: MailApi> Drop for MailboxSession<A> {
    fn drop(&mut self) {
        self.stop();
    }
}
