//! Scripted in-memory mail service for driving a session in tests.
//!
//! Calls are answered from an in-memory server state. A call kind can be put
//! on hold, in which case each call of that kind is parked until the test
//! replies to it, so interleavings can be ordered by hand.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use tokio::sync::{mpsc, oneshot};

use auramail_core::{
    ApiError, AuthToken, Draft, Endpoint, FolderView, MailApi, MailboxSession, MailboxView,
    Message, MessageId, Priority, RawMailboxPage, ServerFolder, SyncConfig,
};

/// Kind of call, used to hold or fail every call of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Fetch,
    Star,
    Move,
    Read,
    Send,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Fetch(Endpoint),
    Star(MessageId, bool),
    Move(MessageId, ServerFolder),
    Read(MessageId),
    Send(String),
}

impl Call {
    pub const fn kind(&self) -> CallKind {
        match self {
            Self::Fetch(_) => CallKind::Fetch,
            Self::Star(..) => CallKind::Star,
            Self::Move(..) => CallKind::Move,
            Self::Read(_) => CallKind::Read,
            Self::Send(_) => CallKind::Send,
        }
    }
}

type Reply = Result<Vec<Message>, ApiError>;

/// A held call waiting for the test to answer it.
pub struct Parked {
    pub call: Call,
    reply: oneshot::Sender<Reply>,
}

impl Parked {
    /// Answers a held fetch with a listing.
    pub fn listing(self, messages: Vec<Message>) {
        let _ = self.reply.send(Ok(messages));
    }

    /// Answers a held action with success.
    pub fn ok(self) {
        let _ = self.reply.send(Ok(Vec::new()));
    }

    /// Answers a held call with an error.
    pub fn fail(self, err: ApiError) {
        let _ = self.reply.send(Err(err));
    }
}

#[derive(Default)]
struct ServerState {
    listings: HashMap<Endpoint, Vec<Message>>,
    held: HashSet<CallKind>,
    failures: HashMap<CallKind, ApiError>,
    calls: Vec<Call>,
    next_id: u64,
}

impl ServerState {
    fn find(&mut self, id: MessageId) -> Option<&mut Message> {
        self.listings
            .values_mut()
            .flat_map(|listing| listing.iter_mut())
            .find(|m| m.id == id)
    }

    fn answer(&mut self, call: &Call) -> Reply {
        if let Some(err) = self.failures.get(&call.kind()) {
            return Err(err.clone());
        }
        match call {
            Call::Fetch(endpoint) => Ok(self.listings.get(endpoint).cloned().unwrap_or_default()),
            Call::Star(id, starred) => {
                if let Some(m) = self.find(*id) {
                    m.starred = *starred;
                }
                Ok(Vec::new())
            }
            Call::Move(id, folder) => {
                if let Some(m) = self.find(*id) {
                    m.folder = *folder;
                }
                Ok(Vec::new())
            }
            Call::Read(id) => {
                if let Some(m) = self.find(*id) {
                    m.is_read = true;
                }
                Ok(Vec::new())
            }
            Call::Send(subject) => {
                self.next_id += 1;
                let mut sent = message(1000 + self.next_id);
                sent.subject.clone_from(subject);
                sent.folder = ServerFolder::Sent;
                sent.is_read = true;
                self.listings.entry(Endpoint::Sent).or_default().insert(0, sent);
                Ok(Vec::new())
            }
        }
    }
}

/// The [`MailApi`] half, moved into the session.
pub struct ScriptedApi {
    state: Arc<Mutex<ServerState>>,
    parked_tx: mpsc::UnboundedSender<Parked>,
}

impl ScriptedApi {
    async fn dispatch(&self, call: Call) -> Reply {
        let hold = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(call.clone());
            state.held.contains(&call.kind())
        };
        if hold {
            let (reply, rx) = oneshot::channel();
            self.parked_tx.send(Parked { call, reply }).unwrap();
            return rx
                .await
                .unwrap_or_else(|_| Err(ApiError::Transport("reply dropped".into())));
        }
        self.state.lock().unwrap().answer(&call)
    }
}

impl MailApi for ScriptedApi {
    async fn fetch_folder(
        &self,
        endpoint: Endpoint,
        _token: &AuthToken,
    ) -> Result<RawMailboxPage, ApiError> {
        let messages = self.dispatch(Call::Fetch(endpoint)).await?;
        Ok(RawMailboxPage { endpoint, messages })
    }

    async fn set_starred(
        &self,
        id: MessageId,
        starred: bool,
        _token: &AuthToken,
    ) -> Result<(), ApiError> {
        self.dispatch(Call::Star(id, starred)).await.map(drop)
    }

    async fn move_message(
        &self,
        id: MessageId,
        target: ServerFolder,
        _token: &AuthToken,
    ) -> Result<(), ApiError> {
        self.dispatch(Call::Move(id, target)).await.map(drop)
    }

    async fn mark_read(&self, id: MessageId, _token: &AuthToken) -> Result<(), ApiError> {
        self.dispatch(Call::Read(id)).await.map(drop)
    }

    async fn send_message(&self, draft: &Draft, _token: &AuthToken) -> Result<MessageId, ApiError> {
        self.dispatch(Call::Send(draft.subject.clone())).await?;
        let id = self.state.lock().unwrap().next_id;
        Ok(MessageId(1000 + id))
    }
}

/// The test's half: server state and parked calls.
pub struct Server {
    state: Arc<Mutex<ServerState>>,
    parked_rx: mpsc::UnboundedReceiver<Parked>,
}

impl Server {
    pub fn set_listing(&self, endpoint: Endpoint, messages: Vec<Message>) {
        self.state.lock().unwrap().listings.insert(endpoint, messages);
    }

    pub fn listing(&self, endpoint: Endpoint) -> Vec<Message> {
        self.state
            .lock()
            .unwrap()
            .listings
            .get(&endpoint)
            .cloned()
            .unwrap_or_default()
    }

    pub fn hold(&self, kind: CallKind) {
        self.state.lock().unwrap().held.insert(kind);
    }

    pub fn release(&self, kind: CallKind) {
        self.state.lock().unwrap().held.remove(&kind);
    }

    pub fn fail(&self, kind: CallKind, err: ApiError) {
        self.state.lock().unwrap().failures.insert(kind, err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        self.calls().iter().filter(|c| c.kind() == kind).count()
    }

    /// Waits for the next held call.
    pub async fn next_parked(&mut self) -> Parked {
        tokio::time::timeout(Duration::from_secs(5), self.parked_rx.recv())
            .await
            .expect("no call was parked")
            .expect("api dropped")
    }
}

pub fn scripted() -> (ScriptedApi, Server) {
    let state = Arc::new(Mutex::new(ServerState::default()));
    let (parked_tx, parked_rx) = mpsc::unbounded_channel();
    (
        ScriptedApi {
            state: Arc::clone(&state),
            parked_tx,
        },
        Server { state, parked_rx },
    )
}

/// An unread, unstarred inbox message.
pub fn message(id: u64) -> Message {
    Message {
        id: MessageId(id),
        sender: format!("sender{id}@example.com"),
        recipient: "me@aurafarming.co".to_string(),
        subject: format!("Subject {id}"),
        body: format!("<p>Body {id}</p>"),
        is_read: false,
        has_attachments: false,
        created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        priority: Priority::Normal,
        starred: false,
        folder: ServerFolder::Inbox,
    }
}

pub fn inbox(ids: &[u64]) -> Vec<Message> {
    ids.iter().map(|&id| message(id)).collect()
}

/// Config whose timer never fires during a real-time test.
pub fn slow_config() -> SyncConfig {
    SyncConfig {
        poll_interval_secs: 3600,
        ..SyncConfig::default()
    }
}

pub fn token() -> AuthToken {
    AuthToken::new("test-token")
}

/// Starts a session on `folder` and waits for its first listing.
pub async fn loaded_session(
    api: ScriptedApi,
    config: SyncConfig,
    folder: FolderView,
) -> MailboxSession<ScriptedApi> {
    let session = MailboxSession::start(api, token(), config, folder);
    wait_for(&session, |view| view.folder == folder && !view.contents.is_loading()).await;
    session
}

/// Waits until the published view satisfies `pred`.
pub async fn wait_for(
    session: &MailboxSession<ScriptedApi>,
    pred: impl FnMut(&MailboxView) -> bool,
) -> MailboxView {
    let mut rx = session.subscribe();
    let view = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("view never matched")
        .expect("session dropped");
    view.clone()
}

pub fn ids(view: &MailboxView) -> Vec<u64> {
    view.messages().iter().map(|m| m.id.0).collect()
}

/// Lets spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
