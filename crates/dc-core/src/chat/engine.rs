//! Chat engine: working history, streaming accumulation and commit

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};

use super::types::{ChatEvent, SendOutcome};
use crate::attachments::{PendingAttachment, PendingAttachments};
use crate::config::ChatConfig;
use crate::llm::{Conversation, GenAiService, Message, Part, Role};
use crate::session::{Session, SessionStore};
use crate::{Error, Result};

const EVENT_CAPACITY: usize = 256;

/// What the user currently sees.
///
/// `generation` is bumped on every session switch; a send captures it and
/// only touches the view while it still matches.
#[derive(Default)]
struct ViewState {
    generation: u64,
    session_id: Option<String>,
    history: Vec<Message>,
    conversation: Option<Conversation>,
    sending: bool,
}

impl ViewState {
    /// Rebind to `session` (or to no session)
    fn bind(&mut self, service: &Arc<dyn GenAiService>, session: Option<&Session>) {
        self.generation += 1;
        self.sending = false;

        match session {
            Some(session) => {
                self.session_id = Some(session.id.clone());
                self.history = session.history.clone();
                self.conversation = Some(Conversation::create(
                    service.clone(),
                    session.history.clone(),
                ));
            }
            None => {
                self.session_id = None;
                self.history.clear();
                self.conversation = None;
            }
        }
    }

    /// Pick up a stored history that changed behind the view's back.
    /// An exchange still streaming in the view stays at the end.
    fn refresh(&mut self, service: &Arc<dyn GenAiService>, session: &Session) {
        let mut history = session.history.clone();
        if self.sending {
            let start = self.history.len().saturating_sub(2);
            history.extend(self.history.drain(start..));
        }
        self.history = history;
        self.conversation = Some(Conversation::create(
            service.clone(),
            session.history.clone(),
        ));
    }

    /// Replace the trailing placeholder with the reply so far
    fn show_reply(&mut self, reply: &str) {
        if let Some(last) = self.history.last_mut() {
            *last = Message::model(reply);
        }
    }
}

/// Chat engine over a session store.
///
/// ロック順序は常に view → store。pending は単独で取得する。
pub struct ChatEngine {
    service: Arc<dyn GenAiService>,
    store: Arc<RwLock<SessionStore>>,
    view: Mutex<ViewState>,
    pending: Mutex<PendingAttachments>,
    events: broadcast::Sender<ChatEvent>,
    config: ChatConfig,
}

impl ChatEngine {
    /// Create an engine bound to the store's active session
    pub fn new(service: Arc<dyn GenAiService>, store: SessionStore, config: ChatConfig) -> Self {
        let mut view = ViewState::default();
        view.bind(&service, store.active());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            service,
            store: Arc::new(RwLock::new(store)),
            view: Mutex::new(view),
            pending: Mutex::new(PendingAttachments::new()),
            events,
            config,
        }
    }

    /// Receive streaming progress events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChatEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    /// Snapshot of all sessions, most recent first
    pub async fn sessions(&self) -> Vec<Session> {
        self.store.read().await.list().to_vec()
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.view.lock().await.session_id.clone()
    }

    /// Working history as currently displayed
    pub async fn history(&self) -> Vec<Message> {
        self.view.lock().await.history.clone()
    }

    pub async fn is_sending(&self) -> bool {
        self.view.lock().await.sending
    }

    /// Make `id` the active session, or clear the selection with `None`.
    /// Any send still in flight keeps running but no longer updates the view.
    pub async fn select(&self, id: Option<&str>) -> Result<()> {
        let mut view = self.view.lock().await;
        let mut store = self.store.write().await;

        store.set_active(id)?;
        view.bind(&self.service, store.active());
        debug!("Selected session {:?} (generation {})", id, view.generation);
        Ok(())
    }

    /// Start a fresh, sessionless conversation
    pub async fn new_chat(&self) -> Result<()> {
        self.select(None).await
    }

    /// Delete session `id`; rebinds the view if it was the active one
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let mut view = self.view.lock().await;
        let mut store = self.store.write().await;

        let was_active = view.session_id.as_deref() == Some(id);
        let result = store.delete(id);

        // the store drops the session even when the write fails
        if was_active && store.get(id).is_none() {
            view.bind(&self.service, store.active());
        }
        result
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<bool> {
        self.store.write().await.rename(id, title)
    }

    pub async fn add_pending(&self, attachments: Vec<PendingAttachment>) {
        self.pending.lock().await.add(attachments);
    }

    pub async fn remove_pending(&self, uri: &str) -> bool {
        self.pending.lock().await.remove(uri)
    }

    pub async fn pending(&self) -> PendingAttachments {
        self.pending.lock().await.clone()
    }

    /// Open uploaded documents as a new session whose first message carries
    /// the file references. The session is titled from the first file.
    pub async fn open_document(&self, attachments: Vec<PendingAttachment>) -> Result<Session> {
        if attachments.is_empty() {
            return Err(Error::Other("no documents to open".to_string()));
        }

        let message = Message {
            role: Role::User,
            parts: attachments.iter().map(PendingAttachment::part).collect(),
            file_names: Some(attachments.iter().map(|a| a.display_name.clone()).collect()),
        };
        let title = self.derive_title(&message).await;
        let session = Session::new(title, vec![message]);

        let mut view = self.view.lock().await;
        let mut store = self.store.write().await;

        if let Err(e) = store.add(session.clone()) {
            warn!("Session {} kept in memory only: {}", session.id, e);
        }
        store.set_active(Some(&session.id))?;
        view.bind(&self.service, store.active());

        info!("Opened {} document(s) as session {}", attachments.len(), session.id);
        Ok(session)
    }

    /// Title for a new session whose first message is `first`
    async fn derive_title(&self, first: &Message) -> String {
        let Some(file) = first.files().next() else {
            return self.config.default_title.clone();
        };

        let part = Part::File {
            file_data: file.clone(),
        };
        match self.service.extract_title(&part).await {
            Ok(title) if !title.trim().is_empty() => title.trim().to_string(),
            Ok(_) => self.config.default_title.clone(),
            Err(e) => {
                warn!("Title extraction failed: {}", e);
                self.config.default_title.clone()
            }
        }
    }

    /// Send `text` with the pending attachments and stream the reply.
    ///
    /// The exchange is persisted only when the stream completes. The pending
    /// attachments it carried are consumed by every attempt, successful or
    /// not; attachments added while it runs stay pending.
    pub async fn send_message(&self, text: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Ok(SendOutcome::Skipped);
        }

        let attachments = self.pending.lock().await.clone();
        let mut parts = vec![Part::text(text)];
        parts.extend(attachments.parts());
        let user = Message {
            role: Role::User,
            parts,
            file_names: (!attachments.is_empty()).then(|| attachments.display_names()),
        };

        let (generation, target, conversation) = {
            let mut view = self.view.lock().await;
            if view.sending {
                return Err(Error::Other("a message is already being sent".to_string()));
            }
            view.sending = true;
            view.history.push(user.clone());
            view.history.push(Message::model(""));

            let conversation = view
                .conversation
                .clone()
                .unwrap_or_else(|| Conversation::create(self.service.clone(), Vec::new()));
            (view.generation, view.session_id.clone(), conversation)
        };

        self.emit(ChatEvent::Started {
            session_id: target.clone(),
        });

        let outcome = match self.stream_reply(generation, &target, &conversation, &user).await {
            Ok(reply) => {
                let session_id = self.commit(generation, target, user, reply.clone()).await;
                self.emit(ChatEvent::Finished {
                    session_id: session_id.clone(),
                });
                SendOutcome::Committed { session_id, reply }
            }
            Err(error) => {
                warn!("Send failed: {}", error);
                {
                    let mut view = self.view.lock().await;
                    if view.generation == generation {
                        view.history.push(Message::model(self.config.error_message.clone()));
                        view.sending = false;
                    }
                }
                self.emit(ChatEvent::Failed {
                    session_id: target,
                    error: error.to_string(),
                });
                SendOutcome::Failed { error }
            }
        };

        {
            let mut pending = self.pending.lock().await;
            for attachment in attachments.iter() {
                pending.remove(attachment.uri());
            }
        }
        Ok(outcome)
    }

    async fn stream_reply(
        &self,
        generation: u64,
        target: &Option<String>,
        conversation: &Conversation,
        user: &Message,
    ) -> Result<String> {
        let mut stream = conversation.send_stream(user).await?;
        let mut reply = String::new();

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            reply.push_str(&fragment);

            let mut view = self.view.lock().await;
            if view.generation != generation {
                continue;
            }
            view.show_reply(&reply);
            drop(view);

            self.emit(ChatEvent::Delta {
                session_id: target.clone(),
                text: fragment,
            });
        }

        Ok(reply)
    }

    /// Persist a completed exchange and return the session it landed in
    async fn commit(
        &self,
        generation: u64,
        target: Option<String>,
        user: Message,
        reply: String,
    ) -> String {
        let model = Message::model(reply);

        // title first, without holding any lock
        let title = match target {
            Some(_) => None,
            None => Some(self.derive_title(&user).await),
        };

        let mut view = self.view.lock().await;
        let current = view.generation == generation;
        let mut store = self.store.write().await;

        let session_id = match target {
            Some(id) => {
                let history = store.get(&id).map(|session| {
                    let mut history = session.history.clone();
                    history.push(user.clone());
                    history.push(model.clone());
                    history
                });
                match history {
                    Some(history) => {
                        if let Err(e) = store.update(&id, history) {
                            warn!("Reply for session {} kept in memory only: {}", id, e);
                        }
                    }
                    None => debug!("Session {} was deleted before the reply completed", id),
                }

                if current {
                    if let Some(conversation) = view.conversation.as_mut() {
                        conversation.record(user, model.clone());
                    }
                } else if view.session_id.as_deref() == Some(id.as_str()) {
                    // switched away and back while the reply was streaming
                    if let Some(session) = store.get(&id) {
                        view.refresh(&self.service, session);
                    }
                }
                id
            }
            None => {
                let session = Session::new(
                    title.unwrap_or_else(|| self.config.default_title.clone()),
                    vec![user.clone(), model.clone()],
                );
                let id = session.id.clone();
                info!("Starting session {} ({})", id, session.title);

                if let Err(e) = store.add(session) {
                    warn!("Session {} kept in memory only: {}", id, e);
                }

                // the user has moved on; keep the session but leave the selection alone
                if current {
                    store.set_active(Some(&id)).ok();
                    view.session_id = Some(id.clone());
                    view.conversation = Some(Conversation::create(
                        self.service.clone(),
                        vec![user, model.clone()],
                    ));
                }
                id
            }
        };

        if current {
            view.show_reply(&model.text());
            view.sending = false;
        }
        session_id
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::llm::FileData;
    use crate::llm::testing::{FakeService, Step};
    use tokio::sync::Notify;

    fn document(name: &str) -> PendingAttachment {
        PendingAttachment::new(
            FileData {
                file_uri: format!("gs://x/{}", name),
                mime_type: "application/pdf".to_string(),
            },
            name,
        )
    }

    fn report() -> PendingAttachment {
        document("report.pdf")
    }

    /// Reply that streams one fragment, then blocks until `release` fires
    fn stalled_reply(reached: &Arc<Notify>, release: &Arc<Notify>) -> Vec<Step> {
        vec![
            Step::text("early "),
            Step::Signal(reached.clone()),
            Step::Wait(release.clone()),
            Step::text("late"),
        ]
    }

    /// Store with one active session holding `[userA, modelA]`, plus an older one
    fn seeded_store() -> (SessionStore, String, String) {
        let mut store = SessionStore::in_memory();
        let other = Session::new("other", vec![Message::user("x"), Message::model("y")]);
        let active = Session::new("active", vec![Message::user("userA"), Message::model("modelA")]);
        let (other_id, active_id) = (other.id.clone(), active.id.clone());
        store.add(other).unwrap();
        store.add(active).unwrap();
        store.set_active(Some(&active_id)).unwrap();
        (store, active_id, other_id)
    }

    fn engine_with(service: &Arc<FakeService>, store: SessionStore) -> ChatEngine {
        ChatEngine::new(service.clone(), store, ChatConfig::default())
    }

    async fn stored_history(engine: &ChatEngine, id: &str) -> Vec<Message> {
        engine.store.read().await.get(id).unwrap().history.clone()
    }

    #[tokio::test]
    async fn test_new_binds_active_session() {
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&Arc::new(FakeService::new()), store);

        assert_eq!(engine.active_session_id().await.as_deref(), Some(active_id.as_str()));
        assert_eq!(
            engine.history().await,
            vec![Message::user("userA"), Message::model("modelA")]
        );
        assert!(!engine.is_sending().await);
    }

    #[tokio::test]
    async fn test_select_yields_stored_history() {
        let (store, _, other_id) = seeded_store();
        let engine = engine_with(&Arc::new(FakeService::new()), store);

        engine.select(Some(&other_id)).await.unwrap();
        assert_eq!(engine.history().await, stored_history(&engine, &other_id).await);

        engine.new_chat().await.unwrap();
        assert!(engine.history().await.is_empty());
        assert!(engine.active_session_id().await.is_none());

        let result = engine.select(Some("missing")).await;
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_streamed_reply_is_committed() {
        let service = Arc::new(FakeService::new());
        service.push_reply(vec![Step::text("The "), Step::text("doc "), Step::text("says X.")]);
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&service, store);
        let mut events = engine.subscribe();

        let outcome = engine.send_message("summarize").await.unwrap();
        match outcome {
            SendOutcome::Committed { session_id, reply } => {
                assert_eq!(session_id, active_id);
                assert_eq!(reply, "The doc says X.");
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        let expected = vec![
            Message::user("userA"),
            Message::model("modelA"),
            Message::user("summarize"),
            Message::model("The doc says X."),
        ];
        assert_eq!(stored_history(&engine, &active_id).await, expected);
        assert_eq!(engine.history().await, expected);
        assert!(!engine.is_sending().await);

        // the request carried the stored history as context
        let calls = service.stream_calls();
        assert_eq!(calls[0].0, expected[..2].to_vec());

        let mut deltas = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ChatEvent::Delta { text, .. } = event {
                deltas.push(text);
            }
        }
        assert_eq!(deltas, vec!["The ", "doc ", "says X."]);
    }

    #[tokio::test]
    async fn test_follow_up_sees_committed_exchange() {
        let service = Arc::new(FakeService::new());
        service.push_reply(vec![Step::text("first")]);
        service.push_reply(vec![Step::text("second")]);
        let (store, _, _) = seeded_store();
        let engine = engine_with(&service, store);

        engine.send_message("one").await.unwrap();
        engine.send_message("two").await.unwrap();

        let calls = service.stream_calls();
        assert_eq!(calls[1].0.len(), 4);
        assert_eq!(calls[1].0[3], Message::model("first"));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_is_not_persisted() {
        let service = Arc::new(FakeService::new());
        service.push_reply(vec![Step::text("partial"), Step::fail("connection reset")]);
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&service, store);
        let before = stored_history(&engine, &active_id).await;

        engine.add_pending(vec![report()]).await;
        let outcome = engine.send_message("summarize").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Failed { .. }));

        assert_eq!(stored_history(&engine, &active_id).await, before);
        assert!(engine.pending().await.is_empty());

        let view = engine.history().await;
        assert_eq!(view.len(), before.len() + 3);
        assert_eq!(view[view.len() - 2], Message::model("partial"));
        assert_eq!(
            view[view.len() - 1],
            Message::model(ChatConfig::default().error_message)
        );
        assert!(!engine.is_sending().await);
    }

    #[tokio::test]
    async fn test_request_failure_shows_error() {
        // no scripted reply: the request itself fails
        let service = Arc::new(FakeService::new());
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&service, store);

        let outcome = engine.send_message("hello").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Failed { .. }));
        assert_eq!(stored_history(&engine, &active_id).await.len(), 2);
        assert_eq!(engine.history().await.len(), 5);
    }

    #[tokio::test]
    async fn test_pending_attached_and_cleared() {
        let service = Arc::new(FakeService::new());
        service.push_reply(vec![Step::text("ok")]);
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&service, store);

        engine.add_pending(vec![report()]).await;
        engine.send_message("what is this?").await.unwrap();
        assert!(engine.pending().await.is_empty());

        let history = stored_history(&engine, &active_id).await;
        let user = &history[2];
        assert_eq!(user.text(), "what is this?");
        assert_eq!(user.files().next().unwrap().file_uri, "gs://x/report.pdf");
        assert_eq!(user.file_names, Some(vec!["report.pdf".to_string()]));
    }

    #[tokio::test]
    async fn test_blank_message_is_skipped() {
        let service = Arc::new(FakeService::new());
        let (store, _, _) = seeded_store();
        let engine = engine_with(&service, store);
        engine.add_pending(vec![report()]).await;

        let outcome = engine.send_message("   \n").await.unwrap();
        assert!(matches!(outcome, SendOutcome::Skipped));
        assert!(service.stream_calls().is_empty());
        assert_eq!(engine.pending().await.len(), 1);
        assert_eq!(engine.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_switch_during_send_keeps_late_fragments_out() {
        let service = Arc::new(FakeService::new());
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        service.push_reply(stalled_reply(&reached, &release));

        let (store, active_id, other_id) = seeded_store();
        let engine = Arc::new(engine_with(&service, store));

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.send_message("question").await }
        });

        reached.notified().await;
        assert!(engine.is_sending().await);
        engine.select(Some(&other_id)).await.unwrap();
        release.notify_one();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(outcome.is_committed());

        // the new view never sees the reply
        let other = stored_history(&engine, &other_id).await;
        assert_eq!(engine.history().await, other);
        assert_eq!(engine.active_session_id().await.as_deref(), Some(other_id.as_str()));
        assert!(!engine.is_sending().await);

        // the session the send targeted still receives the exchange
        let history = stored_history(&engine, &active_id).await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[3], Message::model("early late"));
    }

    #[tokio::test]
    async fn test_switch_during_send_keeps_new_attachments() {
        let service = Arc::new(FakeService::new());
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        service.push_reply(stalled_reply(&reached, &release));

        let (store, _, other_id) = seeded_store();
        let engine = Arc::new(engine_with(&service, store));
        engine.add_pending(vec![report()]).await;

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.send_message("question").await }
        });

        reached.notified().await;
        engine.select(Some(&other_id)).await.unwrap();
        engine.add_pending(vec![document("new.pdf")]).await;
        release.notify_one();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(outcome.is_committed());

        // only the attachment the send carried was consumed
        let pending = engine.pending().await;
        assert_eq!(pending.display_names(), vec!["new.pdf"]);
    }

    #[tokio::test]
    async fn test_switch_away_and_back_during_send_shows_reply() {
        let service = Arc::new(FakeService::new());
        let reached = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        service.push_reply(stalled_reply(&reached, &release));
        service.push_reply(vec![Step::text("second answer")]);

        let (store, active_id, other_id) = seeded_store();
        let engine = Arc::new(engine_with(&service, store));

        let task = tokio::spawn({
            let engine = engine.clone();
            async move { engine.send_message("question").await }
        });

        reached.notified().await;
        engine.select(Some(&other_id)).await.unwrap();
        engine.select(Some(&active_id)).await.unwrap();
        release.notify_one();

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let stored = stored_history(&engine, &active_id).await;
        assert_eq!(stored.len(), 4);
        assert_eq!(engine.history().await, stored);

        // the follow-up carries the late exchange as context
        engine.send_message("follow-up").await.unwrap();
        let calls = service.stream_calls();
        assert_eq!(calls[1].0, stored);
        assert_eq!(engine.history().await, stored_history(&engine, &active_id).await);
        assert_eq!(engine.history().await.len(), 6);
    }

    #[tokio::test]
    async fn test_open_document_in_empty_store() {
        let service = Arc::new(FakeService::new());
        let engine = engine_with(&service, SessionStore::in_memory());

        let session = engine.open_document(vec![report()]).await.unwrap();

        assert!(!session.title.is_empty());
        assert_eq!(session.history.len(), 1);
        let message = &session.history[0];
        assert_eq!(message.role, Role::User);
        assert_eq!(message.files().next().unwrap().file_uri, "gs://x/report.pdf");
        assert_eq!(message.file_names, Some(vec!["report.pdf".to_string()]));

        assert_eq!(engine.sessions().await.len(), 1);
        assert_eq!(engine.active_session_id().await, Some(session.id.clone()));
        assert_eq!(engine.history().await, session.history);
    }

    #[tokio::test]
    async fn test_open_document_requires_files() {
        let engine = engine_with(&Arc::new(FakeService::new()), SessionStore::in_memory());
        assert!(engine.open_document(Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_sessionless_send_creates_titled_session() {
        let service = Arc::new(FakeService::new());
        service.set_title(Ok("  Quarterly report ".to_string()));
        service.push_reply(vec![Step::text("It is about Q3.")]);
        let engine = engine_with(&service, SessionStore::in_memory());

        engine.add_pending(vec![report()]).await;
        let outcome = engine.send_message("what is this?").await.unwrap();
        let SendOutcome::Committed { session_id, .. } = outcome else {
            panic!("expected commit");
        };

        let sessions = engine.sessions().await;
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session_id);
        assert_eq!(sessions[0].title, "Quarterly report");
        assert_eq!(sessions[0].history.len(), 2);
        assert_eq!(engine.active_session_id().await, Some(session_id));
        assert_eq!(engine.history().await, sessions[0].history);
    }

    #[tokio::test]
    async fn test_title_falls_back_to_default() {
        let service = Arc::new(FakeService::new());
        service.set_title(Err(Error::GeminiApi("unavailable".to_string())));
        service.push_reply(vec![Step::text("a")]);
        service.push_reply(vec![Step::text("b")]);
        let engine = engine_with(&service, SessionStore::in_memory());

        // title extraction fails
        engine.add_pending(vec![report()]).await;
        engine.send_message("first").await.unwrap();

        // no attachment: title extraction is not attempted
        engine.new_chat().await.unwrap();
        engine.send_message("second").await.unwrap();

        let titles: Vec<String> = engine.sessions().await.into_iter().map(|s| s.title).collect();
        assert_eq!(titles, vec!["New chat", "New chat"]);
        assert_eq!(service.title_calls(), 1);
    }

    #[tokio::test]
    async fn test_delete_active_rebinds() {
        let (store, active_id, other_id) = seeded_store();
        let engine = engine_with(&Arc::new(FakeService::new()), store);

        assert!(engine.delete(&active_id).await.unwrap());
        assert_eq!(engine.active_session_id().await, Some(other_id.clone()));
        assert_eq!(engine.history().await, stored_history(&engine, &other_id).await);

        assert!(engine.delete(&other_id).await.unwrap());
        assert!(engine.active_session_id().await.is_none());
        assert!(engine.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_pending() {
        let engine = engine_with(&Arc::new(FakeService::new()), SessionStore::in_memory());
        engine.add_pending(vec![report()]).await;

        assert!(engine.remove_pending("gs://x/report.pdf").await);
        assert!(!engine.remove_pending("gs://x/report.pdf").await);
        assert!(engine.pending().await.is_empty());
    }

    #[tokio::test]
    async fn test_rename() {
        let (store, active_id, _) = seeded_store();
        let engine = engine_with(&Arc::new(FakeService::new()), store);

        assert!(engine.rename(&active_id, "Renamed").await.unwrap());
        assert_eq!(engine.sessions().await[0].title, "Renamed");
        assert!(!engine.rename("missing", "x").await.unwrap());
    }
}
