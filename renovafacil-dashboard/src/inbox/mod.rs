pub mod classifier;
pub mod contact_cache;
pub mod conversation_store;
pub mod message_fetcher;
pub mod presenter;
pub mod unread;

pub use classifier::TestPhoneMatcher;
pub use contact_cache::ContactInfoCache;
pub use conversation_store::ConversationStore;
pub use message_fetcher::{FetchMode, MessageThread, ScrollAction, Viewport};
pub use presenter::{ConversationFilter, ConversationQuery, ConversationRow, DayGroup};
pub use unread::UnreadTracker;

use chrono::{Local, NaiveDate};
use futures::future::join_all;
use shared_types::{ContactInfo, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::config::InboxConfig;
use crate::error::{ApiError, StoreError};
use crate::helpers::notifier::Notifier;
use crate::integrations::BackendClient;
use crate::jobs::{PollTick, Poller};

const CONVERSATIONS_POLL: &str = "inbox.conversations";
const MESSAGES_POLL: &str = "inbox.messages";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    None,
    Selected(String),
}

impl Selection {
    pub fn phone(&self) -> Option<&str> {
        match self {
            Selection::None => None,
            Selection::Selected(phone) => Some(phone),
        }
    }

    pub fn is(&self, phone: &str) -> bool {
        self.phone() == Some(phone)
    }
}

/// Change notifications for whoever renders the inbox
#[derive(Debug, Clone, PartialEq)]
pub enum InboxEvent {
    ConversationsUpdated { count: usize },
    MessagesUpdated {
        phone: String,
        count: usize,
        scroll: ScrollAction,
    },
    ContactInfoLoaded { phone: String },
    SelectionChanged(Selection),
    ReadStateChanged { phone: String },
    SessionExpired,
}

struct InboxState {
    conversations: ConversationStore,
    selection: Selection,
    thread: Option<MessageThread>,
    query: ConversationQuery,
}

struct InboxInner {
    backend: BackendClient,
    settings: InboxConfig,
    matcher: TestPhoneMatcher,
    unread: UnreadTracker,
    contacts: ContactInfoCache,
    poller: Poller,
    notifier: Notifier,
    events: broadcast::Sender<InboxEvent>,
    session_expired: AtomicBool,
    state: Mutex<InboxState>,
}

/// The inbox view: keeps the conversation list and the open thread in sync
/// with the backend by polling, and derives what to show from local state.
///
/// Network calls never run with the state lock held. Results that arrive
/// after the operator moved on (another conversation selected, view
/// unmounted) are dropped.
#[derive(Clone)]
pub struct Inbox {
    inner: Arc<InboxInner>,
}

impl Inbox {
    pub fn new(backend: BackendClient, settings: InboxConfig, notifier: Notifier) -> Self {
        let unread = UnreadTracker::new(backend.store().clone());
        Self::with_unread_tracker(backend, settings, notifier, unread)
    }

    pub fn with_unread_tracker(
        backend: BackendClient,
        settings: InboxConfig,
        notifier: Notifier,
        unread: UnreadTracker,
    ) -> Self {
        let conversations = ConversationStore::load_cached(backend.store());
        let (events, _) = broadcast::channel(128);

        Self {
            inner: Arc::new(InboxInner {
                matcher: TestPhoneMatcher::new(&settings.test_phone_prefixes),
                backend,
                settings,
                unread,
                contacts: ContactInfoCache::new(),
                poller: Poller::new(),
                notifier,
                events,
                session_expired: AtomicBool::new(false),
                state: Mutex::new(InboxState {
                    conversations,
                    selection: Selection::None,
                    thread: None,
                    query: ConversationQuery::default(),
                }),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboxEvent> {
        self.inner.events.subscribe()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    fn emit(&self, event: InboxEvent) {
        let _ = self.inner.events.send(event);
    }

    // Lifecycle

    /// Starts the conversation poll. The first run shows the loading flag.
    /// Every successful run prefetches contact info for the visible rows,
    /// which only requests phones not cached yet.
    pub async fn mount(&self) {
        self.inner.session_expired.store(false, Ordering::SeqCst);

        let inbox = self.clone();
        self.inner
            .poller
            .start(
                CONVERSATIONS_POLL,
                self.inner.settings.conversation_poll_interval(),
                move |tick: PollTick| {
                    let inbox = inbox.clone();
                    async move {
                        let refreshed = inbox.refresh_conversations(tick.is_first()).await;
                        if refreshed {
                            inbox.prefetch_visible_contacts().await;
                        }
                    }
                },
            )
            .await;
    }

    pub async fn unmount(&self) {
        self.inner.poller.stop(CONVERSATIONS_POLL).await;
        self.inner.poller.stop(MESSAGES_POLL).await;
        tracing::debug!("inbox unmounted");
    }

    pub async fn is_polling_messages(&self) -> bool {
        self.inner.poller.is_running(MESSAGES_POLL).await
    }

    // Conversation list

    /// Returns whether the list was replaced
    pub async fn refresh_conversations(&self, show_loading: bool) -> bool {
        if show_loading {
            self.inner.state.lock().await.conversations.set_loading(true);
        }

        let result = self
            .inner
            .backend
            .list_conversations(self.inner.settings.conversation_limit)
            .await;

        match result {
            Ok(conversations) => {
                let count = conversations.len();
                {
                    let mut state = self.inner.state.lock().await;
                    state
                        .conversations
                        .apply(conversations, self.inner.backend.store());
                }
                tracing::debug!(count, "conversation list refreshed");
                self.emit(InboxEvent::ConversationsUpdated { count });
                true
            }
            Err(e) => {
                self.inner.state.lock().await.conversations.set_loading(false);
                self.report_failure("Refreshing conversations", e, show_loading)
                    .await;
                false
            }
        }
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.lock().await.conversations.is_loading()
    }

    pub async fn visible_conversations(&self) -> Vec<ConversationRow> {
        let names = self.inner.contacts.names().await;
        let state = self.inner.state.lock().await;
        presenter::present(
            state.conversations.conversations(),
            &state.query,
            &self.inner.matcher,
            &names,
            |c| self.inner.unread.is_unread(c),
        )
    }

    pub async fn query(&self) -> ConversationQuery {
        self.inner.state.lock().await.query.clone()
    }

    /// Query setters return once contact info for the newly visible rows
    /// has been requested.
    pub async fn set_query(&self, query: ConversationQuery) {
        self.inner.state.lock().await.query = query;
        self.prefetch_visible_contacts().await;
    }

    pub async fn set_search(&self, search: impl Into<String>) {
        self.inner.state.lock().await.query.search = search.into();
        self.prefetch_visible_contacts().await;
    }

    pub async fn set_filter(&self, filter: ConversationFilter) {
        self.inner.state.lock().await.query.filter = filter;
        self.prefetch_visible_contacts().await;
    }

    pub async fn set_show_test(&self, show_test: bool) {
        self.inner.state.lock().await.query.show_test = show_test;
        self.prefetch_visible_contacts().await;
    }

    // Selection

    pub async fn selection(&self) -> Selection {
        self.inner.state.lock().await.selection.clone()
    }

    /// Opens a conversation: marks it read, replaces the message poll with
    /// one for this phone and loads its contact info.
    pub async fn select(&self, phone: &str) {
        let phone = phone.trim().to_string();

        {
            let mut state = self.inner.state.lock().await;
            if !state.selection.is(&phone) {
                state.thread = Some(MessageThread::new(phone.clone()));
            }
            state.selection = Selection::Selected(phone.clone());
        }
        tracing::debug!(phone = %phone, "conversation selected");
        self.emit(InboxEvent::SelectionChanged(Selection::Selected(
            phone.clone(),
        )));

        if let Err(e) = self.mark_attended(&phone).await {
            tracing::warn!("Failed to mark {} as read: {}", phone, e);
        }

        let inbox = self.clone();
        let poll_phone = phone.clone();
        self.inner
            .poller
            .start(
                MESSAGES_POLL,
                self.inner.settings.message_poll_interval(),
                move |tick: PollTick| {
                    let inbox = inbox.clone();
                    let phone = poll_phone.clone();
                    async move {
                        let mode = if tick.is_first() {
                            FetchMode::Manual
                        } else {
                            FetchMode::Auto
                        };
                        inbox.fetch_messages(&phone, mode).await;
                    }
                },
            )
            .await;

        let inbox = self.clone();
        tokio::spawn(async move {
            inbox.fetch_contact_info(&phone).await;
        });
    }

    /// Closes the open conversation and stops its message poll
    pub async fn back(&self) {
        self.inner.poller.stop(MESSAGES_POLL).await;
        {
            let mut state = self.inner.state.lock().await;
            state.selection = Selection::None;
            state.thread = None;
        }
        self.emit(InboxEvent::SelectionChanged(Selection::None));
    }

    // Messages

    /// Fetches the thread for `phone`. Returns the scroll decision, or `None`
    /// when the fetch failed or the phone is no longer open.
    pub async fn fetch_messages(&self, phone: &str, mode: FetchMode) -> Option<ScrollAction> {
        let result = self.inner.backend.conversation_messages(phone).await;

        let messages = match result {
            Ok(messages) => messages,
            Err(e) => {
                if e.is_unauthorized() || self.selection().await.is(phone) {
                    self.report_failure("Loading messages", e, mode == FetchMode::Manual)
                        .await;
                } else {
                    tracing::debug!(phone, "ignoring failed fetch for a closed conversation");
                }
                return None;
            }
        };

        let count = messages.len();
        let scroll = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            match state.thread.as_mut() {
                Some(thread) if thread.phone == phone && state.selection.is(phone) => {
                    thread.apply(messages, mode)
                }
                _ => {
                    tracing::debug!(phone, "discarding messages for a closed conversation");
                    return None;
                }
            }
        };

        self.emit(InboxEvent::MessagesUpdated {
            phone: phone.to_string(),
            count,
            scroll,
        });
        Some(scroll)
    }

    pub async fn messages(&self) -> Vec<Message> {
        let state = self.inner.state.lock().await;
        state
            .thread
            .as_ref()
            .map(|t| t.messages.clone())
            .unwrap_or_default()
    }

    /// Reports the rendered scroll position of the open thread
    pub async fn set_viewport(&self, viewport: Viewport) {
        let mut state = self.inner.state.lock().await;
        if let Some(thread) = state.thread.as_mut() {
            thread.viewport = viewport;
        }
    }

    /// Messages of the open thread grouped by local calendar day
    pub async fn message_groups(&self) -> Vec<DayGroup> {
        let today: NaiveDate = Local::now().date_naive();
        presenter::group_messages_by_day(&self.messages().await, today, &Local)
    }

    pub async fn send_message(&self, phone: &str, text: &str) -> Result<(), ApiError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::InvalidInput("message is empty".to_string()));
        }

        match self.inner.backend.send_manual_message(phone, text).await {
            Ok(_) => {
                self.inner.notifier.success("Mensaje enviado");
                if self.selection().await.is(phone) {
                    self.fetch_messages(phone, FetchMode::Manual).await;
                }
                self.refresh_conversations(false).await;
                Ok(())
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.expire_session().await;
                } else {
                    tracing::warn!("Sending message to {} failed: {}", phone, e);
                    self.inner
                        .notifier
                        .error(format!("No se pudo enviar el mensaje: {}", e));
                }
                Err(e)
            }
        }
    }

    // Read state

    pub async fn is_unread(&self, phone: &str) -> bool {
        let state = self.inner.state.lock().await;
        state
            .conversations
            .find(phone)
            .map(|c| self.inner.unread.is_unread(c))
            .unwrap_or(false)
    }

    pub async fn mark_attended(&self, phone: &str) -> Result<(), StoreError> {
        let latest = self
            .inner
            .state
            .lock()
            .await
            .conversations
            .latest_message_time(phone);
        self.inner.unread.mark_as_read(phone, latest)?;
        self.emit(InboxEvent::ReadStateChanged {
            phone: phone.to_string(),
        });
        Ok(())
    }

    // Contact info

    pub async fn contact_info(&self, phone: &str) -> Option<ContactInfo> {
        self.inner.contacts.get(phone).await
    }

    /// Loads contact info once per phone and returns whatever is cached after
    pub async fn fetch_contact_info(&self, phone: &str) -> Option<ContactInfo> {
        let backend = self.inner.backend.clone();
        let loaded = self
            .inner
            .contacts
            .ensure(phone, move |phone| async move {
                backend.contact_info(&phone).await
            })
            .await;

        match loaded {
            Ok(true) => self.emit(InboxEvent::ContactInfoLoaded {
                phone: phone.to_string(),
            }),
            Ok(false) => {}
            Err(e) => self.report_failure("Loading contact info", e, false).await,
        }

        self.inner.contacts.get(phone).await
    }

    pub async fn prefetch_visible_contacts(&self) {
        let phones: Vec<String> = self
            .visible_conversations()
            .await
            .into_iter()
            .take(self.inner.settings.contact_prefetch)
            .map(|row| row.conversation.phone)
            .collect();

        join_all(phones.iter().map(|phone| self.fetch_contact_info(phone))).await;
    }

    // Failures

    async fn report_failure(&self, context: &str, err: ApiError, notify: bool) {
        if err.is_unauthorized() {
            self.expire_session().await;
            return;
        }

        tracing::warn!("{} failed: {}", context, err);
        if notify {
            self.inner.notifier.error(format!("{}: {}", context, err));
        }
    }

    /// Stops all polling and tells the renderer to send the operator to login.
    /// Repeated failures from concurrent calls announce it once.
    async fn expire_session(&self) {
        self.inner.poller.stop(CONVERSATIONS_POLL).await;
        self.inner.poller.stop(MESSAGES_POLL).await;

        if !self.inner.session_expired.swap(true, Ordering::SeqCst) {
            tracing::warn!("Session expired, inbox polling stopped");
            self.inner
                .notifier
                .error("La sesión expiró, iniciá sesión de nuevo");
            self.emit(InboxEvent::SessionExpired);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::auth_session;
    use crate::helpers::notifier::NoticeLevel;
    use crate::integrations::backend::tests::logged_in_client;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn inbox_for(server: &MockServer, settings: InboxConfig) -> Inbox {
        Inbox::new(logged_in_client(&server.uri()), settings, Notifier::new())
    }

    fn conversation_json(phone: &str, direction: &str, time: &str) -> Value {
        json!({
            "phone": phone,
            "last_message": "Hola",
            "last_message_time": time,
            "direction": direction,
            "message_count": 1
        })
    }

    fn messages_json(phone: &str, ids: &[i64]) -> Value {
        let messages: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "timestamp": "2024-03-15 10:00:00",
                    "phone": phone,
                    "direction": "incoming",
                    "message": format!("mensaje {id}")
                })
            })
            .collect();
        json!({ "phone": phone, "messages": messages })
    }

    async fn mount_conversations(server: &MockServer, conversations: Vec<Value>) {
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "conversations": conversations })),
            )
            .mount(server)
            .await;
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<InboxEvent>, matches: F) -> InboxEvent
    where
        F: Fn(&InboxEvent) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(event) if matches(&event) => return event,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(e) => panic!("inbox event channel closed: {e}"),
                }
            }
        })
        .await
        .expect("timed out waiting for inbox event")
    }

    fn phones(rows: &[ConversationRow]) -> Vec<String> {
        rows.iter().map(|r| r.conversation.phone.clone()).collect()
    }

    #[tokio::test]
    async fn test_refresh_replaces_and_persists_list() {
        let server = MockServer::start().await;
        mount_conversations(
            &server,
            vec![
                conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00"),
                conversation_json("5491100000002", "outgoing", "2024-03-15 11:00:00"),
                conversation_json("test_001", "incoming", "2024-03-15 12:00:00"),
            ],
        )
        .await;
        let inbox = inbox_for(&server, InboxConfig::default());

        assert!(inbox.refresh_conversations(true).await);
        assert!(!inbox.is_loading().await);

        let rows = inbox.visible_conversations().await;
        assert_eq!(phones(&rows), vec!["5491100000001", "5491100000002"]);
        assert!(rows[0].unread);

        let cached = ConversationStore::load_cached(inbox.inner.backend.store());
        assert_eq!(cached.conversations().len(), 3);

        inbox.set_show_test(true).await;
        assert_eq!(phones(&inbox.visible_conversations().await), vec!["test_001"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00")]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut notices = inbox.notifier().subscribe();

        assert!(inbox.refresh_conversations(false).await);
        assert!(!inbox.refresh_conversations(true).await);

        assert!(!inbox.is_loading().await);
        assert_eq!(inbox.visible_conversations().await.len(), 1);
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if let Ok(mut out) = self.0.lock() {
                out.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn lines_with(&self, level: &str, text: &str) -> usize {
            let out = self.0.lock().unwrap();
            String::from_utf8_lossy(&out)
                .lines()
                .filter(|line| line.contains(level) && line.contains(text))
                .count()
        }
    }

    #[tokio::test]
    async fn test_manual_refresh_failure_warns_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut notices = inbox.notifier().subscribe();

        assert!(!inbox.refresh_conversations(true).await);

        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
        assert_eq!(logs.lines_with("WARN", "Refreshing conversations"), 1);
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_last_to_resolve_wins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "conversations": [conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00")]
                    }))
                    .set_delay(Duration::from_millis(400)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_conversations(
            &server,
            vec![conversation_json("5491100000002", "incoming", "2024-03-15 10:05:00")],
        )
        .await;

        let inbox = inbox_for(&server, InboxConfig::default());

        let slow = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.refresh_conversations(false).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(inbox.refresh_conversations(false).await);
        assert_eq!(phones(&inbox.visible_conversations().await), vec!["5491100000002"]);

        assert!(slow.await.unwrap());
        assert_eq!(phones(&inbox.visible_conversations().await), vec!["5491100000001"]);
    }

    #[tokio::test]
    async fn test_select_marks_read_and_loads_thread() {
        let server = MockServer::start().await;
        mount_conversations(
            &server,
            vec![conversation_json("5491122223333", "incoming", "2024-03-15 10:00:00")],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/api/conversations/5491122223333"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messages_json("5491122223333", &[1, 2])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/contact-info/5491122223333"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "phone": "5491122223333",
                "name": "María González",
                "order_count": 2
            })))
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut events = inbox.subscribe();
        inbox.refresh_conversations(false).await;
        assert!(inbox.is_unread("5491122223333").await);

        inbox.select("5491122223333").await;

        assert!(!inbox.is_unread("5491122223333").await);
        assert_eq!(inbox.selection().await, Selection::Selected("5491122223333".to_string()));
        assert!(inbox.is_polling_messages().await);

        let event = wait_for(&mut events, |e| matches!(e, InboxEvent::MessagesUpdated { .. })).await;
        assert_eq!(
            event,
            InboxEvent::MessagesUpdated {
                phone: "5491122223333".to_string(),
                count: 2,
                scroll: ScrollAction::ToBottom { smooth: true },
            }
        );
        assert_eq!(inbox.messages().await.len(), 2);
        assert_eq!(inbox.message_groups().await.len(), 1);

        let info = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(info) = inbox.contact_info("5491122223333").await {
                    return info;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("contact info was never loaded");
        assert_eq!(info.order_count, 2);

        inbox.back().await;
        assert_eq!(inbox.selection().await, Selection::None);
        assert!(!inbox.is_polling_messages().await);
        assert!(inbox.messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_auto_refresh_preserves_scroll_when_reading_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations/5491122223333"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messages_json("5491122223333", &[1])))
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        inbox.select("5491122223333").await;
        inbox
            .set_viewport(Viewport::new(5000.0, 200.0, 600.0))
            .await;

        assert_eq!(
            inbox.fetch_messages("5491122223333", FetchMode::Auto).await,
            Some(ScrollAction::Preserve)
        );

        inbox
            .set_viewport(Viewport::new(5000.0, 4450.0, 600.0))
            .await;
        assert_eq!(
            inbox.fetch_messages("5491122223333", FetchMode::Auto).await,
            Some(ScrollAction::ToBottom { smooth: false })
        );
        inbox.unmount().await;
    }

    #[tokio::test]
    async fn test_response_for_previous_selection_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations/5491100000001"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(messages_json("5491100000001", &[1, 2, 3]))
                    .set_delay(Duration::from_millis(300)),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversations/5491100000002"))
            .respond_with(ResponseTemplate::new(200).set_body_json(messages_json("5491100000002", &[9])))
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut events = inbox.subscribe();

        inbox.select("5491100000001").await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        inbox.select("5491100000002").await;

        wait_for(&mut events, |e| {
            matches!(e, InboxEvent::MessagesUpdated { phone, .. } if phone == "5491100000002")
        })
        .await;
        tokio::time::sleep(Duration::from_millis(500)).await;

        let ids: Vec<i64> = inbox.messages().await.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![9]);
        while let Ok(event) = events.try_recv() {
            assert!(
                !matches!(&event, InboxEvent::MessagesUpdated { phone, .. } if phone == "5491100000001"),
                "stale thread was applied: {event:?}"
            );
        }
        assert_eq!(inbox.fetch_messages("5491100000001", FetchMode::Auto).await, None);
        inbox.unmount().await;
    }

    #[tokio::test]
    async fn test_unauthorized_stops_polling_and_expires_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut events = inbox.subscribe();
        let mut notices = inbox.notifier().subscribe();

        inbox.mount().await;
        wait_for(&mut events, |e| matches!(e, InboxEvent::SessionExpired)).await;

        assert!(!inbox.inner.poller.is_running(CONVERSATIONS_POLL).await);
        assert!(auth_session::load_session(inbox.inner.backend.store())
            .unwrap()
            .is_none());
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Error);

        // A second failure does not announce again
        assert!(!inbox.refresh_conversations(false).await);
        tokio::task::yield_now().await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_rejects_blank_text() {
        let server = MockServer::start().await;
        let inbox = inbox_for(&server, InboxConfig::default());

        let result = inbox.send_message("5491100000001", "   ").await;

        assert!(matches!(result, Err(ApiError::InvalidInput(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_notifies_and_refreshes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send-manual-message"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true, "message_id": "wamid.1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [conversation_json("5491100000001", "outgoing", "2024-03-15 10:00:00")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let inbox = inbox_for(&server, InboxConfig::default());
        let mut notices = inbox.notifier().subscribe();

        inbox
            .send_message("5491100000001", "  Tu pedido sale mañana  ")
            .await
            .unwrap();

        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Success);
        assert_eq!(inbox.visible_conversations().await.len(), 1);
    }

    #[tokio::test]
    async fn test_prefetch_covers_first_visible_rows_once() {
        let server = MockServer::start().await;
        mount_conversations(
            &server,
            vec![
                conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00"),
                conversation_json("5491100000002", "incoming", "2024-03-15 11:00:00"),
                conversation_json("5491100000003", "incoming", "2024-03-15 12:00:00"),
                conversation_json("sim_1", "incoming", "2024-03-15 13:00:00"),
            ],
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/api/contact-info/[^/]+$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "phone": "ignored",
                "name": "Cliente Frecuente"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let settings = InboxConfig {
            contact_prefetch: 2,
            ..InboxConfig::default()
        };
        let inbox = inbox_for(&server, settings);
        inbox.refresh_conversations(false).await;

        inbox.prefetch_visible_contacts().await;
        inbox.prefetch_visible_contacts().await;

        assert!(inbox.contact_info("5491100000003").await.is_some());
        assert!(inbox.contact_info("5491100000002").await.is_some());
        assert!(inbox.contact_info("5491100000001").await.is_none());
        assert!(inbox.contact_info("sim_1").await.is_none());

        let rows = inbox.visible_conversations().await;
        assert_eq!(rows[0].display_name, "Cliente Frecuente");
        assert_eq!(rows[2].display_name, "5491100000001");
    }

    #[tokio::test]
    async fn test_filter_and_search_changes_prefetch_newly_visible_rows() {
        let server = MockServer::start().await;
        mount_conversations(
            &server,
            vec![
                conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00"),
                conversation_json("5491100000002", "outgoing", "2024-03-15 11:00:00"),
                conversation_json("5491100000003", "incoming", "2024-03-15 12:00:00"),
            ],
        )
        .await;
        for phone in ["5491100000001", "5491100000002", "5491100000003"] {
            Mock::given(method("GET"))
                .and(path(format!("/api/contact-info/{phone}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "phone": phone,
                    "name": format!("Cliente {phone}")
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let settings = InboxConfig {
            contact_prefetch: 1,
            ..InboxConfig::default()
        };
        let inbox = inbox_for(&server, settings);
        inbox.refresh_conversations(false).await;

        inbox.set_search("00000001").await;
        assert!(inbox.contact_info("5491100000001").await.is_some());
        assert!(inbox.contact_info("5491100000003").await.is_none());

        inbox.set_search("").await;
        assert!(inbox.contact_info("5491100000003").await.is_some());
        assert!(inbox.contact_info("5491100000002").await.is_none());

        inbox.set_filter(ConversationFilter::Outgoing).await;
        assert!(inbox.contact_info("5491100000002").await.is_some());

        inbox.set_filter(ConversationFilter::Outgoing).await;
        inbox.set_filter(ConversationFilter::All).await;
    }

    #[tokio::test]
    async fn test_later_polls_prefetch_new_conversations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/conversations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conversations": [conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00")]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        mount_conversations(
            &server,
            vec![
                conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00"),
                conversation_json("5491100000002", "incoming", "2024-03-15 10:05:00"),
            ],
        )
        .await;
        for phone in ["5491100000001", "5491100000002"] {
            Mock::given(method("GET"))
                .and(path(format!("/api/contact-info/{phone}")))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "phone": phone,
                    "name": "Cliente"
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let settings = InboxConfig {
            conversation_poll_secs: 1,
            ..InboxConfig::default()
        };
        let inbox = inbox_for(&server, settings);
        let mut events = inbox.subscribe();

        inbox.mount().await;
        wait_for(&mut events, |e| {
            *e == InboxEvent::ContactInfoLoaded {
                phone: "5491100000002".to_string(),
            }
        })
        .await;
        inbox.unmount().await;

        assert!(inbox.contact_info("5491100000001").await.is_some());
        assert!(inbox.contact_info("5491100000002").await.is_some());
    }

    #[tokio::test]
    async fn test_mark_attended_emits_change() {
        let server = MockServer::start().await;
        mount_conversations(
            &server,
            vec![conversation_json("5491100000001", "incoming", "2024-03-15 10:00:00")],
        )
        .await;
        let inbox = inbox_for(&server, InboxConfig::default());
        inbox.refresh_conversations(false).await;
        let mut events = inbox.subscribe();

        inbox.mark_attended("5491100000001").await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            InboxEvent::ReadStateChanged {
                phone: "5491100000001".to_string()
            }
        );
        assert!(!inbox.is_unread("5491100000001").await);
    }
}
