use shared_types::Message;

/// Distance from the bottom, in pixels, under which the thread counts as
/// "following" new messages.
pub const NEAR_BOTTOM_THRESHOLD: f64 = 100.0;

/// Scroll geometry of the rendered message thread
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub scroll_height: f64,
    pub scroll_top: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn new(scroll_height: f64, scroll_top: f64, client_height: f64) -> Self {
        Self {
            scroll_height,
            scroll_top,
            client_height,
        }
    }

    pub fn is_near_bottom(&self) -> bool {
        self.scroll_height - self.scroll_top - self.client_height < NEAR_BOTTOM_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Operator opened the thread or sent a message
    Manual,
    /// Background poll
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAction {
    ToBottom { smooth: bool },
    Preserve,
}

/// Manual fetches always jump to the newest message. Background refreshes
/// follow only when the operator was already reading at the bottom, so
/// scrolling back through history is not interrupted.
pub fn scroll_after_fetch(mode: FetchMode, before: &Viewport) -> ScrollAction {
    match mode {
        FetchMode::Manual => ScrollAction::ToBottom { smooth: true },
        FetchMode::Auto if before.is_near_bottom() => ScrollAction::ToBottom { smooth: false },
        FetchMode::Auto => ScrollAction::Preserve,
    }
}

/// Messages of the selected conversation
#[derive(Debug, Clone, PartialEq)]
pub struct MessageThread {
    pub phone: String,
    pub messages: Vec<Message>,
    pub viewport: Viewport,
    pub loaded: bool,
}

impl MessageThread {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: phone.into(),
            messages: Vec::new(),
            viewport: Viewport::default(),
            loaded: false,
        }
    }

    /// Swaps in a fetched page and reports how the view should scroll
    pub fn apply(&mut self, messages: Vec<Message>, mode: FetchMode) -> ScrollAction {
        let action = scroll_after_fetch(mode, &self.viewport);
        self.messages = messages;
        self.loaded = true;
        action
    }
}
