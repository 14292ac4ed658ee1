//! Typing signal coordination.
//!
//! Outbound: keystrokes collapse into at most one `typing=true` per resend
//! window; an inactivity deadline emits the matching `typing=false`.
//! Inbound: a typing indicator for the open conversation stays visible while
//! fresh events keep re-arming a short expiry.
//!
//! Both sides are pure instant-driven state machines; the controller's event
//! pump supplies the clock and performs the actual publishes.

use std::time::{Duration, Instant};

use glance_shared::constants::{
    TYPING_DISPLAY_TTL_MS, TYPING_IDLE_TIMEOUT_MS, TYPING_RESEND_INTERVAL_MS,
};
use glance_shared::{ConversationId, TypingEvent};

const RESEND_INTERVAL: Duration = Duration::from_millis(TYPING_RESEND_INTERVAL_MS);
const IDLE_TIMEOUT: Duration = Duration::from_millis(TYPING_IDLE_TIMEOUT_MS);
const DISPLAY_TTL: Duration = Duration::from_millis(TYPING_DISPLAY_TTL_MS);

/// Outbound debounce state.
#[derive(Debug, Default)]
pub struct TypingCoordinator {
    active_conversation: Option<ConversationId>,
    last_sent_at: Option<Instant>,
    idle_deadline: Option<Instant>,
}

impl TypingCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active_conversation.is_some()
    }

    /// Register a keystroke. Returns the conversation to signal
    /// `typing=true` for when a (re)send is due. Always re-arms the
    /// inactivity deadline.
    pub fn on_input(&mut self, conversation_id: ConversationId, now: Instant) -> Option<ConversationId> {
        self.idle_deadline = Some(now + IDLE_TIMEOUT);

        let resend_due = match (self.active_conversation, self.last_sent_at) {
            (Some(active), Some(last)) if active == conversation_id => {
                now.duration_since(last) >= RESEND_INTERVAL
            }
            _ => true,
        };
        if !resend_due {
            return None;
        }
        self.active_conversation = Some(conversation_id);
        self.last_sent_at = Some(now);
        Some(conversation_id)
    }

    pub fn idle_deadline(&self) -> Option<Instant> {
        if self.is_active() {
            self.idle_deadline
        } else {
            None
        }
    }

    /// Fire the inactivity deadline. Returns the conversation to signal
    /// `typing=false` for when the window has really elapsed.
    pub fn on_idle(&mut self, now: Instant) -> Option<ConversationId> {
        let deadline = self.idle_deadline?;
        if now < deadline {
            return None;
        }
        self.take_active()
    }

    /// Force-stop: blur, conversation switch, composer close, teardown.
    /// Returns the conversation to signal `typing=false` for, if a signal
    /// was active.
    pub fn stop(&mut self) -> Option<ConversationId> {
        self.take_active()
    }

    fn take_active(&mut self) -> Option<ConversationId> {
        self.idle_deadline = None;
        self.last_sent_at = None;
        self.active_conversation.take()
    }
}

/// Inbound typing indicator display state.
#[derive(Debug, Default)]
pub struct TypingDisplay {
    conversation: Option<ConversationId>,
    username: Option<String>,
    deadline: Option<Instant>,
}

impl TypingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an inbound event. Events from self or for a conversation other
    /// than the open one are ignored.
    pub fn apply(
        &mut self,
        event: &TypingEvent,
        self_username: Option<&str>,
        open_conversation: Option<ConversationId>,
        now: Instant,
    ) {
        if self_username.is_some_and(|me| me == event.sender_username) {
            return;
        }
        if open_conversation != Some(event.conversation_id) {
            return;
        }
        if event.typing {
            self.conversation = Some(event.conversation_id);
            self.username = Some(event.sender_username.clone());
            self.deadline = Some(now + DISPLAY_TTL);
        } else {
            self.clear();
        }
    }

    /// Drop the indicator once its expiry passes. Returns whether it changed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn current(&self) -> Option<(ConversationId, &str)> {
        match (self.conversation, self.username.as_deref()) {
            (Some(conversation), Some(username)) => Some((conversation, username)),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.conversation = None;
        self.username = None;
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(id: i64) -> ConversationId {
        ConversationId(id)
    }

    fn event(id: i64, sender: &str, typing: bool) -> TypingEvent {
        TypingEvent {
            conversation_id: conv(id),
            sender_username: sender.into(),
            typing,
        }
    }

    #[test]
    fn two_inputs_within_the_window_send_once() {
        let mut coordinator = TypingCoordinator::new();
        let t0 = Instant::now();
        assert_eq!(coordinator.on_input(conv(1), t0), Some(conv(1)));
        assert_eq!(
            coordinator.on_input(conv(1), t0 + Duration::from_millis(300)),
            None
        );
    }

    #[test]
    fn resend_fires_after_the_interval() {
        let mut coordinator = TypingCoordinator::new();
        let t0 = Instant::now();
        coordinator.on_input(conv(1), t0);
        assert_eq!(
            coordinator.on_input(conv(1), t0 + Duration::from_millis(800)),
            Some(conv(1))
        );
    }

    #[test]
    fn idle_deadline_emits_exactly_one_stop() {
        let mut coordinator = TypingCoordinator::new();
        let t0 = Instant::now();
        coordinator.on_input(conv(1), t0);

        // Before the window: nothing.
        assert_eq!(coordinator.on_idle(t0 + Duration::from_millis(1000)), None);
        // After 1500ms of silence: one stop, then the state is clear.
        assert_eq!(
            coordinator.on_idle(t0 + Duration::from_millis(1500)),
            Some(conv(1))
        );
        assert_eq!(coordinator.on_idle(t0 + Duration::from_millis(2000)), None);
        assert!(!coordinator.is_active());
    }

    #[test]
    fn keystrokes_rearm_the_idle_deadline() {
        let mut coordinator = TypingCoordinator::new();
        let t0 = Instant::now();
        coordinator.on_input(conv(1), t0);
        coordinator.on_input(conv(1), t0 + Duration::from_millis(700));
        // The original deadline has passed but the rearm moved it.
        assert_eq!(coordinator.on_idle(t0 + Duration::from_millis(1600)), None);
        assert_eq!(
            coordinator.on_idle(t0 + Duration::from_millis(2200)),
            Some(conv(1))
        );
    }

    #[test]
    fn stop_is_silent_when_nothing_is_active() {
        let mut coordinator = TypingCoordinator::new();
        assert_eq!(coordinator.stop(), None);
        let t0 = Instant::now();
        coordinator.on_input(conv(2), t0);
        assert_eq!(coordinator.stop(), Some(conv(2)));
        assert_eq!(coordinator.stop(), None);
    }

    #[test]
    fn display_shows_only_the_open_conversation() {
        let mut display = TypingDisplay::new();
        let now = Instant::now();

        display.apply(&event(2, "bob", true), Some("me"), Some(conv(1)), now);
        assert!(display.current().is_none());

        display.apply(&event(1, "bob", true), Some("me"), Some(conv(1)), now);
        assert_eq!(display.current(), Some((conv(1), "bob")));
    }

    #[test]
    fn own_events_are_ignored() {
        let mut display = TypingDisplay::new();
        let now = Instant::now();
        display.apply(&event(1, "me", true), Some("me"), Some(conv(1)), now);
        assert!(display.current().is_none());
    }

    #[test]
    fn typing_false_clears_immediately() {
        let mut display = TypingDisplay::new();
        let now = Instant::now();
        display.apply(&event(1, "bob", true), Some("me"), Some(conv(1)), now);
        display.apply(&event(1, "bob", false), Some("me"), Some(conv(1)), now);
        assert!(display.current().is_none());
    }

    #[test]
    fn indicator_expires_after_ttl_unless_rearmed() {
        let mut display = TypingDisplay::new();
        let t0 = Instant::now();
        display.apply(&event(1, "bob", true), Some("me"), Some(conv(1)), t0);

        assert!(!display.expire(t0 + Duration::from_millis(2900)));
        assert!(display.current().is_some());

        // A fresh event re-arms the expiry.
        display.apply(
            &event(1, "bob", true),
            Some("me"),
            Some(conv(1)),
            t0 + Duration::from_millis(2900),
        );
        assert!(!display.expire(t0 + Duration::from_millis(3100)));

        assert!(display.expire(t0 + Duration::from_millis(5900)));
        assert!(display.current().is_none());
    }
}
