use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use idmap::IdMap;
use idmap_derive::IntegerId;
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::tracking::TrackingState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntegerId, AsRefStr, EnumIter)]
pub enum MessageType {
    TrackingStateEscalation,
    ContentPlacement,
    PlaneEstimation,
    FocusSquare,
}

/// What the anchor callbacks and session logic may ask of the status overlay.
pub trait StatusMessenger {
    /// Shows `text` after `delay` unless cancelled. Replaces any pending message of the same type.
    fn schedule_message(&mut self, text: &str, delay: Duration, message_type: MessageType);
    fn show_message(&mut self, text: &str, auto_hide: bool);
    fn cancel_scheduled_message(&mut self, message_type: MessageType);
    fn cancel_all_scheduled_messages(&mut self);
}

struct ScheduledMessage {
    text: Arc<str>,
    due: Instant,
    auto_hide: bool,
}

pub struct StatusView {
    message: Option<Arc<str>>,
    hide_at: Option<Instant>,
    hide_delay: Duration,
    scheduled: IdMap<MessageType, ScheduledMessage>,
}

impl StatusView {
    pub fn new(hide_delay: Duration) -> Self {
        Self {
            message: None,
            hide_at: None,
            hide_delay,
            scheduled: IdMap::new(),
        }
    }

    /// Text currently on screen, if any.
    pub fn visible_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_scheduled(&self, message_type: MessageType) -> bool {
        self.scheduled.get(message_type).is_some()
    }

    fn show_message_at(&mut self, text: Arc<str>, auto_hide: bool, now: Instant) {
        log::info!("Status: {}", text.replace('\n', " | "));
        self.message = Some(text);
        self.hide_at = auto_hide.then(|| now + self.hide_delay);
    }

    /// Fires due scheduled messages and hides expired ones.
    pub fn tick(&mut self, now: Instant) {
        let mut due: Vec<(Instant, MessageType)> = MessageType::iter()
            .filter_map(|t| {
                self.scheduled
                    .get(t)
                    .filter(|m| m.due <= now)
                    .map(|m| (m.due, t))
            })
            .collect();
        due.sort_by_key(|(at, _)| *at);

        for (_, message_type) in due {
            if let Some(msg) = self.scheduled.remove(message_type) {
                log::debug!("Scheduled {} message is due", message_type.as_ref());
                self.show_message_at(msg.text, msg.auto_hide, now);
            }
        }

        if self.hide_at.is_some_and(|at| at <= now) {
            log::debug!("Status message hidden");
            self.message = None;
            self.hide_at = None;
        }
    }

    pub fn show_tracking_quality_info(&mut self, state: TrackingState, auto_hide: bool) {
        let text = match state.recommendation() {
            Some(rec) => format!("{}\n{}", state.presentation_string(), rec),
            None => state.presentation_string().to_string(),
        };
        self.show_message(&text, auto_hide);
    }

    /// If tracking stays degraded for `delay`, replace the status with a stronger hint.
    pub fn escalate_feedback(&mut self, state: TrackingState, delay: Duration) {
        let title = format!("Tracking status: {}.", state.presentation_string());
        let text = match state.recommendation() {
            Some(rec) => format!("{title}\n{rec}"),
            None => format!("{title}\nTry resetting the session."),
        };
        self.scheduled.insert(
            MessageType::TrackingStateEscalation,
            ScheduledMessage {
                text: text.into(),
                due: Instant::now() + delay,
                auto_hide: false,
            },
        );
    }
}

impl StatusMessenger for StatusView {
    fn schedule_message(&mut self, text: &str, delay: Duration, message_type: MessageType) {
        self.scheduled.insert(
            message_type,
            ScheduledMessage {
                text: text.into(),
                due: Instant::now() + delay,
                auto_hide: true,
            },
        );
    }

    fn show_message(&mut self, text: &str, auto_hide: bool) {
        self.show_message_at(text.into(), auto_hide, Instant::now());
    }

    fn cancel_scheduled_message(&mut self, message_type: MessageType) {
        self.scheduled.remove(message_type);
    }

    fn cancel_all_scheduled_messages(&mut self) {
        self.scheduled.clear();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::tracking::LimitedReason;

    #[derive(Debug, Clone, PartialEq)]
    pub enum StatusCall {
        Schedule(String, MessageType),
        Show(String),
        Cancel(MessageType),
        CancelAll,
    }

    /// Records every call in order.
    #[derive(Default)]
    pub struct RecordingStatus {
        pub calls: Vec<StatusCall>,
    }

    impl StatusMessenger for RecordingStatus {
        fn schedule_message(&mut self, text: &str, _delay: Duration, message_type: MessageType) {
            self.calls
                .push(StatusCall::Schedule(text.to_string(), message_type));
        }
        fn show_message(&mut self, text: &str, _auto_hide: bool) {
            self.calls.push(StatusCall::Show(text.to_string()));
        }
        fn cancel_scheduled_message(&mut self, message_type: MessageType) {
            self.calls.push(StatusCall::Cancel(message_type));
        }
        fn cancel_all_scheduled_messages(&mut self) {
            self.calls.push(StatusCall::CancelAll);
        }
    }

    const LONG: Duration = Duration::from_secs(3600);

    #[test]
    fn scheduled_message_fires_when_due() {
        let mut view = StatusView::new(Duration::from_secs(6));
        view.schedule_message("Look around", Duration::from_millis(10), MessageType::ContentPlacement);
        assert!(view.visible_message().is_none());

        view.tick(Instant::now() + LONG);
        assert_eq!(view.visible_message(), Some("Look around"));
        assert!(!view.is_scheduled(MessageType::ContentPlacement));
    }

    #[test]
    fn rescheduling_replaces_same_type() {
        let mut view = StatusView::new(Duration::from_secs(6));
        view.schedule_message("first", LONG, MessageType::ContentPlacement);
        view.schedule_message("second", Duration::ZERO, MessageType::ContentPlacement);
        view.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(view.visible_message(), Some("second"));
    }

    #[test]
    fn cancel_all_drops_pending_messages() {
        let mut view = StatusView::new(Duration::from_secs(6));
        view.schedule_message("a", Duration::ZERO, MessageType::ContentPlacement);
        view.schedule_message("b", Duration::ZERO, MessageType::PlaneEstimation);
        view.cancel_all_scheduled_messages();
        view.tick(Instant::now() + LONG);
        assert!(view.visible_message().is_none());
    }

    #[test]
    fn auto_hide_clears_message() {
        let mut view = StatusView::new(Duration::from_secs(6));
        view.show_message("Detected image", true);
        view.tick(Instant::now());
        assert_eq!(view.visible_message(), Some("Detected image"));
        view.tick(Instant::now() + Duration::from_secs(7));
        assert!(view.visible_message().is_none());

        view.show_message("sticky", false);
        view.tick(Instant::now() + LONG);
        assert_eq!(view.visible_message(), Some("sticky"));
    }

    #[test]
    fn escalation_can_be_cancelled() {
        let mut view = StatusView::new(Duration::from_secs(6));
        let state = TrackingState::Limited(LimitedReason::ExcessiveMotion);
        view.show_tracking_quality_info(state, true);
        view.escalate_feedback(state, Duration::from_secs(3));
        assert!(view.is_scheduled(MessageType::TrackingStateEscalation));

        view.cancel_scheduled_message(MessageType::TrackingStateEscalation);
        view.tick(Instant::now() + Duration::from_secs(4));
        assert!(view.visible_message().unwrap().starts_with("TRACKING LIMITED"));
    }

    #[test]
    fn escalation_without_recommendation_suggests_reset() {
        let mut view = StatusView::new(Duration::from_secs(6));
        view.escalate_feedback(TrackingState::NotAvailable, Duration::ZERO);
        view.tick(Instant::now() + Duration::from_secs(1));
        assert!(view
            .visible_message()
            .unwrap()
            .ends_with("Try resetting the session."));
    }
}
