use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::session::CheckInSession;

/// Open check-in sessions, at most one per event.
///
/// A session is only reachable through [`SessionRegistry::with_session`],
/// which holds the shard lock for the duration of the closure. Do not await
/// inside it.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, CheckInSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `session` unless one is already open for its event. Returns
    /// whether it was inserted.
    pub fn open(&self, session: CheckInSession) -> bool {
        match self.sessions.entry(session.event_id()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                tracing::info!("Opened check-in session for event {}", session.event_id());
                slot.insert(session);
                true
            }
        }
    }

    pub fn with_session<R>(
        &self,
        event_id: Uuid,
        f: impl FnOnce(&mut CheckInSession) -> R,
    ) -> Option<R> {
        self.sessions
            .get_mut(&event_id)
            .map(|mut entry| f(entry.value_mut()))
    }

    pub fn close(&self, event_id: Uuid) -> Option<CheckInSession> {
        let removed = self.sessions.remove(&event_id).map(|(_, session)| session);
        if removed.is_some() {
            tracing::info!("Closed check-in session for event {event_id}");
        }
        removed
    }

    pub fn contains(&self, event_id: Uuid) -> bool {
        self.sessions.contains_key(&event_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::checkin::{CheckInMethod, CheckInSubject, SvgQrEncoder};

    fn session(event_id: Uuid) -> CheckInSession {
        let subject = CheckInSubject {
            event_id,
            title: "Prayer Meeting".to_string(),
            event_type: "event".to_string(),
            start_date: Utc::now(),
            end_date: None,
            location_venue: None,
            capacity: Some(40),
        };
        CheckInSession::open(subject, Uuid::now_v7(), Uuid::now_v7(), "http://localhost")
    }

    #[test]
    fn one_session_per_event() {
        let registry = SessionRegistry::new();
        let event = Uuid::now_v7();
        assert!(registry.open(session(event)));
        assert!(!registry.open(session(event)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sessions_are_mutated_in_place() {
        let registry = SessionRegistry::new();
        let event = Uuid::now_v7();
        registry.open(session(event));

        registry
            .with_session(event, |s| s.materialize(&SvgQrEncoder::new(), Utc::now()).map(|_| ()))
            .unwrap()
            .unwrap();
        registry
            .with_session(event, |s| s.record_check_in(None, "Guest", CheckInMethod::Qr, Utc::now()))
            .unwrap()
            .unwrap();

        let count = registry.with_session(event, |s| s.records().len());
        assert_eq!(count, Some(1));
    }

    #[test]
    fn closing_discards_the_session() {
        let registry = SessionRegistry::new();
        let event = Uuid::now_v7();
        registry.open(session(event));

        assert!(registry.close(event).is_some());
        assert!(!registry.contains(event));
        assert!(registry.close(event).is_none());
        assert_eq!(registry.with_session(event, |s| s.records().len()), None);
    }
}
