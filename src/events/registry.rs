//! In-memory participant tracking keyed by meeting UUID.
//!
//! Join/leave events can arrive out of order or more than once, so every
//! mutation is tolerant: a leave for an unknown meeting is a no-op and a
//! duplicate join updates the existing entry instead of growing the list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Option<String>,
    pub user_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub join_time: Option<DateTime<Utc>>,
}

impl Participant {
    /// Identity match for join/leave correlation: registered id wins, then
    /// the per-meeting user id, then the display name.
    fn same_person(&self, other: &Participant) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => return a == b,
            _ => {}
        }
        match (&self.user_id, &other.user_id) {
            (Some(a), Some(b)) => return a == b,
            _ => {}
        }
        self.name == other.name
    }
}

#[derive(Default)]
struct RegistryInner {
    meetings: HashMap<String, Vec<Participant>>,
    in_flight: HashSet<String>,
}

/// Shared registry of who is currently believed to be in each meeting, plus
/// the in-flight pipeline guard.
#[derive(Clone, Default)]
pub struct ParticipantRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ParticipantRegistry {
    pub async fn track_join(&self, meeting_uuid: &str, participant: Participant) {
        let mut inner = self.inner.lock().await;
        let entry = inner.meetings.entry(meeting_uuid.to_string()).or_default();

        if let Some(existing) = entry.iter_mut().find(|p| p.same_person(&participant)) {
            debug!(meeting_uuid, name = %participant.name, "Duplicate join, updating entry");
            *existing = participant;
        } else {
            entry.push(participant);
        }
    }

    pub async fn track_leave(&self, meeting_uuid: &str, participant: &Participant) {
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.meetings.get_mut(meeting_uuid) else {
            debug!(meeting_uuid, "Leave event for untracked meeting, ignoring");
            return;
        };

        entry.retain(|p| !p.same_person(participant));
        if entry.is_empty() {
            inner.meetings.remove(meeting_uuid);
        }
    }

    /// Participants currently believed to be in the meeting.
    pub async fn snapshot(&self, meeting_uuid: &str) -> Vec<Participant> {
        let inner = self.inner.lock().await;
        inner.meetings.get(meeting_uuid).cloned().unwrap_or_default()
    }

    /// Drops a meeting's entry once feedback has been dispatched for it.
    pub async fn clear(&self, meeting_uuid: &str) {
        let mut inner = self.inner.lock().await;
        inner.meetings.remove(meeting_uuid);
    }

    /// Claims the meeting for a pipeline run. Returns false when a run is
    /// already in flight, which callers treat as a duplicate delivery.
    pub async fn begin_pipeline(&self, meeting_uuid: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.in_flight.insert(meeting_uuid.to_string())
    }

    pub async fn finish_pipeline(&self, meeting_uuid: &str) {
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(meeting_uuid);
    }
}
