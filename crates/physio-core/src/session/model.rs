//! Session domain model.

use crate::timeslot::TimeSlot;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Persisted status of a treatment session.
///
/// `InProgress` is not stored; see [`DisplayStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "SCHEDULED",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::NoShow => "NO_SHOW",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as shown to users, including the derived `InProgress` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplayStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

/// A booked treatment session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub patient_id: String,
    pub therapist_id: String,
    /// Branch of the therapist at booking time.
    pub branch_id: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    pub duration_minutes: u32,
    pub status: SessionStatus,
    /// Nth session of this patient, counting earlier non-cancelled ones.
    #[serde(default)]
    pub session_number: Option<u32>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Session {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot {
            date: self.scheduled_date,
            start: self.scheduled_time,
            minutes: self.duration_minutes,
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(self.scheduled_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether the session still holds its slot.
    pub fn occupies_slot(&self) -> bool {
        self.status != SessionStatus::Cancelled
    }

    pub fn can_be_edited(&self) -> bool {
        matches!(self.status, SessionStatus::Scheduled | SessionStatus::Confirmed)
    }

    pub fn display_status(&self, now: NaiveDateTime) -> DisplayStatus {
        match self.status {
            SessionStatus::Scheduled => DisplayStatus::Scheduled,
            SessionStatus::Confirmed if self.starts_at() <= now && now < self.ends_at() => {
                DisplayStatus::InProgress
            }
            SessionStatus::Confirmed => DisplayStatus::Confirmed,
            SessionStatus::Completed => DisplayStatus::Completed,
            SessionStatus::Cancelled => DisplayStatus::Cancelled,
            SessionStatus::NoShow => DisplayStatus::NoShow,
        }
    }
}

/// Booking request for
/// [`SessionScheduler::create_session`](super::SessionScheduler::create_session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub patient_id: String,
    pub therapist_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Read view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub display_status: DisplayStatus,
    pub end_time: NaiveTime,
    pub is_today: bool,
    pub can_be_edited: bool,
}

impl SessionView {
    pub fn new(session: Session, now: NaiveDateTime) -> Self {
        Self {
            display_status: session.display_status(now),
            end_time: session.ends_at().time(),
            is_today: session.scheduled_date == now.date(),
            can_be_edited: session.can_be_edited(),
            session,
        }
    }
}

/// Sessions sharing a start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeGroup {
    pub time: NaiveTime,
    pub sessions: Vec<SessionView>,
}

/// One day's agenda, ordered by start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub groups: Vec<TimeGroup>,
}

impl DaySchedule {
    /// Groups views by start time. Input order within a group is preserved.
    pub fn from_views(date: NaiveDate, mut views: Vec<SessionView>) -> Self {
        views.sort_by_key(|v| v.session.scheduled_time);
        let mut groups: Vec<TimeGroup> = Vec::new();
        for view in views {
            match groups.last_mut() {
                Some(group) if group.time == view.session.scheduled_time => {
                    group.sessions.push(view)
                }
                _ => groups.push(TimeGroup {
                    time: view.session.scheduled_time,
                    sessions: vec![view],
                }),
            }
        }
        Self { date, groups }
    }

    pub fn sessions(&self) -> impl Iterator<Item = &SessionView> {
        self.groups.iter().flat_map(|g| g.sessions.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.sessions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hh: u32, mm: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 1)
            .unwrap()
            .and_hms_opt(hh, mm, 0)
            .unwrap()
    }

    fn session(status: SessionStatus) -> Session {
        Session {
            id: "s1".into(),
            patient_id: "p1".into(),
            therapist_id: "t7".into(),
            branch_id: "recife".into(),
            scheduled_date: at(9, 0).date(),
            scheduled_time: at(9, 0).time(),
            duration_minutes: 50,
            status,
            session_number: Some(1),
            notes: String::new(),
            cancellation_reason: None,
            created_by: "rc".into(),
            created_at: at(7, 0),
            updated_at: at(7, 0),
        }
    }

    #[test]
    fn test_in_progress_is_derived_for_confirmed_sessions() {
        let s = session(SessionStatus::Confirmed);
        assert_eq!(s.display_status(at(8, 59)), DisplayStatus::Confirmed);
        assert_eq!(s.display_status(at(9, 0)), DisplayStatus::InProgress);
        assert_eq!(s.display_status(at(9, 49)), DisplayStatus::InProgress);
        assert_eq!(s.display_status(at(9, 50)), DisplayStatus::Confirmed);
    }

    #[test]
    fn test_scheduled_never_shows_in_progress() {
        let s = session(SessionStatus::Scheduled);
        assert_eq!(s.display_status(at(9, 10)), DisplayStatus::Scheduled);
    }

    #[test]
    fn test_day_schedule_groups_by_time() {
        let mut a = session(SessionStatus::Scheduled);
        a.id = "a".into();
        a.scheduled_time = at(10, 0).time();
        let mut b = session(SessionStatus::Scheduled);
        b.id = "b".into();
        b.therapist_id = "t8".into();
        let c = session(SessionStatus::Confirmed);

        let views = vec![a, b, c]
            .into_iter()
            .map(|s| SessionView::new(s, at(7, 0)))
            .collect();
        let day = DaySchedule::from_views(at(0, 0).date(), views);

        assert_eq!(day.groups.len(), 2);
        assert_eq!(day.groups[0].time, at(9, 0).time());
        assert_eq!(day.groups[0].sessions.len(), 2);
        assert_eq!(day.groups[1].sessions[0].session.id, "a");
        assert_eq!(day.len(), 3);
    }
}
