use super::model::Session;
use crate::error::{PhysioError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;

/// An abstract repository for managing session persistence.
///
/// New bookings go through [`SessionRepository::insert_booking`], which must
/// run [`admit_booking`] and the insert as one atomic step against everything
/// the store holds, including writes from other processes sharing it.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Finds a session by its ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Session))`: session found
    /// - `Ok(None)`: session not found
    /// - `Err(_)`: store failure
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>>;

    /// Inserts a new booking if its slot is still free, numbering it
    /// among the patient's sessions. Returns the stored session.
    ///
    /// # Errors
    ///
    /// `SlotConflict` if a non-cancelled session of the same therapist
    /// overlaps.
    async fn insert_booking(&self, session: Session) -> Result<Session>;

    /// Replaces an existing session (status changes, notes).
    async fn save(&self, session: &Session) -> Result<()>;

    /// All sessions on `date`, any status, any order.
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Session>>;

    /// All sessions of one therapist on `date`, any status.
    async fn list_for_therapist_on(
        &self,
        therapist_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Session>>;

    /// All sessions of one patient, any status.
    async fn list_by_patient(&self, patient_id: &str) -> Result<Vec<Session>>;
}

/// Checks `session` against the stored sessions and sets its ordinal.
///
/// Stores call this inside the critical section of `insert_booking`. The
/// ordinal is the number of the patient's earlier non-cancelled sessions + 1.
pub fn admit_booking<'a>(
    stored: impl IntoIterator<Item = &'a Session>,
    session: &mut Session,
) -> Result<()> {
    let slot = session.slot();
    let mut earlier = 0u32;
    for existing in stored.into_iter().filter(|s| s.occupies_slot()) {
        if existing.therapist_id == session.therapist_id && existing.slot().overlaps(&slot) {
            return Err(PhysioError::SlotConflict {
                therapist_id: session.therapist_id.clone(),
                existing: existing.slot().label(),
            });
        }
        if existing.patient_id == session.patient_id && existing.starts_at() < slot.starts_at() {
            earlier = earlier.saturating_add(1);
        }
    }
    session.session_number = Some(earlier.saturating_add(1));
    Ok(())
}
