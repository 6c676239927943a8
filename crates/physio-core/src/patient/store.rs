use super::model::Patient;
use crate::error::Result;
use async_trait::async_trait;

/// External patient store.
///
/// `set_patient_assignment` is the only write the coordinator performs and it
/// is only ever invoked from the transfer coordinator's reassignment step.
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Finds a patient by ID.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Patient))`: patient found
    /// - `Ok(None)`: patient not found
    /// - `Err(_)`: store failure
    async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>>;

    /// Points the patient at a new therapist and branch, returning the
    /// updated record.
    async fn set_patient_assignment(
        &self,
        patient_id: &str,
        therapist_id: &str,
        branch_id: &str,
    ) -> Result<Patient>;

    /// Lists patients, optionally restricted to one branch.
    async fn list_patients(&self, branch_id: Option<&str>) -> Result<Vec<Patient>>;
}
