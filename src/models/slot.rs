use serde::{Deserialize, Serialize};

// One row of the appointment-slot table. Every cell is kept as a string,
// exactly as it sits in the CSV; patient_name stays empty until booked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotRow {
    pub appointment_id: String,
    pub patient_name: String,
    pub doctor_name: String,
    pub speciality: String,
    pub date: String,
    pub time_slot: String,
    pub status: String,
}
