use serde::{Deserialize, Serialize};

// A generated clinical summary stored in the patient-memory file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryEntry {
    pub timestamp: String,
    pub source: String,
    pub summary: String,
}

// A manually entered history note; conditions/medications stay free text
// the way attendants type them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub timestamp: String,
    pub note: String,
    pub conditions: String,
    pub medications: String,
}
