use crate::services::memory::ContextStore;

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

// Record manually supplied history (attendants, front desk) as a note in
// patient memory. Returns a confirmation, or an instructional string when
// no patient name was given.
pub fn add_or_update_history(
    memory: &ContextStore,
    patient_name: &str,
    conditions: &str,
    medications: &str,
    free_text_note: &str,
) -> anyhow::Result<String> {
    if patient_name.trim().is_empty() {
        return Ok("Patient name is required to add or update history.".to_string());
    }

    let note = match free_text_note.trim() {
        "" => "No additional free-text note provided.",
        trimmed => trimmed,
    };

    memory.append_note(patient_name, note, conditions, medications)?;

    Ok(format!(
        "✅ History updated for {patient_name}.\n\
         - Conditions: {}\n\
         - Medications: {}\n\
         - Note: {note}",
        or_na(conditions),
        or_na(medications),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &std::path::Path) -> ContextStore {
        ContextStore::new(dir.join("memory.json"), dir.join("notes.json"))
    }

    #[test]
    fn test_blank_patient_name_is_rejected_without_writing() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let msg = add_or_update_history(&store, "   ", "flu", "paracetamol", "rest").unwrap();
        assert_eq!(msg, "Patient name is required to add or update history.");
        assert!(!dir.path().join("notes.json").exists());
    }

    #[test]
    fn test_updates_note_and_confirms() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let msg = add_or_update_history(
            &store,
            "Anjali Mehra",
            "hypertension",
            "amlodipine",
            "Attendant reports dizziness in the mornings.",
        )
        .unwrap();

        assert!(msg.starts_with("✅ History updated for Anjali Mehra."));
        assert!(msg.contains("- Conditions: hypertension"));
        assert!(msg.contains("- Medications: amlodipine"));
        assert!(msg.contains("- Note: Attendant reports dizziness in the mornings."));

        let notes = store.recent_notes("anjali mehra", 10).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].note, "Attendant reports dizziness in the mornings.");
        assert_eq!(notes[0].conditions, "hypertension");
    }

    #[test]
    fn test_blank_note_gets_placeholder() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());

        let msg = add_or_update_history(&store, "Ravi Kumar", "", "", "  ").unwrap();
        assert!(msg.contains("- Conditions: N/A"));
        assert!(msg.contains("- Medications: N/A"));
        assert!(msg.contains("- Note: No additional free-text note provided."));

        let notes = store.recent_notes("ravi kumar", 10).unwrap();
        assert_eq!(notes[0].note, "No additional free-text note provided.");
    }
}
