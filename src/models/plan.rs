use serde::{Deserialize, Serialize};

// Classification of one user request plus whatever slot values the
// planner extracted. Tagged by task_type so traces keep the wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Plan {
    BookAppointment {
        #[serde(default)]
        patient_name: Option<String>,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        speciality: Option<String>,
        #[serde(default)]
        date: Option<String>,
    },
    PatientSummary {
        #[serde(default)]
        patient_name: Option<String>,
    },
    DiseaseInfo {
        #[serde(default)]
        disease: Option<String>,
    },
    UpdateHistory {
        #[serde(default)]
        patient_name: Option<String>,
        #[serde(default)]
        conditions: Option<String>,
        #[serde(default)]
        medications: Option<String>,
        #[serde(default)]
        note: Option<String>,
    },
}

// What the planner LLM actually sends back: every key optional, no
// validation.
#[derive(Debug, Default, Deserialize)]
pub struct RawPlan {
    #[serde(default)]
    pub task_type: Option<String>,
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub speciality: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub disease: Option<String>,
    #[serde(default)]
    pub conditions: Option<String>,
    #[serde(default)]
    pub medications: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

impl Plan {
    // An unrecognized or missing task_type is treated as a
    // disease-information question.
    pub fn from_raw(raw: RawPlan) -> Plan {
        match raw.task_type.as_deref() {
            Some("BOOK_APPOINTMENT") => Plan::BookAppointment {
                patient_name: raw.patient_name,
                reason: raw.reason,
                speciality: raw.speciality,
                date: raw.date,
            },
            Some("PATIENT_SUMMARY") => Plan::PatientSummary {
                patient_name: raw.patient_name,
            },
            Some("UPDATE_HISTORY") => Plan::UpdateHistory {
                patient_name: raw.patient_name,
                conditions: raw.conditions,
                medications: raw.medications,
                note: raw.note,
            },
            _ => Plan::DiseaseInfo {
                disease: raw.disease,
            },
        }
    }

    // Used whenever the planner output cannot be decoded: treat the whole
    // query as a disease-information question.
    pub fn fallback(user_query: &str) -> Plan {
        Plan::DiseaseInfo {
            disease: Some(user_query.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_with_task_type_tag() {
        let plan = Plan::BookAppointment {
            patient_name: Some("Anjali Mehra".to_string()),
            reason: None,
            speciality: Some("nephrologist".to_string()),
            date: None,
        };
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["task_type"], "BOOK_APPOINTMENT");
        assert_eq!(json["speciality"], "nephrologist");
        assert!(json["reason"].is_null());
    }

    #[test]
    fn test_unrecognized_task_type_maps_to_disease_info() {
        let raw = RawPlan {
            task_type: Some("ORDER_PIZZA".to_string()),
            disease: Some("what is sepsis".to_string()),
            ..Default::default()
        };
        assert_eq!(
            Plan::from_raw(raw),
            Plan::DiseaseInfo {
                disease: Some("what is sepsis".to_string())
            }
        );
    }

    #[test]
    fn test_missing_task_type_maps_to_disease_info() {
        let raw = RawPlan::default();
        assert_eq!(Plan::from_raw(raw), Plan::DiseaseInfo { disease: None });
    }

    #[test]
    fn test_variant_keeps_only_its_own_slots() {
        let raw = RawPlan {
            task_type: Some("PATIENT_SUMMARY".to_string()),
            patient_name: Some("David Thompson".to_string()),
            disease: Some("ignored".to_string()),
            note: Some("ignored".to_string()),
            ..Default::default()
        };
        let plan = Plan::from_raw(raw);
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["task_type"], "PATIENT_SUMMARY");
        assert_eq!(json["patient_name"], "David Thompson");
        assert!(json.get("disease").is_none());
        assert!(json.get("note").is_none());
    }
}
