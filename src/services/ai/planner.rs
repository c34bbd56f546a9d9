use crate::models::{Plan, RawPlan};
use crate::services::ai::{LlmProvider, Message};

const PLANNER_PROMPT: &str = r#"You are a planning agent for a healthcare assistant.

Your job is to analyse the user's message and decide:

- Is it about booking an appointment?
- Is it about summarizing a patient's medical history?
- Is it about getting information about a disease/condition?
- Is it about updating a patient's medical history (conditions/medications/notes)?

Return ONLY valid JSON with these keys:
- "task_type": one of "BOOK_APPOINTMENT", "PATIENT_SUMMARY", "DISEASE_INFO", "UPDATE_HISTORY"
- "patient_name": full patient name if mentioned, else null
- "reason": short reason for visit if mentioned, else null
- "speciality": e.g. "nephrologist", "cardiologist", else null
- "date": preferred date in YYYY-MM-DD if explicitly mentioned, else null
- "disease": disease name or question for disease info, else null
- "conditions": chronic conditions to store/update, else null
- "medications": important medications, else null
- "note": free-text note to store/update, else null
"#;

// The single completion call can fail (network, provider outage) and that
// error propagates; everything the model actually says, however malformed,
// decodes to some Plan.
pub async fn plan_from_query(llm: &dyn LlmProvider, user_query: &str) -> anyhow::Result<Plan> {
    let raw = llm
        .chat(PLANNER_PROMPT, &[Message::user(user_query)])
        .await?;
    Ok(parse_plan_response(&raw, user_query))
}

fn parse_plan_response(response: &str, user_query: &str) -> Plan {
    // The model is free-form text; the candidate JSON is whatever sits
    // between the first { and the last } (the full text without braces).
    let candidate = match (response.find('{'), response.rfind('}')) {
        (Some(first), Some(last)) if first <= last => &response[first..=last],
        _ => response,
    };

    match serde_json::from_str::<RawPlan>(candidate) {
        Ok(raw) => Plan::from_raw(raw),
        Err(_) => {
            tracing::warn!("failed to parse planner response as JSON, falling back to disease info");
            Plan::fallback(user_query)
        }
    }
}
