use serde_json::{json, Map};

use crate::models::{preview, ExecutionTrace, Plan, RunOutcome};
use crate::services::ai::planner::plan_from_query;
use crate::services::{disease, history, records};
use crate::state::AppState;

// A plan slot counts as unspecified when it is missing or an empty
// string; defaults apply to both.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// Classify the query, call exactly one service for it, and return the
// answer together with a full execution trace. Service failures propagate
// untouched; routing itself never fails.
pub async fn run_agent(state: &AppState, user_query: &str) -> anyhow::Result<RunOutcome> {
    let plan = plan_from_query(state.llm.as_ref(), user_query).await?;

    let selected_tool;
    let final_answer;
    let mut tool_input = Map::new();
    let mut tool_output = String::new();
    let mut patient_context_used = String::new();

    match &plan {
        Plan::BookAppointment {
            patient_name,
            reason,
            speciality,
            date,
        } => {
            selected_tool = "book_appointment";
            let patient_name = non_empty(patient_name).unwrap_or("Unknown Patient");
            let reason = non_empty(reason).unwrap_or(user_query);
            let speciality = non_empty(speciality).unwrap_or("general physician");
            let date = non_empty(date);

            tool_input.insert("patient_name".to_string(), json!(patient_name));
            tool_input.insert("reason".to_string(), json!(reason));
            tool_input.insert("speciality".to_string(), json!(speciality));
            tool_input.insert("preferred_date".to_string(), json!(date));

            tool_output = state.slots.book(patient_name, reason, speciality, date)?;
            final_answer = tool_output.clone();
        }

        Plan::PatientSummary { patient_name } => {
            selected_tool = "summarize_patient_history";
            match non_empty(patient_name) {
                None => {
                    final_answer = "I need a patient name to summarize the medical history. \
                                    For example: 'Summarize history for Anjali Mehra.'"
                        .to_string();
                }
                Some(name) => {
                    // memory as it stood before this request, for the trace
                    patient_context_used = state.memory.patient_context(name)?;
                    tool_input.insert("patient_name".to_string(), json!(name));
                    tool_output = records::summarize_patient_history(
                        state.llm.as_ref(),
                        state.embeddings.as_ref(),
                        &state.patients,
                        &state.memory,
                        name,
                        None,
                    )
                    .await?;
                    final_answer = tool_output.clone();
                }
            }
        }

        Plan::UpdateHistory {
            patient_name,
            conditions,
            medications,
            note,
        } => {
            selected_tool = "add_or_update_history";
            match non_empty(patient_name) {
                None => {
                    final_answer =
                        "Please specify the patient's full name to update their history."
                            .to_string();
                }
                Some(name) => {
                    let conditions = non_empty(conditions).unwrap_or("");
                    let medications = non_empty(medications).unwrap_or("");
                    let free_text_note = non_empty(note).unwrap_or(user_query);

                    tool_input.insert("patient_name".to_string(), json!(name));
                    tool_input.insert("conditions".to_string(), json!(conditions));
                    tool_input.insert("medications".to_string(), json!(medications));
                    tool_input.insert("free_text_note".to_string(), json!(free_text_note));

                    tool_output = history::add_or_update_history(
                        &state.memory,
                        name,
                        conditions,
                        medications,
                        free_text_note,
                    )?;
                    final_answer = tool_output.clone();
                }
            }
        }

        Plan::DiseaseInfo { disease } => {
            selected_tool = "get_disease_information";
            let disease_query = non_empty(disease).unwrap_or(user_query);
            tool_input.insert("disease_query".to_string(), json!(disease_query));

            tool_output = disease::get_disease_information(
                state.llm.as_ref(),
                state.embeddings.as_ref(),
                &state.disease_index,
                disease_query,
            )
            .await?;
            final_answer = tool_output.clone();
        }
    }

    tracing::info!(tool = selected_tool, "dispatched query");

    let trace = ExecutionTrace {
        user_query: user_query.to_string(),
        plan,
        selected_tool: selected_tool.to_string(),
        tool_input,
        tool_output_preview: preview(&tool_output),
        patient_memory_used: preview(&patient_context_used),
    };

    Ok(RunOutcome {
        answer: final_answer,
        trace,
    })
}
