use crate::config::AppConfig;
use crate::services::ai::embedding::EmbeddingProvider;
use crate::services::ai::LlmProvider;
use crate::services::appointments::SlotStore;
use crate::services::disease::DiseaseIndex;
use crate::services::evaluation::InteractionLog;
use crate::services::memory::ContextStore;
use crate::services::records::PatientDocs;

pub struct AppState {
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub embeddings: Box<dyn EmbeddingProvider>,
    pub slots: SlotStore,
    pub memory: ContextStore,
    pub patients: PatientDocs,
    pub disease_index: DiseaseIndex,
    pub log: InteractionLog,
}

impl AppState {
    // Providers are injected so tests can swap in scripted ones.
    pub fn new(
        config: AppConfig,
        llm: Box<dyn LlmProvider>,
        embeddings: Box<dyn EmbeddingProvider>,
    ) -> Self {
        let slots = SlotStore::new(config.records_path());
        let memory = ContextStore::new(config.memory_path(), config.notes_path());
        let patients = PatientDocs::new(config.patients_dir());
        let disease_index = DiseaseIndex::new(config.diseases_dir());
        let log = InteractionLog::new(config.log_path());
        Self {
            config,
            llm,
            embeddings,
            slots,
            memory,
            patients,
            disease_index,
            log,
        }
    }
}
