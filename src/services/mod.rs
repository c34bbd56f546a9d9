pub mod agent;
pub mod ai;
pub mod appointments;
pub mod disease;
pub mod evaluation;
pub mod history;
pub mod memory;
pub mod records;
pub mod retrieval;
