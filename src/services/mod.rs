pub mod analysis;
pub mod charts;
pub mod cleaner;
pub mod dashboard;
pub mod dates;
pub mod excel;
pub mod inference;
pub mod insights;
pub mod llm_agent;
pub mod loader;
pub mod render;
pub mod summary;
