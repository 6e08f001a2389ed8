use anyhow::Result;
use genui::{
    agent::Agent,
    data::DataCatalog,
    dcm::DcmDataset,
    providers::base::Provider,
};
use std::sync::Arc;

/// Shared application state
///
/// Both workflows share one provider. The datasets are built once and only read afterwards.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<Agent>,
    pub dcm: Arc<Agent>,
    pub dataset: Arc<DcmDataset>,
    pub password: Option<String>,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn Provider>,
        chat_steps: usize,
        dcm_steps: usize,
        password: Option<String>,
    ) -> Result<Self> {
        let dataset = Arc::new(DcmDataset::load());
        let chat = Agent::chat(
            Arc::clone(&provider),
            Arc::new(DataCatalog::demo()),
            chat_steps,
        )?;
        let dcm = Agent::dcm(provider, Arc::clone(&dataset), dcm_steps)?;

        Ok(Self {
            chat: Arc::new(chat),
            dcm: Arc::new(dcm),
            dataset,
            password,
        })
    }
}
