use serde::{Deserialize, Serialize};

/// Response summarization options forwarded to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizationOptions {
    pub enable: bool,
    pub model: String,
}

impl SummarizationOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            enable: true,
            model: model.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub vertical_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarization: Option<SummarizationOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePlanRequest {
    pub query: String,
    pub vertical_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunPlanRequest {
    pub plan_id: String,
    pub summarization: SummarizationOptions,
}
