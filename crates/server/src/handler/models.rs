use axum::Json;
use axum::response::IntoResponse;
use grok_bridge_core::types::openai::{ModelListResponse, ModelObject};

pub const MODEL_IDS: [&str; 3] = ["grok-3", "grok-3t", "grok-3ds"];
const MODEL_CREATED: i64 = 1_145_141_919;
const MODEL_OWNER: &str = "yilongma";

pub fn model_list() -> ModelListResponse {
    ModelListResponse {
        object: "list".to_string(),
        data: MODEL_IDS
            .iter()
            .map(|id| ModelObject {
                id: id.to_string(),
                object: "model".to_string(),
                created: MODEL_CREATED,
                owned_by: MODEL_OWNER.to_string(),
            })
            .collect(),
    }
}

pub async fn list_models() -> impl IntoResponse {
    Json(model_list())
}
