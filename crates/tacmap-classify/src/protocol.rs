//! Messages exchanged with the classification worker.
//!
//! Serialised form is adjacently tagged, e.g.
//! `{"type": "ANALYZE_IMAGE", "payload": {"imageData": {..}, "config": {..}}}`.

use crate::analysis::AnalysisResult;
use crate::image::ImageData;
use crate::rules::AnalysisConfig;
use serde::{Deserialize, Serialize};

/// Requests sent to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerRequest {
    /// Classify an image. The worker owns the buffer from here on.
    AnalyzeImage {
        #[serde(rename = "imageData")]
        image_data: ImageData,
        #[serde(default)]
        config: AnalysisConfig,
    },

    /// Stop the worker thread.
    Shutdown,
}

/// Responses sent back by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerResponse {
    /// Sent once, when the worker starts listening.
    WorkerReady,

    /// A request finished.
    AnalyzeComplete(Box<AnalysisResult>),

    /// A request failed; the worker keeps serving.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_shape() {
        let request = WorkerRequest::AnalyzeImage {
            image_data: ImageData::new(1, 1, vec![1, 2, 3, 4]).unwrap(),
            config: AnalysisConfig::default(),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["type"], "ANALYZE_IMAGE");
        assert_eq!(value["payload"]["imageData"]["width"], 1);
        assert_eq!(value["payload"]["config"]["stride"], 4);
    }

    #[test]
    fn test_request_config_defaults() {
        let value = json!({
            "type": "ANALYZE_IMAGE",
            "payload": {"imageData": {"width": 1, "height": 1, "data": [0, 0, 255, 255]}}
        });
        let request: WorkerRequest = serde_json::from_value(value).unwrap();
        match request {
            WorkerRequest::AnalyzeImage { config, .. } => {
                assert_eq!(config, AnalysisConfig::default())
            }
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn test_response_tags() {
        let ready = serde_json::to_value(WorkerResponse::WorkerReady).unwrap();
        assert_eq!(ready["type"], "WORKER_READY");

        let error = serde_json::to_value(WorkerResponse::Error {
            message: "boom".into(),
        })
        .unwrap();
        assert_eq!(error, json!({"type": "ERROR", "payload": {"message": "boom"}}));
    }
}
