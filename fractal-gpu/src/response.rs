//! Serialized shapes handed to callers of the engine.

use serde::Serialize;

/// Result of one `generate` request as seen by an external caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GenerateResponse {
    Success(SuccessResponse),
    Failure(FailureResponse),
}

impl GenerateResponse {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn max_iterations(&self) -> u32 {
        match self {
            Self::Success(s) => s.max_iterations,
            Self::Failure(f) => f.max_iterations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse {
    pub max_iterations: u32,
    pub data: Vec<u32>,
    pub compute_time_ms: u64,
    pub accelerator_type: String,
    pub accelerator_name: String,
    pub view_min_real: f64,
    pub view_max_real: f64,
    pub view_min_imaginary: f64,
    pub view_max_imaginary: f64,
    pub center_real: f64,
    pub center_imaginary: f64,
    pub zoom: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResponse {
    pub error: String,
    pub max_iterations: u32,
}

/// Accelerator status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_group_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiprocessor_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_serializes_flat() {
        let response = GenerateResponse::Failure(FailureResponse {
            error: "no device".to_string(),
            max_iterations: 100,
        });
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({ "error": "no device", "maxIterations": 100 })
        );
    }

    #[test]
    fn device_info_omits_missing_capabilities() {
        let info = DeviceInfo {
            available: true,
            name: Some("GPU".to_string()),
            device_type: Some("Vulkan".to_string()),
            max_threads: None,
            max_group_size: Some(256),
            warp_size: None,
            multiprocessor_count: None,
            error: None,
            status_message: "ready".to_string(),
        };
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["type"], "Vulkan");
        assert_eq!(value["maxGroupSize"], 256);
        assert_eq!(value["statusMessage"], "ready");
        assert!(value.get("warpSize").is_none());
        assert!(value.get("error").is_none());
    }
}
