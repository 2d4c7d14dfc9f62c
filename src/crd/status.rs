//! # Function Status
//!
//! Observed state of a Function and condition bookkeeping.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::MAX_CONDITION_MESSAGE_LEN;

/// Status of the Function resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Runtime resolved for the last deployed revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_image: Option<String>,
    /// Replicas reported by the function Deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    /// Label selector of the function pods, `k=v` pairs joined with commas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_annotations: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Repository and commit of the last deployed git source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_repository: Option<GitRepositoryStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GitRepositoryStatus {
    pub url: String,
    #[serde(default)]
    pub base_dir: String,
    pub reference: String,
    pub commit: String,
}

/// Condition
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl FunctionStatus {
    /// Insert or replace the condition of the given type
    ///
    /// `lastTransitionTime` only moves when the status value changes.
    pub fn update_condition(&mut self, r#type: &str, status: &str, reason: &str, message: &str) {
        let message = truncate_message(message);
        if let Some(existing) = self.conditions.iter_mut().find(|c| c.r#type == r#type) {
            if existing.status != status {
                existing.status = status.to_string();
                existing.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
            }
            existing.reason = Some(reason.to_string());
            existing.message = Some(message);
            return;
        }

        self.conditions.push(Condition {
            r#type: r#type.to_string(),
            status: status.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message: Some(message),
        });
    }

    #[must_use]
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }

    /// Commit recorded for the git source, if any
    #[must_use]
    pub fn commit(&self) -> Option<&str> {
        self.git_repository.as_ref().map(|g| g.commit.as_str())
    }
}

fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_CONDITION_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_CONDITION_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
