use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmParameters {
    #[serde(default = "default_model")]
    pub gpt_model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for LlmParameters {
    fn default() -> Self {
        Self {
            gpt_model: default_model(),
            temperature: Some(0.0),
            system_prompt: None,
        }
    }
}

impl LlmParameters {
    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(0.0)
    }

    /// A blank override counts as no override.
    pub fn system_prompt_override(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameters {
    #[serde(default)]
    pub llm: Option<LlmParameters>,
    #[serde(default)]
    pub summarize_abstracts: Option<bool>,
}

impl Parameters {
    pub fn llm(&self) -> LlmParameters {
        self.llm.clone().unwrap_or_default()
    }

    pub fn summarize_abstracts(&self) -> bool {
        self.summarize_abstracts.unwrap_or(false)
    }
}

// API Request models
#[derive(Debug, Deserialize)]
pub struct AbstractItem {
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    #[serde(default)]
    pub parameters: Parameters,
}

/// `edge` stays untyped here; it is validated into an [`crate::edge::Edge`]
/// by the handler so validation failures can be reported precisely.
#[derive(Debug, Deserialize)]
pub struct EdgeItem {
    #[serde(default)]
    pub edge: Option<Value>,
    #[serde(default)]
    pub parameters: Parameters,
}
