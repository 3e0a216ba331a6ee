// Edge: a knowledge-graph triple plus the evidence that supports it

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeError {
    #[error("edge field '{0}' must be a non-empty string")]
    MissingField(&'static str),

    #[error("publication identifier at position {0} is empty")]
    EmptyPublication(usize),

    #[error("invalid edge: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Wire shape accepted from clients, before validation.
#[derive(Debug, Deserialize)]
struct RawEdge {
    #[serde(default)]
    subject: String,
    #[serde(default, alias = "relation")]
    predicate: String,
    #[serde(default)]
    object: String,
    #[serde(default, alias = "subject_label")]
    subject_name: Option<String>,
    #[serde(default, alias = "object_label")]
    object_name: Option<String>,
    #[serde(default)]
    publications: Vec<String>,
    #[serde(default)]
    sentences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEdge")]
pub struct Edge {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_name: Option<String>,
    pub publications: Vec<String>,
    pub sentences: Vec<String>,
}

impl TryFrom<RawEdge> for Edge {
    type Error = EdgeError;

    fn try_from(raw: RawEdge) -> Result<Self, Self::Error> {
        let subject = required("subject", raw.subject)?;
        let predicate = required("predicate", raw.predicate)?;
        let object = required("object", raw.object)?;

        let publications = raw
            .publications
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let id = id.trim().to_string();
                if id.is_empty() {
                    Err(EdgeError::EmptyPublication(i))
                } else {
                    Ok(id)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Edge {
            subject,
            predicate,
            object,
            subject_name: label(raw.subject_name),
            object_name: label(raw.object_name),
            publications,
            sentences: raw.sentences,
        })
    }
}

fn required(field: &'static str, value: String) -> Result<String, EdgeError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EdgeError::MissingField(field));
    }
    Ok(value.to_string())
}

fn label(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Edge {
    #[cfg(test)]
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            subject_name: None,
            object_name: None,
            publications: Vec::new(),
            sentences: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn with_publications(mut self, publications: Vec<String>) -> Self {
        self.publications = publications;
        self
    }

    #[cfg(test)]
    pub fn with_sentences(mut self, sentences: Vec<String>) -> Self {
        self.sentences = sentences;
        self
    }

    /// Interprets a request's `edge` field. `null` and `{}` mean "no edge".
    pub fn from_request_value(value: Option<Value>) -> Result<Option<Edge>, EdgeError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(map)) if map.is_empty() => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    pub fn has_evidence(&self) -> bool {
        !self.publications.is_empty() || !self.sentences.is_empty()
    }

    /// Renders the relationship as a single declarative sentence,
    /// e.g. `aspirin treats headache`.
    pub fn format_sentence(&self) -> String {
        let subject = self.subject_name.as_deref().unwrap_or(&self.subject);
        let object = self.object_name.as_deref().unwrap_or(&self.object);
        format!("{} {} {}", subject, humanize_predicate(&self.predicate), object)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} publications, {} sentences)",
            self.format_sentence(),
            self.publications.len(),
            self.sentences.len()
        )
    }
}

/// `biolink:positively_regulates` -> `positively regulates`
fn humanize_predicate(predicate: &str) -> String {
    let local = match predicate.split_once(':') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => predicate,
    };
    local.replace('_', " ")
}
