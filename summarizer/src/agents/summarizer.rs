// Summarizer Agent: turns edges and abstracts into LLM summaries

use std::sync::Arc;

use tracing::{info, warn};

use crate::agents::retriever::RetrieverAgent;
use crate::edge::Edge;
use crate::error::ApiError;
use crate::llm::{GenerationError, LlmClient};
use crate::metrics::Metrics;
use crate::models::{LlmParameters, Parameters};
use crate::normalizer::NodeNormalizer;
use crate::prompts;
use crate::transcript::Transcript;

pub struct SummarizerAgent {
    llm: Arc<dyn LlmClient>,
    retriever: RetrieverAgent,
    normalizer: Option<NodeNormalizer>,
    transcript: Transcript,
    metrics: Arc<Metrics>,
}

impl SummarizerAgent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        retriever: RetrieverAgent,
        transcript: Transcript,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            llm,
            retriever,
            normalizer: None,
            transcript,
            metrics,
        }
    }

    /// Resolve missing subject/object labels through the node normalizer
    /// before formatting.
    pub fn with_normalizer(mut self, normalizer: NodeNormalizer) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    async fn generate(
        &self,
        system_prompt: &str,
        user_content: &str,
        params: &LlmParameters,
    ) -> Result<String, GenerationError> {
        let result = self
            .llm
            .generate(system_prompt, user_content, &params.gpt_model, params.temperature())
            .await;

        let outcome = if result.is_ok() { "success" } else { "failure" };
        self.metrics.llm_requests.with_label_values(&[outcome]).inc();
        result
    }

    /// Condenses a single abstract to one sentence.
    pub async fn summarize_abstract(
        &self,
        abstract_text: &str,
        params: &LlmParameters,
    ) -> Result<String, GenerationError> {
        info!("Summarizer: condensing abstract ({} chars)", abstract_text.len());
        self.generate(prompts::ABSTRACT_SYSTEM_PROMPT, abstract_text, params)
            .await
    }

    /// Gathers every available abstract and inline sentence for `edge`, one
    /// entry per line. With `condense` set, each abstract is first reduced to
    /// a single sentence by the LLM. Returns an empty string when no evidence
    /// could be gathered.
    pub async fn aggregate_supporting_text(
        &self,
        edge: &Edge,
        condense: Option<&LlmParameters>,
    ) -> Result<String, GenerationError> {
        let mut entries = Vec::with_capacity(edge.publications.len() + edge.sentences.len());

        for pubmed_id in &edge.publications {
            let Some(abstract_text) = self.retriever.fetch(pubmed_id).await else {
                info!("Summarizer: no abstract available for {}", pubmed_id);
                continue;
            };

            let abstract_text = match condense {
                Some(params) => self.summarize_abstract(&abstract_text, params).await?,
                None => abstract_text,
            };
            entries.push(format!("{}: {}", pubmed_id, abstract_text));
        }

        entries.extend(
            edge.sentences
                .iter()
                .filter(|sentence| !sentence.trim().is_empty())
                .cloned(),
        );
        Ok(entries.join("\n"))
    }

    /// Fills in missing display labels from the node normalizer. An
    /// unreachable normalizer leaves the raw identifiers in place.
    async fn resolve_labels(&self, edge: &mut Edge) -> Result<(), ApiError> {
        let Some(normalizer) = &self.normalizer else {
            return Ok(());
        };
        if edge.subject_name.is_some() && edge.object_name.is_some() {
            return Ok(());
        }

        let curies = vec![edge.subject.clone(), edge.object.clone()];
        let Some(nodes) = normalizer.normalize(&curies).await? else {
            warn!("Summarizer: node normalizer unreachable, using raw identifiers");
            return Ok(());
        };

        let label_for = |curie: &str| {
            nodes
                .get(curie)
                .map(|node| node.label.clone())
                .filter(|label| !label.is_empty())
        };
        if edge.subject_name.is_none() {
            edge.subject_name = label_for(&edge.subject);
        }
        if edge.object_name.is_none() {
            edge.object_name = label_for(&edge.object);
        }
        Ok(())
    }

    pub async fn summarize_edge(&self, mut edge: Edge, params: &Parameters) -> Result<String, ApiError> {
        let llm_params = params.llm();

        self.resolve_labels(&mut edge).await?;
        info!("Summarizer: edge {}", edge);
        self.transcript.record(&format!("Edge: {:?}", edge)).await;

        let condense = params.summarize_abstracts().then_some(&llm_params);
        let evidence = self.aggregate_supporting_text(&edge, condense).await?;
        if condense.is_some() {
            self.transcript
                .record(&format!("Edge with summarized abstracts: {}", evidence))
                .await;
        }
        let sentence = edge.format_sentence();

        if evidence.is_empty() {
            if edge.has_evidence() {
                warn!("Summarizer: none of the evidence for {} could be retrieved", edge);
            }
            info!("Edge contained no publications or sentences. Returning with standardized summary.");
            self.transcript
                .record("Edge contained no publications or sentences. Returning with standardized summary.")
                .await;
            self.metrics.summaries.with_label_values(&["no_evidence"]).inc();
            return Ok(prompts::no_evidence_message(&sentence));
        }

        let system_prompt = match llm_params.system_prompt_override() {
            Some(prompt) => prompt.to_string(),
            None => prompts::edge_system_prompt(&sentence),
        };
        let user_content = prompts::edge_user_content(&sentence, &evidence);

        info!(
            model = %llm_params.gpt_model,
            temperature = llm_params.temperature(),
            "Summarizer: prompt: {}",
            system_prompt
        );
        self.transcript.record(&format!("GPT Prompt: {}", system_prompt)).await;
        self.transcript.record(&format!("GPT Model: {}", llm_params.gpt_model)).await;
        self.transcript
            .record(&format!("GPT Temperature: {}", llm_params.temperature()))
            .await;

        let summary = self.generate(&system_prompt, &user_content, &llm_params).await?;

        self.transcript.record(&format!("Edge Summary: {}", summary)).await;
        self.metrics.summaries.with_label_values(&["edge"]).inc();
        Ok(summary)
    }
}
