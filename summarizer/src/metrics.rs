use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Process-wide counters, registered on a registry owned by the service
/// rather than the prometheus default.
pub struct Metrics {
    registry: Registry,
    pub cache_hits: IntCounter,
    pub cache_misses: IntCounter,
    pub fetch_exhausted: IntCounter,
    pub llm_requests: IntCounterVec,
    pub summaries: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("kg_summarizer".to_string()), None)?;

        let cache_hits = IntCounter::new(
            "pubmed_cache_hits_total",
            "PubMed abstracts served from the disk cache",
        )?;
        let cache_misses = IntCounter::new(
            "pubmed_cache_misses_total",
            "PubMed abstracts that required a network fetch",
        )?;
        let fetch_exhausted = IntCounter::new(
            "pubmed_fetch_exhausted_total",
            "PubMed fetches that ran out of attempts without an abstract",
        )?;
        let llm_requests = IntCounterVec::new(
            Opts::new("llm_requests_total", "Completion requests by outcome"),
            &["outcome"],
        )?;
        let summaries = IntCounterVec::new(
            Opts::new("summaries_total", "Summaries produced by endpoint"),
            &["endpoint"],
        )?;

        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(fetch_exhausted.clone()))?;
        registry.register(Box::new(llm_requests.clone()))?;
        registry.register(Box::new(summaries.clone()))?;

        Ok(Self {
            registry,
            cache_hits,
            cache_misses,
            fetch_exhausted,
            llm_requests,
            summaries,
        })
    }

    pub fn encode(&self) -> Result<(Vec<u8>, String), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = vec![];
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok((buffer, encoder.format_type().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_the_exposition() {
        let metrics = Metrics::new().unwrap();
        metrics.cache_hits.inc();
        metrics.summaries.with_label_values(&["edge"]).inc();

        let (body, content_type) = metrics.encode().unwrap();
        let text = String::from_utf8(body).unwrap();

        assert!(content_type.starts_with("text/plain"));
        assert!(text.contains("kg_summarizer_pubmed_cache_hits_total 1"));
        assert!(text.contains("kg_summarizer_summaries_total{endpoint=\"edge\"} 1"));
    }
}
