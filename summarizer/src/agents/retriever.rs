// Retriever Agent: cache-backed PubMed abstract lookup

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

/// Bounded, back-to-back retry: at most `max_attempts` requests, no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Clone)]
pub struct RetrieverAgent {
    efetch_url: String,
    cache_dir: PathBuf,
    retry: RetryPolicy,
    client: reqwest::Client,
    metrics: Arc<Metrics>,
}

impl RetrieverAgent {
    pub fn new(
        efetch_url: String,
        cache_dir: PathBuf,
        retry: RetryPolicy,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            efetch_url,
            cache_dir,
            retry,
            client,
            metrics,
        })
    }

    /// Returns the abstract for `pubmed_id` (e.g. `PMID:12345`), or `None` when
    /// no abstract could be obtained. Absence is never an error.
    pub async fn fetch(&self, pubmed_id: &str) -> Option<String> {
        self.fetch_with_retries(pubmed_id, self.retry).await
    }

    pub async fn fetch_with_retries(&self, pubmed_id: &str, retry: RetryPolicy) -> Option<String> {
        let Some(numeric_id) = cache_key(pubmed_id) else {
            warn!("Retriever: ignoring unusable publication id '{}'", pubmed_id);
            return None;
        };
        let cache_file = self.cache_dir.join(format!("{}.txt", numeric_id));

        match tokio::fs::read_to_string(&cache_file).await {
            Ok(abstract_text) if abstract_text.trim().is_empty() => {
                warn!("Retriever: empty cache file {}; refetching", cache_file.display());
            }
            Ok(abstract_text) => {
                debug!(pubmed_id, "Retriever: cache hit");
                self.metrics.cache_hits.inc();
                return Some(abstract_text);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Retriever: unreadable cache file {}: {}; refetching",
                cache_file.display(),
                e
            ),
        }
        self.metrics.cache_misses.inc();

        let abstract_text = match self.download(numeric_id, retry).await {
            Some(text) => text,
            None => {
                self.metrics.fetch_exhausted.inc();
                return None;
            }
        };

        if let Err(e) = self.store(&cache_file, &abstract_text).await {
            warn!(
                "Retriever: failed to cache abstract {}: {}",
                cache_file.display(),
                e
            );
        }

        Some(abstract_text)
    }

    async fn download(&self, numeric_id: &str, retry: RetryPolicy) -> Option<String> {
        for attempt in 1..=retry.max_attempts {
            match self.request(numeric_id).await {
                Ok(Some(text)) => {
                    info!("Retriever: fetched PMID {} on attempt {}", numeric_id, attempt);
                    return Some(text);
                }
                Ok(None) => warn!(
                    "Retriever: PMID {} attempt {}/{} returned no abstract",
                    numeric_id, attempt, retry.max_attempts
                ),
                Err(e) => warn!(
                    "Retriever: PMID {} attempt {}/{} failed: {}",
                    numeric_id, attempt, retry.max_attempts, e
                ),
            }
        }
        None
    }

    async fn request(&self, numeric_id: &str) -> anyhow::Result<Option<String>> {
        let response = self
            .client
            .get(&self.efetch_url)
            .query(&[
                ("db", "pubmed"),
                ("id", numeric_id),
                ("retmode", "xml"),
                ("rettype", "abstract"),
            ])
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::OK {
            anyhow::bail!("efetch returned {}", response.status());
        }

        let body = response.text().await?;
        Ok(parse_abstract(&body)?)
    }

    async fn store(&self, cache_file: &Path, abstract_text: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(cache_file, abstract_text).await
    }
}

/// `PMID:12345` -> `12345`. Anything that is not a plain alphanumeric token is
/// refused so it can never escape the cache directory.
fn cache_key(pubmed_id: &str) -> Option<&str> {
    let id = match pubmed_id.split_once(':') {
        Some((_, rest)) => rest,
        None => pubmed_id,
    }
    .trim();

    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(id)
}

/// Collects every `AbstractText` segment of an efetch payload, prefixing
/// labelled segments with their label.
pub fn parse_abstract(xml: &str) -> Result<Option<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut parts: Vec<String> = Vec::new();
    // (label, accumulated text, nesting depth inside the AbstractText element)
    let mut current: Option<(Option<String>, String, usize)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some((_, _, depth)) = current.as_mut() {
                    *depth += 1;
                } else if e.name().as_ref() == b"AbstractText" {
                    let label = match e.try_get_attribute("Label")? {
                        Some(attr) => Some(attr.unescape_value()?.into_owned()),
                        None => None,
                    };
                    current = Some((label, String::new(), 0));
                }
            }
            Event::End(_) => {
                if let Some((label, text, depth)) = current.take() {
                    if depth > 0 {
                        current = Some((label, text, depth - 1));
                    } else {
                        push_segment(&mut parts, label, &text);
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text, _)) = current.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, text, _)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let joined = parts.join(" ");
    let trimmed = joined.trim();
    Ok(if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    })
}

fn push_segment(parts: &mut Vec<String>, label: Option<String>, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match label.filter(|l| !l.is_empty()) {
        Some(label) => parts.push(format!("{}: {}", label, text)),
        None => parts.push(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const STRUCTURED_ABSTRACT: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <Article>
        <Abstract>
          <AbstractText Label="BACKGROUND">Headache is common.</AbstractText>
          <AbstractText Label="RESULTS">Aspirin reduced pain in <i>most</i> patients &amp; was safe.</AbstractText>
          <AbstractText>Unlabelled closing remark.</AbstractText>
          <AbstractText Label="EMPTY"></AbstractText>
        </Abstract>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    const NO_ABSTRACT: &str =
        "<PubmedArticleSet><PubmedArticle><MedlineCitation/></PubmedArticle></PubmedArticleSet>";

    fn retriever(url: String, cache_dir: PathBuf, attempts: u32) -> RetrieverAgent {
        RetrieverAgent::new(
            url,
            cache_dir,
            RetryPolicy::new(attempts),
            Duration::from_secs(5),
            Arc::new(Metrics::new().unwrap()),
        )
        .unwrap()
    }

    fn efetch_query(id: &str) -> Matcher {
        Matcher::AllOf(vec![
            Matcher::UrlEncoded("db".into(), "pubmed".into()),
            Matcher::UrlEncoded("id".into(), id.into()),
            Matcher::UrlEncoded("retmode".into(), "xml".into()),
            Matcher::UrlEncoded("rettype".into(), "abstract".into()),
        ])
    }

    #[test]
    fn parses_labelled_and_unlabelled_segments() {
        let text = parse_abstract(STRUCTURED_ABSTRACT).unwrap().unwrap();
        assert_eq!(
            text,
            "BACKGROUND: Headache is common. \
             RESULTS: Aspirin reduced pain in most patients & was safe. \
             Unlabelled closing remark."
        );
    }

    #[test]
    fn payload_without_abstract_parses_to_none() {
        assert_eq!(parse_abstract(NO_ABSTRACT).unwrap(), None);
    }

    #[test]
    fn cache_key_strips_namespace_and_refuses_paths() {
        assert_eq!(cache_key("PMID:12345"), Some("12345"));
        assert_eq!(cache_key("12345"), Some("12345"));
        assert_eq!(cache_key("PMID:"), None);
        assert_eq!(cache_key("PMID:../../etc/passwd"), None);
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(efetch_query("12345"))
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body(STRUCTURED_ABSTRACT)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("pubmed_abstracts");
        let agent = retriever(format!("{}/efetch.fcgi", server.url()), cache_dir.clone(), 3);

        let first = agent.fetch("PMID:12345").await.unwrap();
        let second = agent.fetch("PMID:12345").await.unwrap();

        assert_eq!(first, second);
        let on_disk = std::fs::read_to_string(cache_dir.join("12345.txt")).unwrap();
        assert_eq!(on_disk, first);
        assert_eq!(agent.metrics.cache_hits.get(), 1);
        assert_eq!(agent.metrics.cache_misses.get(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_cache_file_is_refetched() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(efetch_query("55"))
            .with_status(200)
            .with_body(STRUCTURED_ABSTRACT)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("55.txt"), "").unwrap();
        let agent = retriever(
            format!("{}/efetch.fcgi", server.url()),
            dir.path().to_path_buf(),
            3,
        );

        let text = agent.fetch("PMID:55").await.unwrap();

        assert!(text.starts_with("BACKGROUND: Headache is common."));
        assert_eq!(std::fs::read_to_string(dir.path().join("55.txt")).unwrap(), text);
        assert_eq!(agent.metrics.cache_hits.get(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn prepopulated_cache_never_hits_the_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .with_status(200)
            .expect(0)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("777.txt"), "Cached abstract body.").unwrap();
        let agent = retriever(server.url(), dir.path().to_path_buf(), 3);

        assert_eq!(
            agent.fetch("PMID:777").await.as_deref(),
            Some("Cached abstract body.")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_retries_yield_none() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let agent = retriever(format!("{}/efetch.fcgi", server.url()), dir.path().join("c"), 3);

        assert_eq!(agent.fetch("PMID:42").await, None);
        assert!(!dir.path().join("c").join("42.txt").exists());
        assert_eq!(agent.metrics.fetch_exhausted.get(), 1);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn empty_abstracts_are_retried_then_dropped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(NO_ABSTRACT)
            .expect(2)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let agent = retriever(format!("{}/efetch.fcgi", server.url()), dir.path().to_path_buf(), 2);

        assert_eq!(agent.fetch("PMID:9").await, None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn explicit_retry_policy_overrides_the_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::Any)
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let agent = retriever(format!("{}/efetch.fcgi", server.url()), dir.path().to_path_buf(), 5);

        assert_eq!(agent.fetch_with_retries("PMID:9", RetryPolicy::new(1)).await, None);
        mock.assert_async().await;
    }
}
