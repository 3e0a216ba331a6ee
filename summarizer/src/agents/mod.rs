pub mod retriever;
pub mod summarizer;

pub use retriever::{RetrieverAgent, RetryPolicy};
pub use summarizer::SummarizerAgent;
