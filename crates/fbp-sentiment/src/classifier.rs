use async_trait::async_trait;

use crate::error::SentimentError;
use crate::types::Polarity;

/// A sentiment scoring strategy.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn classify(&self, text: &str) -> Result<Polarity, SentimentError>;

    /// Classify many texts, one result per input in input order.
    ///
    /// The default runs [`Self::classify`] sequentially; backends with a
    /// batch endpoint override it.
    async fn classify_batch(&self, texts: &[&str]) -> Vec<Result<Polarity, SentimentError>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.classify(text).await);
        }
        results
    }
}
