//! Query result sequences

use crate::types::PointFeature;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Lazy, finite, single-pass sequence of query results.
///
/// Rows are decoded as they are pulled, so a decoding failure surfaces as an
/// `Err` item at that position rather than failing the whole query.
pub struct FeatureStream<T> {
    inner: Box<dyn Iterator<Item = Result<T>> + Send>,
}

impl<T> FeatureStream<T> {
    pub(crate) fn new<I>(iter: I) -> Self
    where
        I: Iterator<Item = Result<T>> + Send + 'static,
    {
        Self {
            inner: Box::new(iter),
        }
    }

    /// Drain the stream, stopping at the first error
    pub fn try_collect(self) -> Result<Vec<T>> {
        self.collect()
    }
}

impl<T> Iterator for FeatureStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> std::fmt::Debug for FeatureStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStream")
            .field("size_hint", &self.inner.size_hint())
            .finish()
    }
}

/// A radius-search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nearby {
    #[serde(flatten)]
    pub feature: PointFeature,
    pub distance_km: f64,
}
