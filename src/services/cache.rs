use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::{BatchTranslation, Translate, TranslateFuture};

/// Memoizes translations per service, language and exact batch contents.
/// Cached batches report zero tokens.
#[derive(Debug)]
pub struct CachedTranslator<T> {
    inner: T,
    service: String,
    entries: Mutex<HashMap<String, Vec<String>>>,
}

impl<T> CachedTranslator<T> {
    pub fn new(inner: T, service: impl Into<String>) -> Self {
        Self {
            inner,
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(&self, texts: &[String], target_language: &str) -> Result<String> {
        let texts = serde_json::to_string(texts)?;
        Ok(format!("{}-{}-{}", self.service, target_language, texts))
    }

    fn lookup(&self, key: &str) -> Result<Option<Vec<String>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("translation cache lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: String, translations: Vec<String>) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("translation cache lock poisoned"))?;
        entries.insert(key, translations);
        Ok(())
    }
}

impl<T: Translate + Sync> Translate for CachedTranslator<T> {
    fn translate<'a>(
        &'a self,
        texts: &'a [String],
        target_language: &'a str,
        context: &'a str,
    ) -> TranslateFuture<'a> {
        Box::pin(async move {
            let key = self.key(texts, target_language)?;
            if let Some(translations) = self.lookup(&key)? {
                debug!("translation cache hit for {} texts", texts.len());
                return Ok(BatchTranslation {
                    translations,
                    tokens: 0,
                });
            }
            let result = self
                .inner
                .translate(texts, target_language, context)
                .await?;
            self.store(key, result.translations.clone())?;
            Ok(result)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    impl Translate for Counting {
        fn translate<'a>(
            &'a self,
            texts: &'a [String],
            target_language: &'a str,
            _context: &'a str,
        ) -> TranslateFuture<'a> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(BatchTranslation {
                    translations: texts
                        .iter()
                        .map(|text| format!("[{}] {}", target_language, text))
                        .collect(),
                    tokens: 10,
                })
            })
        }
    }

    #[tokio::test]
    async fn repeated_batch_is_served_from_cache() {
        let cache = CachedTranslator::new(
            Counting {
                calls: AtomicUsize::new(0),
            },
            "openai",
        );
        let texts = vec!["Hello".to_string(), "World".to_string()];

        let first = cache.translate(&texts, "fr", "Page").await.unwrap();
        let second = cache.translate(&texts, "fr", "Other page").await.unwrap();
        assert_eq!(first.tokens, 10);
        assert_eq!(second.tokens, 0);
        assert_eq!(first.translations, second.translations);
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 1);

        cache.translate(&texts, "de", "Page").await.unwrap();
        assert_eq!(cache.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }
}
