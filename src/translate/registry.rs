use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info};

use super::{ModelLoader, ModelPair};
use crate::config::{ModelSource, TranslateConfig};
use crate::error::{FilmceptionError, Result};
use crate::language::LanguageCode;

type Slot = Arc<OnceCell<Arc<ModelPair>>>;

/// Process-lifetime cache of translation models, one slot per language.
///
/// The first `get` for a language loads its pair; concurrent callers for the
/// same language wait on that load instead of starting their own. A failed
/// load leaves the slot empty so a later call can try again. Entries are
/// never evicted.
pub struct TranslationModelRegistry {
    loader: Box<dyn ModelLoader>,
    sources: HashMap<LanguageCode, ModelSource>,
    slots: Mutex<HashMap<LanguageCode, Slot>>,
}

impl TranslationModelRegistry {
    pub fn new(loader: Box<dyn ModelLoader>, sources: HashMap<LanguageCode, ModelSource>) -> Self {
        Self {
            loader,
            sources,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(loader: Box<dyn ModelLoader>, config: &TranslateConfig) -> Result<Self> {
        Ok(Self::new(loader, config.model_sources()?))
    }

    /// Pair for a language code string. Unknown codes fail before any load.
    pub fn get(&self, code: &str) -> Result<Arc<ModelPair>> {
        self.get_code(LanguageCode::from_str(code)?)
    }

    pub fn get_code(&self, code: LanguageCode) -> Result<Arc<ModelPair>> {
        let source = self
            .sources
            .get(&code)
            .ok_or_else(|| FilmceptionError::UnsupportedLanguage(code.to_string()))?;

        let slot = {
            // the map only ever grows, so a poisoned guard still holds a usable map
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(code).or_default())
        };

        let pair = slot.get_or_try_init(|| {
            info!("Loading translation model for '{}' from {}", code, source.repo);
            let started = Instant::now();
            let pair = self.loader.load(code, source)?;
            info!("Loaded translation model for '{}' in {:.1?}", code, started.elapsed());
            Ok::<_, FilmceptionError>(Arc::new(pair))
        })?;

        debug!("Translation model for '{}' served from cache", code);
        Ok(Arc::clone(pair))
    }

    pub fn is_loaded(&self, code: LanguageCode) -> bool {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&code)
            .map_or(false, |slot| slot.get().is_some())
    }

    /// Supported languages and where their models come from, sorted alphabetically by code
    pub fn sources(&self) -> Vec<(LanguageCode, &ModelSource)> {
        let mut sources: Vec<_> = self.sources.iter().map(|(code, source)| (*code, source)).collect();
        sources.sort_by_key(|(code, _)| code.as_str());
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{stub_pair, CountingLoader};
    use crate::translate::MockModelLoader;
    use std::sync::atomic::Ordering;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn default_sources() -> HashMap<LanguageCode, ModelSource> {
        TranslateConfig::default().model_sources().unwrap()
    }

    #[test]
    fn test_second_get_returns_cached_pair() {
        let mut loader = MockModelLoader::new();
        loader
            .expect_load()
            .withf(|code, source| *code == LanguageCode::Ur && source.repo == "Helsinki-NLP/opus-mt-en-ur")
            .times(1)
            .returning(|code, _| Ok(stub_pair(code)));

        let registry = TranslationModelRegistry::new(Box::new(loader), default_sources());
        assert!(!registry.is_loaded(LanguageCode::Ur));

        let first = registry.get("ur").unwrap();
        let second = registry.get("ur").unwrap();
        let third = registry.get_code(LanguageCode::Ur).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &third));
        assert!(registry.is_loaded(LanguageCode::Ur));
        assert!(!registry.is_loaded(LanguageCode::Ar));
    }

    #[test]
    fn test_each_language_loads_once() {
        let loader = CountingLoader::default();
        let loads = Arc::clone(&loader.loads);
        let registry = TranslationModelRegistry::new(Box::new(loader), default_sources());

        for _ in 0..3 {
            for code in ["ur", "ar", "ko"] {
                registry.get(code).unwrap();
            }
        }

        assert_eq!(loads.load(Ordering::SeqCst), 3);
        let ur = registry.get("ur").unwrap();
        let ar = registry.get("ar").unwrap();
        assert!(!Arc::ptr_eq(&ur, &ar));
    }

    #[test]
    fn test_unsupported_language_never_loads() {
        let mut loader = MockModelLoader::new();
        loader.expect_load().never();

        let registry = TranslationModelRegistry::new(Box::new(loader), default_sources());

        for code in ["zz", "en", ""] {
            let result = registry.get(code);
            assert!(matches!(result, Err(FilmceptionError::UnsupportedLanguage(_))));
        }
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let mut loader = MockModelLoader::new();
        let mut seq = mockall::Sequence::new();
        loader
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(FilmceptionError::Load("weights missing".to_string())));
        loader
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|code, _| Ok(stub_pair(code)));

        let registry = TranslationModelRegistry::new(Box::new(loader), default_sources());

        assert!(matches!(registry.get("ko"), Err(FilmceptionError::Load(_))));
        assert!(!registry.is_loaded(LanguageCode::Ko));
        assert!(registry.get("ko").is_ok());
        assert!(registry.is_loaded(LanguageCode::Ko));
    }

    #[test]
    fn test_concurrent_requests_share_one_load() {
        let loader = CountingLoader::with_delay(Duration::from_millis(50));
        let loads = Arc::clone(&loader.loads);
        let registry = Arc::new(TranslationModelRegistry::new(Box::new(loader), default_sources()));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    registry.get("ar").unwrap()
                })
            })
            .collect();

        let pairs: Vec<Arc<ModelPair>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        for pair in &pairs[1..] {
            assert!(Arc::ptr_eq(&pairs[0], pair));
        }
    }

    #[test]
    fn test_sources_are_sorted() {
        let registry =
            TranslationModelRegistry::new(Box::new(CountingLoader::default()), default_sources());
        let codes: Vec<LanguageCode> = registry.sources().into_iter().map(|(code, _)| code).collect();
        assert_eq!(codes, vec![LanguageCode::Ar, LanguageCode::Ko, LanguageCode::Ur]);
    }
}
