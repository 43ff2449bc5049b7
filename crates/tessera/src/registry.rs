//! Registry of language adapters.
//!
//! An [`AdapterRegistry`] is assembled once through [`AdapterRegistryBuilder`]
//! and is immutable afterward, so it can be shared freely between concurrent
//! extractions. A process-wide default holding the built-in adapters is
//! created lazily by [`AdapterRegistry::global`]; [`install_global`] replaces
//! that default, but only before anything has used it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{Error, Result};
use crate::languages::{JavaLanguage, LanguageSupport, PythonLanguage, RustLanguage};
use crate::types::Language;

static GLOBAL: OnceLock<Arc<AdapterRegistry>> = OnceLock::new();

/// Immutable mapping from language tag to adapter.
#[derive(Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<Language, Arc<dyn LanguageSupport>>,
}

impl AdapterRegistry {
    /// Start building a registry.
    #[must_use]
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder::default()
    }

    /// Registry with every built-in adapter.
    #[must_use]
    pub fn with_builtin() -> Self {
        Self::builder()
            .register(PythonLanguage)
            .register(RustLanguage)
            .register(JavaLanguage)
            .build()
    }

    /// The process-wide registry, initialized with the built-in adapters on
    /// first use unless [`install_global`] ran first.
    #[must_use]
    pub fn global() -> Arc<AdapterRegistry> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::with_builtin())))
    }

    /// Adapter for a language, if registered.
    #[must_use]
    pub fn get(&self, language: Language) -> Option<&Arc<dyn LanguageSupport>> {
        self.adapters.get(&language)
    }

    /// Returns `true` if an adapter is registered for the language.
    #[must_use]
    pub fn contains(&self, language: Language) -> bool {
        self.adapters.contains_key(&language)
    }

    /// Registered languages in a stable order.
    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.adapters.keys().copied()
    }

    /// Registered adapters in language order.
    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn LanguageSupport>> + '_ {
        self.adapters.values()
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns `true` if no adapter is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.adapters.keys()).finish()
    }
}

/// Builder for [`AdapterRegistry`].
#[derive(Default)]
pub struct AdapterRegistryBuilder {
    adapters: BTreeMap<Language, Arc<dyn LanguageSupport>>,
}

impl AdapterRegistryBuilder {
    /// Register an adapter. A later registration for the same language
    /// replaces the earlier one.
    #[must_use]
    pub fn register(self, adapter: impl LanguageSupport + 'static) -> Self {
        self.register_shared(Arc::new(adapter))
    }

    /// Register an adapter that is already shared.
    #[must_use]
    pub fn register_shared(mut self, adapter: Arc<dyn LanguageSupport>) -> Self {
        let language = adapter.language();
        if !language.is_known() {
            tracing::warn!("Ignoring adapter registered for the unknown language");
            return self;
        }
        if self.adapters.insert(language, adapter).is_some() {
            tracing::debug!(%language, "Replacing previously registered adapter");
        }
        self
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> AdapterRegistry {
        AdapterRegistry {
            adapters: self.adapters,
        }
    }
}

/// Install `registry` as the process-wide default.
///
/// # Errors
///
/// Returns `Error::Registry` if the global registry was already initialized,
/// either by an earlier call or by [`AdapterRegistry::global`].
pub fn install_global(registry: AdapterRegistry) -> Result<()> {
    GLOBAL.set(Arc::new(registry)).map_err(|_| {
        Error::Registry("global adapter registry is already initialized".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_every_supported_language() {
        let registry = AdapterRegistry::with_builtin();
        let languages: Vec<_> = registry.languages().collect();
        assert_eq!(languages, Language::SUPPORTED);
        assert_eq!(
            registry.get(Language::Rust).map(|a| a.extensions().to_vec()),
            Some(vec!["rs"])
        );
        assert!(!registry.contains(Language::Unknown));
    }

    #[test]
    fn later_registration_replaces_earlier() {
        let registry = AdapterRegistry::builder()
            .register(PythonLanguage)
            .register(PythonLanguage)
            .build();
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(Language::Python));
        assert!(!registry.contains(Language::Java));
    }

    #[test]
    fn empty_builder_builds_empty_registry() {
        let registry = AdapterRegistry::builder().build();
        assert!(registry.is_empty());
        assert_eq!(format!("{registry:?}"), "{}");
    }
}
