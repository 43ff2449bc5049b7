//! Language classification.
//!
//! Maps a source identifier to a [`Language`] using, in order of precedence:
//!
//! 1. an explicit hint (`"python"`, `"rs"`, ...)
//! 2. the identifier's file extension
//! 3. a `#!` line at the start of the content
//!
//! Classification is a pure function of its inputs and of the registry
//! snapshot the classifier was built from. Languages that are recognized but
//! not registered or not enabled classify as [`Language::Unknown`].

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::registry::AdapterRegistry;
use crate::types::Language;

/// Classifier bound to one registry snapshot and language selection.
#[derive(Debug, Clone)]
pub struct Classifier {
    extensions: HashMap<String, Language>,
    enabled: BTreeSet<Language>,
}

impl Classifier {
    /// Build a classifier for the adapters in `registry` that are also in
    /// `supported`.
    #[must_use]
    pub fn new(registry: &AdapterRegistry, supported: &BTreeSet<Language>) -> Self {
        let enabled: BTreeSet<Language> = registry
            .languages()
            .filter(|language| supported.contains(language))
            .collect();

        let mut extensions = HashMap::new();
        for adapter in registry.adapters() {
            let language = adapter.language();
            if !enabled.contains(&language) {
                continue;
            }
            for ext in adapter.extensions() {
                extensions.insert(ext.to_lowercase(), language);
            }
        }

        Self {
            extensions,
            enabled,
        }
    }

    /// Languages this classifier can return besides `Unknown`.
    pub fn enabled(&self) -> impl Iterator<Item = Language> + '_ {
        self.enabled.iter().copied()
    }

    fn enabled_or_unknown(&self, language: Option<Language>) -> Language {
        language
            .filter(|language| self.enabled.contains(language))
            .unwrap_or(Language::Unknown)
    }

    /// Classify a source.
    ///
    /// An explicit, non-blank hint is authoritative: an unrecognized or
    /// disabled hint yields `Unknown` without consulting the identifier.
    #[must_use]
    pub fn classify(&self, id: &str, hint: Option<&str>, prefix: Option<&str>) -> Language {
        if let Some(hint) = hint.map(str::trim).filter(|hint| !hint.is_empty()) {
            let language = Language::from_hint(hint)
                .or_else(|| self.extensions.get(&hint.to_lowercase()).copied());
            return self.enabled_or_unknown(language);
        }

        if let Some(ext) = extension(id) {
            let ext = ext.to_lowercase();
            if let Some(language) = self.extensions.get(&ext) {
                return *language;
            }
            if let Some(language) = Language::from_extension(&ext) {
                return self.enabled_or_unknown(Some(language));
            }
        }

        let shebang = prefix
            .and_then(|prefix| prefix.lines().next())
            .and_then(Language::from_shebang);
        self.enabled_or_unknown(shebang)
    }

    /// Short explanation of why `id` classified as `Unknown`.
    #[must_use]
    pub fn explain_unknown(id: &str, hint: Option<&str>) -> String {
        match (hint.map(str::trim).filter(|h| !h.is_empty()), extension(id)) {
            (Some(hint), _) => format!("language hint '{hint}'"),
            (None, Some(ext)) => format!("extension '.{ext}'"),
            (None, None) => "no extension or interpreter line".to_string(),
        }
    }
}

fn extension(id: &str) -> Option<&str> {
    Path::new(id).extension().and_then(|ext| ext.to_str())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn classifier(supported: &[Language]) -> Classifier {
        Classifier::new(
            &AdapterRegistry::with_builtin(),
            &supported.iter().copied().collect(),
        )
    }

    #[rstest]
    #[case("src/app.py", None, None, Language::Python)]
    #[case("stubs/app.PYI", None, None, Language::Python)]
    #[case("src/lib.rs", None, None, Language::Rust)]
    #[case("Main.java", None, None, Language::Java)]
    #[case("notes.txt", None, None, Language::Unknown)]
    #[case("notes.txt", Some("python"), None, Language::Python)]
    #[case("lib.rs", Some("java"), None, Language::Java)]
    #[case("lib.rs", Some("cobol"), None, Language::Unknown)]
    #[case("lib.rs", Some("  "), None, Language::Rust)]
    #[case("bin/tool", None, Some("#!/usr/bin/env python3\nprint()"), Language::Python)]
    #[case("bin/tool", None, Some("#!/bin/bash\necho"), Language::Unknown)]
    #[case("bin/tool", None, None, Language::Unknown)]
    fn classification_precedence(
        #[case] id: &str,
        #[case] hint: Option<&str>,
        #[case] prefix: Option<&str>,
        #[case] expected: Language,
    ) {
        let classifier = classifier(&Language::SUPPORTED);
        assert_eq!(classifier.classify(id, hint, prefix), expected);
    }

    #[test]
    fn disabled_languages_are_unknown() {
        let classifier = classifier(&[Language::Rust]);
        assert_eq!(classifier.classify("a.py", None, None), Language::Unknown);
        assert_eq!(classifier.classify("a", Some("python"), None), Language::Unknown);
        assert_eq!(classifier.classify("a.rs", None, None), Language::Rust);
        assert_eq!(classifier.enabled().collect::<Vec<_>>(), [Language::Rust]);
    }

    #[test]
    fn unregistered_languages_are_unknown() {
        let registry = AdapterRegistry::builder()
            .register(crate::languages::JavaLanguage)
            .build();
        let classifier = Classifier::new(&registry, &Language::SUPPORTED.into_iter().collect());
        assert_eq!(classifier.classify("a.py", None, None), Language::Unknown);
        assert_eq!(classifier.classify("A.java", None, None), Language::Java);
    }

    #[test]
    fn explanations_name_the_deciding_input() {
        assert_eq!(
            Classifier::explain_unknown("a.kt", Some("kotlin")),
            "language hint 'kotlin'"
        );
        assert_eq!(Classifier::explain_unknown("a.kt", None), "extension '.kt'");
        assert_eq!(
            Classifier::explain_unknown("Makefile", None),
            "no extension or interpreter line"
        );
    }
}
