//! Font registry and per-family template settings.
//!
//! Templates register their typography here so the pipeline never needs to
//! know which template it is rendering. An unknown template id is not an
//! error: the document simply keeps its default fonts.

use std::collections::HashMap;

// ────────────────────────────────────────────────────────────────────────────
// Font profiles
// ────────────────────────────────────────────────────────────────────────────

/// The stylesheet that loads a template's web font, plus the CSS
/// `font-family` value forced onto every element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontProfile {
    pub stylesheet_tag: String,
    pub font_family: String,
}

impl FontProfile {
    /// Profile backed by a Google Fonts stylesheet.
    ///
    /// `family` is the Google Fonts family name (spaces allowed), `weights` a
    /// `;`-separated weight axis list, `fallback` the generic CSS family.
    pub fn google(family: &str, weights: &str, fallback: &str) -> Self {
        let query = family.replace(' ', "+");
        Self {
            stylesheet_tag: format!(
                r#"<link rel="stylesheet" href="https://fonts.googleapis.com/css2?family={query}:wght@{weights}&display=swap">"#
            ),
            font_family: format!("'{family}', {fallback}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FontRegistry {
    profiles: HashMap<String, FontProfile>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, template_id: impl Into<String>, profile: FontProfile) -> Self {
        self.profiles.insert(template_id.into(), profile);
        self
    }

    pub fn resolve(&self, template_id: &str) -> Option<&FontProfile> {
        self.profiles.get(template_id)
    }

    /// Typography for the resume template catalog. `classic` is deliberately
    /// absent: it renders with the browser's default serif stack.
    pub fn resume_templates() -> Self {
        Self::new()
            .register("aether", FontProfile::google("Inter", "400;500;600;700", "sans-serif"))
            .register("meridian", FontProfile::google("EB Garamond", "400;500;600;700", "serif"))
            .register("atlas", FontProfile::google("Lato", "300;400;700", "sans-serif"))
            .register("zenith", FontProfile::google("Oswald", "400;500;600", "sans-serif"))
            .register("horizon", FontProfile::google("Source Serif 4", "400;600;700", "serif"))
    }

    pub fn cover_letter_templates() -> Self {
        Self::new()
            .register("aether", FontProfile::google("Inter", "400;500;600;700", "sans-serif"))
            .register("meridian", FontProfile::google("EB Garamond", "400;500;600;700", "serif"))
            .register("atlas", FontProfile::google("Lato", "300;400;700", "sans-serif"))
            .register("ledger", FontProfile::google("Merriweather", "300;400;700", "serif"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Document families
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

impl DocumentKind {
    /// Used in filenames and log fields.
    pub fn slug(self) -> &'static str {
        match self {
            DocumentKind::Resume => "resume",
            DocumentKind::CoverLetter => "cover-letter",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// Everything that differs between rendering a resume and a cover letter.
#[derive(Debug, Clone)]
pub struct DocumentFamily {
    kind: DocumentKind,
    fonts: FontRegistry,
    /// Extra inches appended below the measured content, per template id.
    trailing_buffers: HashMap<String, f64>,
}

impl DocumentFamily {
    pub fn new(kind: DocumentKind, fonts: FontRegistry) -> Self {
        Self {
            kind,
            fonts,
            trailing_buffers: HashMap::new(),
        }
    }

    pub fn resumes() -> Self {
        Self::new(DocumentKind::Resume, FontRegistry::resume_templates())
    }

    pub fn cover_letters() -> Self {
        Self::new(DocumentKind::CoverLetter, FontRegistry::cover_letter_templates())
    }

    pub fn with_trailing_buffers(mut self, buffers: HashMap<String, f64>) -> Self {
        self.trailing_buffers = buffers;
        self
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn trailing_buffer_in(&self, template_id: &str) -> f64 {
        self.trailing_buffers
            .get(template_id)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_template() {
        let registry = FontRegistry::resume_templates();
        let profile = registry.resolve("aether").expect("aether is registered");
        assert_eq!(profile.font_family, "'Inter', sans-serif");
        assert!(profile
            .stylesheet_tag
            .contains("fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700"));
    }

    #[test]
    fn test_unknown_template_resolves_to_none() {
        let registry = FontRegistry::resume_templates();
        assert!(registry.resolve("nonexistent-template").is_none());
        assert!(registry.resolve("classic").is_none());
        assert!(registry.resolve("").is_none());
    }

    #[test]
    fn test_multi_word_family_is_url_encoded() {
        let profile = FontProfile::google("EB Garamond", "400", "serif");
        assert!(profile.stylesheet_tag.contains("family=EB+Garamond:wght@400"));
        assert_eq!(profile.font_family, "'EB Garamond', serif");
    }

    #[test]
    fn test_families_have_independent_registries() {
        let resumes = DocumentFamily::resumes();
        let letters = DocumentFamily::cover_letters();
        assert!(resumes.fonts().resolve("zenith").is_some());
        assert!(letters.fonts().resolve("zenith").is_none());
        assert!(letters.fonts().resolve("ledger").is_some());
        assert_eq!(resumes.kind(), DocumentKind::Resume);
        assert_eq!(letters.kind().slug(), "cover-letter");
    }

    #[test]
    fn test_trailing_buffer_defaults_to_zero() {
        let family = DocumentFamily::resumes()
            .with_trailing_buffers(HashMap::from([("zenith".to_string(), 0.25)]));
        assert_eq!(family.trailing_buffer_in("zenith"), 0.25);
        assert_eq!(family.trailing_buffer_in("aether"), 0.0);
        assert_eq!(family.trailing_buffer_in("nonexistent-template"), 0.0);
    }
}
