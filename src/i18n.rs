//! Localized string tables.
//!
//! Tables are embedded JSON key→template maps, one per language, with
//! `{placeholder}` substitution for distro names. Lookup falls back to
//! English, then to the key itself, so a missing translation degrades to
//! something readable instead of failing. The orchestration core never
//! formats through this module; only presentation layers do.

use std::collections::HashMap;

const EN: &str = include_str!("../locale/en.json");
const JA: &str = include_str!("../locale/ja.json");
const ES: &str = include_str!("../locale/es.json");

pub const LANGUAGES: &[&str] = &["en", "ja", "es"];

pub struct Catalog {
    language: String,
    table: HashMap<String, String>,
    fallback: HashMap<String, String>,
}

fn parse_table(raw: &str) -> HashMap<String, String> {
    serde_json::from_str(raw).unwrap_or_default()
}

fn embedded_table(language: &str) -> Option<&'static str> {
    match language {
        "en" => Some(EN),
        "ja" => Some(JA),
        "es" => Some(ES),
        _ => None,
    }
}

impl Catalog {
    /// Builds the catalog for `language`, falling back to English when the
    /// language is unknown.
    pub fn new(language: &str) -> Self {
        let (language, raw) = match embedded_table(language) {
            Some(raw) => (language.to_string(), raw),
            None => ("en".to_string(), EN),
        };
        Self {
            language,
            table: parse_table(raw),
            fallback: parse_table(EN),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn get(&self, key: &str) -> String {
        self.table
            .get(key)
            .or_else(|| self.fallback.get(key))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Template lookup with `{placeholder}` substitution.
    pub fn format(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut out = self.get(key);
        for (name, value) in args {
            out = out.replace(&format!("{{{name}}}"), value);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_template_arguments() {
        let catalog = Catalog::new("en");
        let msg = catalog.format(
            "rename_confirm_message",
            &[("old_name", "Ubuntu"), ("new_name", "Jammy")],
        );
        assert!(msg.contains("Ubuntu"));
        assert!(msg.contains("Jammy"));
        assert!(!msg.contains('{'));
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let catalog = Catalog::new("tlh");
        assert_eq!(catalog.language(), "en");
        assert_eq!(catalog.get("button_refresh"), Catalog::new("en").get("button_refresh"));
    }

    #[test]
    fn missing_key_degrades_to_the_key_itself() {
        let catalog = Catalog::new("en");
        assert_eq!(catalog.get("no_such_key"), "no_such_key");
    }

    #[test]
    fn every_language_covers_the_english_key_set() {
        let english = parse_table(EN);
        for lang in LANGUAGES {
            let table = parse_table(embedded_table(lang).unwrap());
            for key in english.keys() {
                assert!(table.contains_key(key), "{lang} is missing key {key}");
            }
        }
    }
}
