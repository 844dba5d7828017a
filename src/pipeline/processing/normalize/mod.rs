//! Canonical comparison keys for facility records.
//!
//! Every function here is total: blank, missing or malformed input yields an
//! empty key, never an error. An empty key never matches anything downstream.

pub mod lookup;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::constants;
use crate::types::FacilityRecord;

pub use lookup::LookupTables;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));
// Postal codes exported through a float column arrive as "4020.0"
static FLOAT_INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+)\.0*$").expect("static regex"));

/// Order-insensitive word tokens of a facility name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameTokens(BTreeSet<String>);

impl NameTokens {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tokens(&self) -> &BTreeSet<String> {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for NameTokens {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        NameTokens(iter.into_iter().map(Into::into).collect())
    }
}

/// Derived, read-only comparison keys of one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedKeySet {
    pub plz_norm: String,
    pub strasse_norm: String,
    pub ort_norm: String,
    pub art_norm: String,
    pub telefon_norm: String,
    pub email_norm: String,
    pub name_norm: NameTokens,
}

impl NormalizedKeySet {
    /// Blocking key for fuzzy matching, `None` when any component is empty
    pub fn block_key(&self) -> Option<BlockKey> {
        if self.plz_norm.is_empty() || self.ort_norm.is_empty() || self.art_norm.is_empty() {
            return None;
        }
        Some(BlockKey {
            plz: self.plz_norm.clone(),
            ort: self.ort_norm.clone(),
            art: self.art_norm.clone(),
        })
    }
}

/// `(plz, ort, art)` partition used to bound fuzzy comparisons
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub plz: String,
    pub ort: String,
    pub art: String,
}

/// Turns raw field values into comparison keys using a set of lookup tables
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    tables: LookupTables,
}

impl Normalizer {
    pub fn new(tables: LookupTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &LookupTables {
        &self.tables
    }

    /// Digits of a postal code, no padding or truncation
    pub fn postal_code(&self, raw: Option<&str>) -> String {
        let value = raw.unwrap_or("").trim();
        if let Some(caps) = FLOAT_INTEGER.captures(value) {
            return caps[1].to_string();
        }
        NON_DIGIT.replace_all(value, "").into_owned()
    }

    pub fn street(&self, raw: Option<&str>) -> String {
        let mut value = raw.unwrap_or("").trim().to_lowercase();
        for rule in &self.tables.street_replacements {
            if !rule.from.is_empty() {
                value = value.replace(rule.from.as_str(), rule.to.as_str());
            }
        }
        collapse_whitespace(&value)
    }

    pub fn city(&self, raw: Option<&str>) -> String {
        collapse_whitespace(&raw.unwrap_or("").trim().to_lowercase())
    }

    /// Closed vocabulary facility type; unknown values pass through lowercased
    pub fn facility_type(&self, raw: Option<&str>) -> String {
        let lowered = collapse_whitespace(&raw.unwrap_or("").trim().to_lowercase());
        if lowered.is_empty() {
            return lowered;
        }
        match self.tables.facility_type(&lowered) {
            Some(canonical) => canonical.to_string(),
            None => lowered,
        }
    }

    pub fn phone(&self, raw: Option<&str>) -> String {
        NON_DIGIT.replace_all(raw.unwrap_or(""), "").into_owned()
    }

    pub fn email(&self, raw: Option<&str>) -> String {
        raw.unwrap_or("").trim().to_lowercase()
    }

    pub fn name(&self, raw: Option<&str>) -> NameTokens {
        raw.unwrap_or("")
            .to_lowercase()
            .split_whitespace()
            .collect()
    }

    /// Compute every comparison key of a record
    pub fn keys(&self, record: &FacilityRecord) -> NormalizedKeySet {
        NormalizedKeySet {
            plz_norm: self.postal_code(record.get(constants::FIELD_PLZ)),
            strasse_norm: self.street(record.get(constants::FIELD_STRASSE)),
            ort_norm: self.city(record.get(constants::FIELD_ORT)),
            art_norm: self.facility_type(record.get(constants::FIELD_ART)),
            telefon_norm: self.phone(record.get(constants::FIELD_TELEFON)),
            email_norm: self.email(record.get(constants::FIELD_EMAIL)),
            name_norm: self.name(record.get(constants::FIELD_NAME)),
        }
    }

    pub fn keys_for_all(&self, records: &[FacilityRecord]) -> Vec<NormalizedKeySet> {
        records.iter().map(|r| self.keys(r)).collect()
    }

    /// Fill derivable descriptive fields without touching identity fields.
    ///
    /// A district code in `bezirk` becomes the district name, and a missing
    /// `traeger` is classified from email domain and name.
    pub fn harmonize(&self, record: &FacilityRecord) -> FacilityRecord {
        let mut out = self.harmonize_district(record);

        if !record.has(constants::FIELD_TRAEGER) {
            let email = record.get_or_empty(constants::FIELD_EMAIL);
            if let Some(operator) = self.tables.operator_for(email, record.name()) {
                out.set(constants::FIELD_TRAEGER, operator);
            }
        }

        out
    }

    /// Replace a district code in `bezirk` by the district name
    pub fn harmonize_district(&self, record: &FacilityRecord) -> FacilityRecord {
        let mut out = record.clone();
        if let Some(code) = record.get(constants::FIELD_BEZIRK) {
            let code = self.postal_code(Some(code));
            if let Some(district) = self.tables.district(&code) {
                out.set(constants::FIELD_BEZIRK, district);
            }
        }
        out
    }
}

fn collapse_whitespace(value: &str) -> String {
    WHITESPACE.replace_all(value.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::default()
    }

    #[test]
    fn test_normalizers_are_total() {
        let n = normalizer();
        for raw in [None, Some(""), Some("   "), Some("\t\n"), Some("???"), Some("nan")] {
            let _ = n.postal_code(raw);
            let _ = n.street(raw);
            let _ = n.city(raw);
            let _ = n.facility_type(raw);
            let _ = n.phone(raw);
            let _ = n.email(raw);
            let _ = n.name(raw);
        }
        assert_eq!(n.postal_code(None), "");
        assert_eq!(n.phone(Some("???")), "");
        assert!(n.name(Some("   ")).is_empty());
        assert_eq!(n.keys(&FacilityRecord::new()), NormalizedKeySet::default());
    }

    #[test]
    fn test_postal_code() {
        let n = normalizer();
        assert_eq!(n.postal_code(Some("4020")), "4020");
        assert_eq!(n.postal_code(Some(" A-4020 ")), "4020");
        assert_eq!(n.postal_code(Some("4020.0")), "4020");
        // No padding
        assert_eq!(n.postal_code(Some("020")), "020");
    }

    #[test]
    fn test_street_abbreviations_are_equivalent() {
        let n = normalizer();
        let expected = "hauptstrasse 12";
        assert_eq!(n.street(Some("Hauptstraße 12")), expected);
        assert_eq!(n.street(Some("Hauptstrasse  12")), expected);
        assert_eq!(n.street(Some("  Hauptstr. 12")), expected);
        assert_eq!(n.street(Some("Große Gasse 1")), "grosse gasse 1");
    }

    #[test]
    fn test_city_and_email() {
        let n = normalizer();
        assert_eq!(n.city(Some("  Linz ")), "linz");
        assert_eq!(n.city(Some("St.  Florian")), "st. florian");
        assert_eq!(n.email(Some(" Info@Sonnenschein.AT ")), "info@sonnenschein.at");
    }

    #[test]
    fn test_facility_type_vocabulary() {
        let n = normalizer();
        assert_eq!(n.facility_type(Some("KG")), "kindergarten");
        assert_eq!(n.facility_type(Some("Kindergarten")), "kindergarten");
        assert_eq!(n.facility_type(Some("Krabbelstube")), "krabbelstube");
        assert_eq!(n.facility_type(Some("Hort")), "hort");
        assert_eq!(n.facility_type(Some("Alterserweiterte Kindergartengruppe")), "kindergarten");
        assert_eq!(n.facility_type(Some("Tageseltern")), "tageseltern");
        assert_eq!(n.facility_type(None), "");
    }

    #[test]
    fn test_phone_digits_only() {
        let n = normalizer();
        assert_eq!(n.phone(Some("+43 (0)732 / 12 34-5")), "43073212345");
    }

    #[test]
    fn test_name_token_set() {
        let n = normalizer();
        let a = n.name(Some("Kindergarten  Sonnenschein"));
        let b = n.name(Some("sonnenschein KINDERGARTEN"));
        assert_eq!(a, b);
        assert_eq!(a.tokens().len(), 2);
    }

    #[test]
    fn test_block_key_requires_all_components() {
        let n = normalizer();
        let full = n.keys(&FacilityRecord::from_pairs([
            ("plz", "4020"),
            ("ort", "Linz"),
            ("art", "KG"),
        ]));
        assert_eq!(
            full.block_key(),
            Some(BlockKey {
                plz: "4020".into(),
                ort: "linz".into(),
                art: "kindergarten".into()
            })
        );

        let partial = n.keys(&FacilityRecord::from_pairs([("plz", "4020"), ("ort", "Linz")]));
        assert_eq!(partial.block_key(), None);
    }

    #[test]
    fn test_harmonize_fills_district_and_operator() {
        let n = normalizer();
        let record = FacilityRecord::from_pairs([
            ("name", "Pfarrcaritas Kindergarten St. Peter"),
            ("email", "kg.stpeter@pfarrcaritas-kita.at"),
            ("bezirk", "401"),
        ]);
        let out = n.harmonize(&record);
        assert_eq!(out.get("bezirk"), Some("Linz (Stadt)"));
        assert_eq!(out.get("traeger"), Some("Pfarrcaritas"));
        assert_eq!(out.name(), record.name());
    }

    #[test]
    fn test_harmonize_keeps_existing_values() {
        let n = normalizer();
        let record = FacilityRecord::from_pairs([
            ("email", "office@caritas-ooe.at"),
            ("traeger", "Stadt Linz"),
            ("bezirk", "Linz-Land"),
        ]);
        let out = n.harmonize(&record);
        assert_eq!(out, record);
    }

    #[test]
    fn test_harmonize_district_leaves_operator_alone() {
        let n = normalizer();
        let record = FacilityRecord::from_pairs([
            ("email", "office@caritas-ooe.at"),
            ("bezirk", "410.0"),
        ]);
        let out = n.harmonize_district(&record);
        assert_eq!(out.get("bezirk"), Some("Linz-Land"));
        assert_eq!(out.get("traeger"), None);
    }
}
