use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Versioned heuristic mapping tables consumed by the [`Normalizer`](super::Normalizer).
///
/// Every table has a stock default so a config file only needs to list the
/// tables it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupTables {
    /// Version label recorded in the run summary
    pub version: String,
    /// Exact facility-type abbreviations (lowercase key)
    pub art_codes: BTreeMap<String, String>,
    /// Ordered substring rules for facility types; first hit wins
    pub art_keywords: Vec<KeywordRule>,
    /// Ordered literal replacements applied to lowercased street names
    pub street_replacements: Vec<Replacement>,
    /// District code to district name
    pub districts: BTreeMap<String, String>,
    /// Ordered operator classification rules
    pub operators: Vec<OperatorRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keyword: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

/// Which part of a record an operator rule inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorMatchOn {
    /// Substring of the lowercased email address
    Email,
    /// Substring of the lowercased facility name
    Name,
    /// Either of the above
    Any,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorRule {
    pub needle: String,
    pub on: OperatorMatchOn,
    pub operator: String,
}

fn keyword(keyword: &str, value: &str) -> KeywordRule {
    KeywordRule {
        keyword: keyword.to_string(),
        value: value.to_string(),
    }
}

fn replacement(from: &str, to: &str) -> Replacement {
    Replacement {
        from: from.to_string(),
        to: to.to_string(),
    }
}

fn operator(needle: &str, on: OperatorMatchOn, operator: &str) -> OperatorRule {
    OperatorRule {
        needle: needle.to_string(),
        on,
        operator: operator.to_string(),
    }
}

impl Default for LookupTables {
    fn default() -> Self {
        let art_codes = [
            ("kg", "kindergarten"),
            ("ks", "krabbelstube"),
            ("ho", "hort"),
            ("sof", "sonstige form"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let districts = [
            ("401", "Linz (Stadt)"),
            ("402", "Steyr (Stadt)"),
            ("403", "Wels (Stadt)"),
            ("404", "Braunau am Inn"),
            ("405", "Eferding"),
            ("406", "Freistadt"),
            ("407", "Gmunden"),
            ("408", "Grieskirchen"),
            ("409", "Kirchdorf an der Krems"),
            ("410", "Linz-Land"),
            ("411", "Perg"),
            ("412", "Ried im Innkreis"),
            ("413", "Rohrbach"),
            ("414", "Schärding"),
            ("415", "Steyr-Land"),
            ("416", "Urfahr-Umgebung"),
            ("417", "Vöcklabruck"),
            ("418", "Wels-Land"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            version: "ooe-2023.1".to_string(),
            art_codes,
            art_keywords: vec![
                keyword("hort", "hort"),
                keyword("krabbelstube", "krabbelstube"),
                keyword("kleinkind", "krabbelstube"),
                keyword("kindergarten", "kindergarten"),
            ],
            street_replacements: vec![
                replacement("straße", "strasse"),
                replacement("ß", "ss"),
                replacement("str.", "strasse"),
            ],
            districts,
            operators: vec![
                operator("caritas-ooe.at", OperatorMatchOn::Email, "Caritas"),
                operator("pfarrcaritas-kita.at", OperatorMatchOn::Email, "Pfarrcaritas"),
                operator("vffb.or.at", OperatorMatchOn::Email, "VFFB"),
                operator("kreuzschwestern", OperatorMatchOn::Any, "Kreuzschwestern"),
                operator("ordens", OperatorMatchOn::Name, "Ordens- bzw. Schulverein"),
            ],
        }
    }
}

impl LookupTables {
    /// Canonical facility type for an already lowercased value, if any table knows it
    pub fn facility_type(&self, lowered: &str) -> Option<&str> {
        if let Some(value) = self.art_codes.get(lowered) {
            return Some(value);
        }
        self.art_keywords
            .iter()
            .find(|rule| lowered.contains(rule.keyword.as_str()))
            .map(|rule| rule.value.as_str())
    }

    pub fn district(&self, code: &str) -> Option<&str> {
        self.districts.get(code).map(String::as_str)
    }

    /// Classify an operator from email and name. Both are matched lowercased.
    pub fn operator_for(&self, email: &str, name: &str) -> Option<&str> {
        let email = email.to_lowercase();
        let name = name.to_lowercase();
        self.operators
            .iter()
            .find(|rule| {
                let needle = rule.needle.to_lowercase();
                match rule.on {
                    OperatorMatchOn::Email => email.contains(&needle),
                    OperatorMatchOn::Name => name.contains(&needle),
                    OperatorMatchOn::Any => email.contains(&needle) || name.contains(&needle),
                }
            })
            .map(|rule| rule.operator.as_str())
    }
}
