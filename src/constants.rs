/// Field, file and rule constants shared across the merge pipeline.

// Facility fields shared by the reference register and every provider source
pub const FIELD_NAME: &str = "name";
pub const FIELD_STRASSE: &str = "strasse";
pub const FIELD_PLZ: &str = "plz";
pub const FIELD_ORT: &str = "ort";
pub const FIELD_TELEFON: &str = "telefon";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_ART: &str = "art";
pub const FIELD_TRAEGER: &str = "traeger";
pub const FIELD_BEZIRK: &str = "bezirk";

/// Fields that identify a reference facility. Enrichment never writes these.
pub const IDENTITY_FIELDS: &[&str] = &[
    FIELD_NAME,
    FIELD_STRASSE,
    FIELD_PLZ,
    FIELD_ORT,
    FIELD_TELEFON,
    FIELD_EMAIL,
    FIELD_ART,
];

// Columns added by the pipeline itself
pub const COLUMN_CANDIDATE_ID: &str = "candidate_id";
pub const COLUMN_SOURCE: &str = "source";
pub const COLUMN_REFERENCE_ID: &str = "reference_id";
pub const COLUMN_CANDIDATE_SOURCE: &str = "candidate_source";
pub const COLUMN_CANDIDATE_NAME: &str = "candidate_name";
pub const COLUMN_MATCH_RULE: &str = "match_rule";
pub const COLUMN_SCORE: &str = "score";

/// Supplemental columns copied from a matched candidate onto its reference record.
pub const DEFAULT_ENRICH_COLUMNS: &[&str] = &[
    "traeger",
    "leiter_in",
    "contact_name",
    "vormerkung_form_url",
    "anmeldung_url",
    "anmeldung_krabbelstube_url",
    "anmeldung_kindergarten_url",
    "oeffnungszeiten",
    "gruppen",
    "plaetze",
    "schliesstage",
    "kosten",
    "beschreibung",
    "lage",
    "verkehrsanbindung",
    "gebaeude",
    "angebot_art_label",
];

/// Minimum token-set score for a fuzzy name match. Inclusive.
pub const FUZZY_SCORE_CUTOFF: f64 = 90.0;

// Rule labels as written to the artifacts
pub const RULE_EMAIL: &str = "email";
pub const RULE_PHONE: &str = "phone";
pub const RULE_FUZZY_NAME: &str = "fuzzy_name";

// Stock provider sources
pub const SOURCE_STADT_LINZ: &str = "stadt_linz";
pub const SOURCE_KINDERFREUNDE: &str = "kinderfreunde";
pub const SOURCE_FAMILIENBUND: &str = "familienbund";
pub const SOURCE_CARITAS: &str = "caritas";

// Stock file names
pub const REFERENCE_FILE: &str = "ogd_preprocessed.csv";
pub const STADT_LINZ_FILE: &str = "linz_kinderbetreuung_stadt.csv";
pub const KINDERFREUNDE_FILE: &str = "kinderfreunde_kinderbetreuung_ooe.csv";
pub const FAMILIENBUND_FILE: &str = "familienbund_kinderbetreuung_ooe.csv";
pub const CARITAS_FILE: &str = "caritas_kinderbetreuung_ooe.csv";
pub const AGGREGATED_FILE: &str = "kbbes_scraped_merged.csv";
pub const ENRICHED_FILE: &str = "ogd_enriched.csv";
pub const AUDIT_FILE: &str = "kbbes_links.csv";
pub const SUMMARY_FILE: &str = "merge_summary.json";

/// Get all stock provider sources with their default files
pub fn default_sources() -> Vec<(&'static str, &'static str)> {
    vec![
        (SOURCE_STADT_LINZ, STADT_LINZ_FILE),
        (SOURCE_KINDERFREUNDE, KINDERFREUNDE_FILE),
        (SOURCE_FAMILIENBUND, FAMILIENBUND_FILE),
        (SOURCE_CARITAS, CARITAS_FILE),
    ]
}

/// Whether a column is one of the reference identity fields
pub fn is_identity_field(column: &str) -> bool {
    IDENTITY_FIELDS.contains(&column)
}
