use clap::ValueEnum;
use serde::{Deserialize, Serialize};

pub const UNKNOWN_TEST_CASE: &str = "Unknown Test Case";
pub const UNKNOWN_ERROR: &str = "Unknown Error";

const COMPONENT_MARKER: &str = "Invoking Business Component : ";
const TEST_CASE_MARKER: &str = "Current Test Case : ";

/// Built-in log conventions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dialect {
    /// `Invoking Business Component : <name>` boundaries with test-case tracking.
    Component,
    /// `*** <name> ***` boundaries, no test-case tracking.
    Framed,
}

/// How a section-opening line is recognised.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "kebab-case")]
pub enum BoundaryStyle {
    /// Line contains `marker`; the keyword is the text after its first occurrence.
    MarkerPrefixed { marker: String },
    /// Trimmed line starts and ends with a run of `*` framing a non-empty name.
    AsteriskFramed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageTransform {
    /// Whole line, surrounding whitespace stripped.
    #[default]
    Trim,
    /// Line with every occurrence of the matched substring removed, then trimmed.
    StripMarker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRule {
    pub contains_any: Vec<String>,
    #[serde(default)]
    pub transform: MessageTransform,
}

impl ErrorRule {
    pub fn new(contains_any: &[&str], transform: MessageTransform) -> Self {
        Self { contains_any: contains_any.iter().map(|s| s.to_string()).collect(), transform }
    }

    /// Message for `line` if any of the substrings occurs in it.
    pub fn apply(&self, line: &str) -> Option<String> {
        let hit = self.contains_any.iter().find(|needle| line.contains(needle.as_str()))?;
        let msg = match self.transform {
            MessageTransform::Trim => line.trim().to_string(),
            MessageTransform::StripMarker => line.replace(hit.as_str(), "").trim().to_string(),
        };
        Some(msg)
    }
}

/// Everything the scanner needs to know about one log dialect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRules {
    pub test_case_marker: Option<String>,
    pub boundary: BoundaryStyle,
    /// Applied in order; the first rule that matches a line wins.
    pub error_rules: Vec<ErrorRule>,
}

impl ScanRules {
    pub fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Component => Self {
                test_case_marker: Some(TEST_CASE_MARKER.to_string()),
                boundary: BoundaryStyle::MarkerPrefixed { marker: COMPONENT_MARKER.to_string() },
                error_rules: vec![
                    ErrorRule::new(&["verification failed"], MessageTransform::Trim),
                    ErrorRule::new(&["Error Type:"], MessageTransform::StripMarker),
                    ErrorRule::new(&["Exception", "Error:", "AssertionError:"], MessageTransform::Trim),
                ],
            },
            Dialect::Framed => Self {
                test_case_marker: None,
                boundary: BoundaryStyle::AsteriskFramed,
                error_rules: vec![
                    ErrorRule::new(&["verification failed"], MessageTransform::Trim),
                    ErrorRule::new(&["Error Type:"], MessageTransform::StripMarker),
                    ErrorRule::new(&["Exception"], MessageTransform::Trim),
                ],
            },
        }
    }

    /// Rejects empty markers, which would match every line.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(m) = self.test_case_marker.as_ref() && m.is_empty() {
            anyhow::bail!("test_case_marker must not be empty");
        }
        if let BoundaryStyle::MarkerPrefixed { marker } = &self.boundary && marker.is_empty() {
            anyhow::bail!("boundary marker must not be empty");
        }
        for (i, r) in self.error_rules.iter().enumerate() {
            if r.contains_any.is_empty() {
                anyhow::bail!("error_rules[{}] has no substrings", i);
            }
            if r.contains_any.iter().any(|s| s.is_empty()) {
                anyhow::bail!("error_rules[{}] contains an empty substring", i);
            }
        }
        Ok(())
    }
}

impl Default for ScanRules {
    fn default() -> Self { Self::for_dialect(Dialect::Component) }
}

/// On-disk overrides; every field is optional and patches the chosen dialect.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    pub dialect: Option<Dialect>,
    /// `null` disables test-case tracking, absence keeps the dialect's marker.
    #[serde(default, with = "double_option")]
    pub test_case_marker: Option<Option<String>>,
    pub boundary: Option<BoundaryStyle>,
    pub error_rules: Option<Vec<ErrorRule>>,
}

impl RulesConfig {
    pub fn resolve(self, fallback: Dialect) -> ScanRules {
        let mut rules = ScanRules::for_dialect(self.dialect.unwrap_or(fallback));
        if let Some(m) = self.test_case_marker { rules.test_case_marker = m; }
        if let Some(b) = self.boundary { rules.boundary = b; }
        if let Some(e) = self.error_rules { rules.error_rules = e; }
        rules
    }
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Option<String>>, s: S) -> Result<S::Ok, S::Error> {
        v.as_ref().and_then(|x| x.as_ref()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(d).map(Some)
    }
}

/// Loads a rules file. An explicit path (argument or `KWDASH_RULES_PATH`) that
/// cannot be used is reported as a warning; a missing default `rules.json` is not.
pub fn load_rules(path_opt: Option<&str>) -> Option<RulesConfig> {
    let explicit = path_opt
        .map(|s| s.to_string())
        .or_else(|| std::env::var("KWDASH_RULES_PATH").ok());
    let is_explicit = explicit.is_some();
    let path = explicit.unwrap_or_else(|| "rules.json".to_string());
    let p = std::path::PathBuf::from(&path);
    let data = match std::fs::read(&p) {
        Ok(d) => d,
        Err(e) => {
            if is_explicit { log::warn!("Failed to read rules file {}: {}", p.to_string_lossy(), e); }
            else { log::debug!("No rules file at {}: {}", p.to_string_lossy(), e); }
            return None;
        }
    };
    match parse_rules(&data) {
        Ok(c) => { log::info!("Loaded rules from {}", p.to_string_lossy()); Some(c) }
        Err(e) => { log::warn!("Failed to parse rules file {}: {}", p.to_string_lossy(), e); None }
    }
}

pub fn parse_rules(data: &[u8]) -> anyhow::Result<RulesConfig> {
    let cfg: RulesConfig = serde_json::from_slice(data)?;
    Ok(cfg)
}

/// Rules for a run: rules-file overrides on top of `dialect`, falling back to the
/// plain dialect when the patched rules are invalid.
pub fn effective_rules(cfg: Option<RulesConfig>, dialect: Dialect) -> ScanRules {
    let Some(cfg) = cfg else { return ScanRules::for_dialect(dialect) };
    let rules = cfg.resolve(dialect);
    match rules.validate() {
        Ok(()) => rules,
        Err(e) => {
            log::warn!("Ignoring invalid rules ({}); using built-in {:?} dialect", e, dialect);
            ScanRules::for_dialect(dialect)
        }
    }
}
