use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

static CONFIG_OVERRIDE: OnceLock<PathBuf> = OnceLock::new();

/// Where the amount lives in a given export vintage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum AmountColumns {
    /// One signed column, e.g. `Net` or `Net (USD)`.
    Net { column: String },
    /// Separate columns; the signed amount is `credit - debit`.
    DebitCredit { debit: String, credit: String },
}

impl AmountColumns {
    pub fn column_names(&self) -> Vec<&str> {
        match self {
            Self::Net { column } => vec![column.as_str()],
            Self::DebitCredit { debit, credit } => vec![debit.as_str(), credit.as_str()],
        }
    }
}

/// A rule that marks a transaction as revenue. Rules are OR-combined and
/// evaluated in list order; the first match is reported as the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "match", rename_all = "snake_case")]
pub enum RevenueRule {
    /// Case-insensitive substring of the category header label.
    CategoryContains { pattern: String },
    /// Literal substring of the source/description field.
    SourceContains { pattern: String },
    /// Regular expression over the source/description field.
    SourceMatches { pattern: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementProfile {
    #[serde(default = "default_banner_lines")]
    pub banner_lines: usize,
    #[serde(default = "default_amount")]
    pub amount: AmountColumns,
    #[serde(default = "default_date_column")]
    pub date_column: String,
    #[serde(default = "default_source_column")]
    pub source_column: String,
    /// Worksheet to read from workbook exports; first sheet when unset.
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default = "default_date_formats")]
    pub date_formats: Vec<String>,
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default = "default_revenue_rules")]
    pub revenue_rules: Vec<RevenueRule>,
    /// Labels containing any of these (case-insensitive) take their major
    /// category from after the last colon instead of before the first.
    #[serde(default = "default_major_markers")]
    pub major_after_colon_markers: Vec<String>,
}

fn default_banner_lines() -> usize {
    6
}

fn default_amount() -> AmountColumns {
    AmountColumns::Net {
        column: "Net".to_string(),
    }
}

fn default_date_column() -> String {
    "Date".to_string()
}

fn default_source_column() -> String {
    "Source".to_string()
}

fn default_date_formats() -> Vec<String> {
    ["%Y-%m-%d", "%d %b %Y", "%m/%d/%Y", "%d-%b-%y"]
        .iter()
        .map(|f| f.to_string())
        .collect()
}

fn default_revenue_rules() -> Vec<RevenueRule> {
    vec![
        RevenueRule::CategoryContains {
            pattern: "revenue".to_string(),
        },
        RevenueRule::SourceContains {
            pattern: "Receivable Invoice".to_string(),
        },
    ]
}

fn default_major_markers() -> Vec<String> {
    vec!["other".to_string(), "revenue".to_string()]
}

impl Default for StatementProfile {
    fn default() -> Self {
        Self {
            banner_lines: default_banner_lines(),
            amount: default_amount(),
            date_column: default_date_column(),
            source_column: default_source_column(),
            sheet: None,
            date_formats: default_date_formats(),
            drop_columns: Vec::new(),
            revenue_rules: default_revenue_rules(),
            major_after_colon_markers: default_major_markers(),
        }
    }
}

pub fn builtin_profiles() -> BTreeMap<String, StatementProfile> {
    let mut profiles = BTreeMap::new();
    profiles.insert("net".to_string(), StatementProfile::default());
    profiles.insert(
        "net-usd".to_string(),
        StatementProfile {
            amount: AmountColumns::Net {
                column: "Net (USD)".to_string(),
            },
            ..StatementProfile::default()
        },
    );
    profiles.insert(
        "debit-credit".to_string(),
        StatementProfile {
            amount: AmountColumns::DebitCredit {
                debit: "Debit".to_string(),
                credit: "Credit".to_string(),
            },
            drop_columns: vec!["Gross".to_string()],
            ..StatementProfile::default()
        },
    );
    profiles
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_profile_name")]
    pub default_profile: String,
    #[serde(default = "builtin_profiles")]
    pub profiles: BTreeMap<String, StatementProfile>,
}

fn default_collection() -> String {
    "Monthly Statement Transactions".to_string()
}

fn default_profile_name() -> String {
    "net".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            collection: default_collection(),
            default_profile: default_profile_name(),
            profiles: builtin_profiles(),
        }
    }
}

impl Settings {
    /// Resolve a profile by name, falling back to the default profile.
    /// Built-in profiles stay available even when the settings file
    /// defines its own set.
    pub fn profile(&self, name: Option<&str>) -> Result<StatementProfile> {
        let name = name.unwrap_or(&self.default_profile);
        if let Some(p) = self.profiles.get(name) {
            return Ok(p.clone());
        }
        builtin_profiles()
            .remove(name)
            .ok_or_else(|| LedgerError::UnknownProfile(name.to_string()))
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("ledger.db")
    }
}

/// Point all settings reads and writes at `path` for this process.
pub fn set_config_path(path: PathBuf) {
    let _ = CONFIG_OVERRIDE.set(path);
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("kpi-ledger")
}

pub fn settings_path() -> PathBuf {
    CONFIG_OVERRIDE
        .get()
        .cloned()
        .unwrap_or_else(|| config_dir().join("settings.json"))
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("kpi-ledger")
}

pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| LedgerError::Settings(format!("{}: {e}", path.display())))
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| LedgerError::Settings(e.to_string()))?;
    std::fs::write(path, format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            collection: "Ledger".to_string(),
            default_profile: "net-usd".to_string(),
            profiles: builtin_profiles(),
        };
        save_settings_to(&path, &settings).unwrap();
        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.collection, "Ledger");
        assert_eq!(loaded.default_profile, "net-usd");
        assert_eq!(loaded.profiles, builtin_profiles());
    }

    #[test]
    fn test_load_returns_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let s = load_settings_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(s.default_profile, "net");
        assert_eq!(s.collection, "Monthly Statement Transactions");
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.default_profile, "net");
        assert!(s.profiles.contains_key("debit-credit"));
    }

    #[test]
    fn test_partial_profile_fills_defaults() {
        let json = r#"{
            "data_dir": "/tmp/test",
            "profiles": {
                "usd": { "amount": { "layout": "net", "column": "Net (USD)" }, "banner_lines": 4 }
            }
        }"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        let p = s.profile(Some("usd")).unwrap();
        assert_eq!(p.banner_lines, 4);
        assert_eq!(p.date_column, "Date");
        assert_eq!(p.revenue_rules.len(), 2);
        assert_eq!(
            p.amount,
            AmountColumns::Net {
                column: "Net (USD)".to_string()
            }
        );
    }

    #[test]
    fn test_builtin_profiles_survive_custom_set() {
        let json = r#"{"data_dir": "/tmp/test", "profiles": {}}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert!(s.profile(Some("debit-credit")).is_ok());
        assert!(s.profile(None).is_ok());
    }

    #[test]
    fn test_unknown_profile() {
        let s = Settings::default();
        let err = s.profile(Some("quarterly")).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownProfile(ref n) if n == "quarterly"));
    }

    #[test]
    fn test_malformed_settings_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_settings_from(&path),
            Err(LedgerError::Settings(_))
        ));
    }

    #[test]
    fn test_rules_serialize_tagged() {
        let json = serde_json::to_string(&default_revenue_rules()).unwrap();
        assert!(json.contains(r#""match":"category_contains""#));
        assert!(json.contains(r#""match":"source_contains""#));
    }
}
