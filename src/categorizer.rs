use regex::Regex;
use rust_decimal::Decimal;

use crate::error::{LedgerError, Result};
use crate::importer::negate;
use crate::models::{Kind, Transaction};
use crate::settings::{RevenueRule, StatementProfile};

enum Matcher {
    CategoryContains(String),
    SourceContains(String),
    SourceMatches(Regex),
}

impl Matcher {
    fn matches(&self, category_raw: &str, source: &str) -> bool {
        match self {
            Self::CategoryContains(needle) => category_raw.to_lowercase().contains(needle),
            Self::SourceContains(needle) => source.contains(needle.as_str()),
            Self::SourceMatches(re) => re.is_match(source),
        }
    }

    fn is_category_rule(&self) -> bool {
        matches!(self, Self::CategoryContains(_))
    }

    fn describe(&self) -> String {
        match self {
            Self::CategoryContains(n) => format!("category contains {n:?}"),
            Self::SourceContains(n) => format!("source contains {n:?}"),
            Self::SourceMatches(re) => format!("source matches /{}/", re.as_str()),
        }
    }
}

/// Drop the leading whitespace-delimited token.
fn drop_token(s: &str) -> &str {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => s[i..].trim_start(),
        None => "",
    }
}

/// Strip the account-code prefix from a category header label.
///
/// `"4000 Service Revenue"` becomes `"Service Revenue"` and the range form
/// `"4000 - 4999 Revenue: Grants"` becomes `"Revenue: Grants"`. A label that
/// is a single token is returned as-is.
pub fn strip_code_prefix(category_raw: &str) -> &str {
    let rest = drop_token(category_raw);
    if rest.is_empty() {
        return category_raw.trim();
    }
    if rest.split_whitespace().next() == Some("-") {
        let label = drop_token(drop_token(rest));
        if !label.is_empty() {
            return label;
        }
    }
    rest.trim_end()
}

pub struct Categorizer {
    rules: Vec<Matcher>,
    markers: Vec<String>,
}

impl Categorizer {
    pub fn new(profile: &StatementProfile) -> Result<Self> {
        let rules = profile
            .revenue_rules
            .iter()
            .map(|rule| match rule {
                RevenueRule::CategoryContains { pattern } => {
                    Ok(Matcher::CategoryContains(pattern.to_lowercase()))
                }
                RevenueRule::SourceContains { pattern } => Ok(Matcher::SourceContains(pattern.clone())),
                RevenueRule::SourceMatches { pattern } => Regex::new(pattern)
                    .map(Matcher::SourceMatches)
                    .map_err(|e| LedgerError::Settings(format!("bad revenue rule /{pattern}/: {e}"))),
            })
            .collect::<Result<Vec<_>>>()?;
        let markers = profile
            .major_after_colon_markers
            .iter()
            .map(|m| m.to_lowercase())
            .collect();
        Ok(Self { rules, markers })
    }

    /// Revenue when any rule matches, otherwise cost. The second value is a
    /// review note for rows a source rule pulled out of a non-revenue category.
    pub fn kind(&self, category_raw: &str, source: &str) -> (Kind, Option<String>) {
        let Some(first) = self.rules.iter().find(|r| r.matches(category_raw, source)) else {
            return (Kind::Cost, None);
        };
        let category_says_revenue = self
            .rules
            .iter()
            .any(|r| r.is_category_rule() && r.matches(category_raw, source));
        if first.is_category_rule() || category_says_revenue {
            return (Kind::Revenue, None);
        }
        let note = format!(
            "reclassified as revenue ({}) under category {category_raw:?}",
            first.describe()
        );
        (Kind::Revenue, Some(note))
    }

    pub fn major_category(&self, category_raw: &str) -> String {
        let label = strip_code_prefix(category_raw);
        let lower = label.to_lowercase();
        let major = if self.markers.iter().any(|m| lower.contains(m.as_str())) {
            label.rsplit(':').next().unwrap_or(label)
        } else {
            label.split(':').next().unwrap_or(label)
        };
        let major = major.trim();
        if major.is_empty() {
            label.to_string()
        } else {
            major.to_string()
        }
    }

    /// Fill in `category_major`, `kind`, `revenue` and `cost`.
    pub fn categorize(&self, txn: &mut Transaction) -> Result<()> {
        let amount = txn.amount.ok_or_else(|| LedgerError::MissingAmount {
            line: txn.line,
            description: txn.source.clone(),
        })?;
        let (kind, review) = self.kind(&txn.category_raw, &txn.source);

        txn.category_major = self.major_category(&txn.category_raw);
        txn.kind = Some(kind);
        match kind {
            Kind::Revenue => {
                txn.revenue = amount;
                txn.cost = Decimal::ZERO;
            }
            Kind::Cost => {
                txn.revenue = Decimal::ZERO;
                txn.cost = negate(amount);
            }
        }
        if let Some(note) = &review {
            log::warn!("line {}: {note}; flagged for review", txn.line);
        }
        txn.review = review;
        Ok(())
    }

    pub fn categorize_all(&self, txns: &mut [Transaction]) -> Result<()> {
        for txn in txns.iter_mut() {
            self.categorize(txn)?;
        }
        let flagged = txns.iter().filter(|t| t.review.is_some()).count();
        log::info!("{} transactions categorized, {flagged} flagged for review", txns.len());
        Ok(())
    }
}
