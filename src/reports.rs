use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::models::Transaction;

/// Months of net used for the burn-rate median.
pub const RUNWAY_WINDOW: usize = 6;

// ---------------------------------------------------------------------------
// Monthly summary
// ---------------------------------------------------------------------------

pub struct MonthSummary {
    /// `YYYY-MM`
    pub month: String,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub net: Decimal,
    /// Running sum of `net`, i.e. cash on hand.
    pub cumulative: Decimal,
    /// Median net over the trailing window; `None` until the window fills.
    pub median_net: Option<Decimal>,
    /// Months of cash left at the median burn; `None` while not burning.
    pub runway: Option<Decimal>,
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn median(values: &[Decimal]) -> Decimal {
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / Decimal::TWO
    } else {
        sorted[mid]
    }
}

/// Per-month revenue, cost, net, cash on hand and runway. Months without
/// transactions between the first and last are reported as zero.
pub fn monthly_summary(txns: &[Transaction]) -> Vec<MonthSummary> {
    let mut totals: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();
    for t in txns {
        let entry = totals
            .entry((t.date.year(), t.date.month()))
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 += t.revenue;
        entry.1 += t.cost;
    }

    let (Some(&first), Some(&last)) = (totals.keys().next(), totals.keys().next_back()) else {
        return Vec::new();
    };

    let mut months = Vec::new();
    let mut nets: Vec<Decimal> = Vec::new();
    let mut cumulative = Decimal::ZERO;
    let (mut year, mut month) = first;
    loop {
        let (revenue, cost) = totals
            .get(&(year, month))
            .copied()
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));
        let net = revenue - cost;
        cumulative += net;
        nets.push(net);

        let median_net = (nets.len() >= RUNWAY_WINDOW)
            .then(|| median(&nets[nets.len() - RUNWAY_WINDOW..]));
        let runway = median_net
            .filter(|m| m.is_sign_negative() && !m.is_zero())
            .map(|m| cumulative / -m);

        months.push(MonthSummary {
            month: format!("{year:04}-{month:02}"),
            revenue,
            cost,
            net,
            cumulative,
            median_net,
            runway,
        });

        if (year, month) == last {
            break;
        }
        (year, month) = next_month(year, month);
    }
    months
}

// ---------------------------------------------------------------------------
// Category totals
// ---------------------------------------------------------------------------

pub struct CategoryTotal {
    pub name: String,
    pub revenue: Decimal,
    pub cost: Decimal,
    pub count: usize,
}

/// Revenue and cost per major category, largest cost first.
pub fn category_totals(txns: &[Transaction]) -> Vec<CategoryTotal> {
    let mut by_name: HashMap<&str, CategoryTotal> = HashMap::new();
    for t in txns {
        let entry = by_name
            .entry(t.category_major.as_str())
            .or_insert_with(|| CategoryTotal {
                name: t.category_major.clone(),
                revenue: Decimal::ZERO,
                cost: Decimal::ZERO,
                count: 0,
            });
        entry.revenue += t.revenue;
        entry.cost += t.cost;
        entry.count += 1;
    }
    let mut totals: Vec<CategoryTotal> = by_name.into_values().collect();
    totals.sort_by(|a, b| {
        b.cost
            .cmp(&a.cost)
            .then_with(|| b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    totals
}

/// Earliest and latest transaction dates.
pub fn date_range(txns: &[Transaction]) -> Option<(NaiveDate, NaiveDate)> {
    let first = txns.iter().map(|t| t.date).min()?;
    let last = txns.iter().map(|t| t.date).max()?;
    Some((first, last))
}
