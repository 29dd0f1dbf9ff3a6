use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};
use rust_decimal::Decimal;

use crate::error::Result;
use crate::fmt::{money, months};
use crate::importer::load_statement;
use crate::models::Transaction;
use crate::reports;
use crate::settings::load_settings;

fn load(file: &str, profile: Option<&str>) -> Result<Vec<Transaction>> {
    let settings = load_settings()?;
    let profile = settings.profile(profile)?;
    load_statement(&PathBuf::from(file), &profile)
}

pub fn monthly(file: &str, profile: Option<&str>) -> Result<()> {
    let txns = load(file, profile)?;
    let summary = reports::monthly_summary(&txns);

    let mut table = Table::new();
    table.set_header(vec!["Month", "Revenue", "Cost", "Net", "Cash on Hand", "6mo Median Net", "Runway"]);
    for m in &summary {
        let net = if m.net.is_sign_negative() && !m.net.is_zero() {
            money(m.net).red().to_string()
        } else {
            money(m.net).green().to_string()
        };
        let runway = match m.runway {
            Some(r) if r < Decimal::from(reports::RUNWAY_WINDOW as u32) => {
                months(r).red().bold().to_string()
            }
            Some(r) => months(r),
            None => String::new(),
        };
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(money(m.revenue)),
            Cell::new(money(m.cost)),
            Cell::new(net),
            Cell::new(money(m.cumulative)),
            Cell::new(m.median_net.map(money).unwrap_or_default()),
            Cell::new(runway),
        ]);
    }

    println!("Monthly Summary\n{table}");
    Ok(())
}

pub fn categories(file: &str, profile: Option<&str>) -> Result<()> {
    let txns = load(file, profile)?;
    let totals = reports::category_totals(&txns);

    let mut table = Table::new();
    table.set_header(vec!["Category", "Count", "Revenue", "Cost"]);
    for item in &totals {
        table.add_row(vec![
            Cell::new(&item.name),
            Cell::new(item.count),
            Cell::new(money(item.revenue)),
            Cell::new(money(item.cost)),
        ]);
    }
    let revenue: Decimal = totals.iter().map(|t| t.revenue).sum();
    let cost: Decimal = totals.iter().map(|t| t.cost).sum();
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(txns.len()),
        Cell::new(money(revenue).green().to_string()),
        Cell::new(money(cost).red().to_string()),
    ]);

    println!("Category Totals\n{table}");
    Ok(())
}
