use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::settings::{builtin_profiles, load_settings, RevenueRule};

fn describe_rule(rule: &RevenueRule) -> String {
    match rule {
        RevenueRule::CategoryContains { pattern } => format!("category ~ {pattern:?}"),
        RevenueRule::SourceContains { pattern } => format!("source ~ {pattern:?}"),
        RevenueRule::SourceMatches { pattern } => format!("source /{pattern}/"),
    }
}

pub fn run() -> Result<()> {
    let settings = load_settings()?;
    let mut profiles = builtin_profiles();
    profiles.extend(settings.profiles.clone());

    let mut table = Table::new();
    table.set_header(vec!["Profile", "Banner", "Amount", "Revenue rules", "Dropped"]);
    for (name, p) in &profiles {
        let label = if *name == settings.default_profile {
            format!("{name} *").green().bold().to_string()
        } else {
            name.clone()
        };
        table.add_row(vec![
            Cell::new(label),
            Cell::new(p.banner_lines),
            Cell::new(p.amount.column_names().join(" / ")),
            Cell::new(
                p.revenue_rules
                    .iter()
                    .map(describe_rule)
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Cell::new(p.drop_columns.join(", ")),
        ]);
    }
    println!("{table}");
    Ok(())
}
