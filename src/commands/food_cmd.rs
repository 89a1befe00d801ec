use anyhow::{Context, Result};
use colored::Colorize;

use crate::food::models::{Analysis, Product};
use crate::state::AppState;

/// Looks up (or imports) the product and prints its current analysis.
pub async fn analyze_ean(state: &AppState, ean: &str) -> Result<String> {
    let product = state
        .products
        .resolve(ean)
        .await
        .with_context(|| format!("Could not resolve EAN {}", ean))?;

    let analysis = state
        .coordinator
        .get_or_refresh_analysis(product.id)
        .await
        .with_context(|| format!("Could not analyze {}", product.name))?;

    Ok(format_report(&product, &analysis))
}

pub fn format_report(product: &Product, analysis: &Analysis) -> String {
    let title = if product.brand.is_empty() {
        product.name.clone()
    } else {
        format!("{} ({})", product.name, product.brand)
    };

    format!(
        "{}\nEAN: {}\nAnalyzed: {}\n\n{}\n{}\n\n{}\n{}\n\n{}\n{}\n",
        format!("🔍 {}", title).bold(),
        product.ean,
        analysis.created_at.format("%Y-%m-%d %H:%M UTC"),
        "Reality check".cyan().bold(),
        analysis.reality_check,
        "Consumption advice".green().bold(),
        analysis.consumption_advice,
        "Health implications".yellow().bold(),
        analysis.health_implications,
    )
}
