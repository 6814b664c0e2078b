use anyhow::Result;
use chrono::NaiveDate;
use std::env;
use tracing::{error, info};
use velonorth::{
    fx::FxClient,
    kpi::{load_presentation, summarize, SalesFilter, SalesSummary},
    logging::init_logging,
    Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = env::args().nth(1).unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;
    let _guard = init_logging(&config.logging)?;

    let tables = load_presentation(&config.data_modelling.presentation_path)?;
    let filter = SalesFilter {
        date_range: tables.date_bounds()?,
        ..SalesFilter::default()
    };
    let summary = summarize(&tables, &filter)?;
    info!(orders = summary.total_orders, "sales summary computed");

    let mut currency = "USD".to_string();
    let mut shown = summary.clone();
    if let Some(fx_cfg) = &config.fx {
        currency = fx_cfg.base_currency.to_uppercase();
        if let Some(target) = &fx_cfg.target_currency {
            let fx = FxClient::from_config(fx_cfg)?;
            match fx.rate(&fx_cfg.base_currency, target).await {
                Ok(rate) => {
                    info!(base = %currency, target = %target, rate, "converting figures");
                    shown = summary.converted(rate);
                    currency = target.to_uppercase();
                }
                Err(e) => {
                    error!(error = ?e, "exchange rate lookup failed");
                    println!("!!! could not fetch exchange rates; figures stay in {} !!!", currency);
                }
            }
        }
    }

    print_summary(&shown, &currency);
    Ok(())
}

fn print_summary(s: &SalesSummary, currency: &str) {
    println!("VeloNorth sales summary ({})", currency);
    println!("  total revenue     {:>16.2}", s.total_revenue);
    println!("  total orders      {:>16}", s.total_orders);
    println!("  avg order value   {:>16.2}", s.avg_order_value);
    println!("  total quantity    {:>16.0}", s.total_quantity);

    println!("\nrevenue by category");
    for (category, revenue) in &s.revenue_by_category {
        println!("  {:<24} {:>16.2}", category, revenue);
    }
    println!("\nrevenue by country");
    for (country, revenue) in &s.revenue_by_country {
        println!("  {:<24} {:>16.2}", country, revenue);
    }
    println!("\nmonthly revenue");
    for (month, revenue) in &s.monthly_revenue {
        println!("  {:<24} {:>16.2}", month_label(*month), revenue);
    }
}

fn month_label(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}
