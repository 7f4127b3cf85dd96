use crate::repository::{PriceStats, StoredPrice, Token};
use comfy_table::{Cell, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use csv::Writer;
use serde_json::json;

#[derive(Debug, Clone)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            _ => OutputFormat::Table,
        }
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}

fn finish_csv(wtr: Writer<Vec<u8>>) -> String {
    String::from_utf8(wtr.into_inner().unwrap_or_default()).unwrap_or_default()
}

pub fn format_prices(prices: &[StoredPrice], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => format_prices_table(prices),
        OutputFormat::Json => format_prices_json(prices),
        OutputFormat::Csv => format_prices_csv(prices),
    }
}

fn format_prices_table(prices: &[StoredPrice]) -> String {
    if prices.is_empty() {
        return "No prices found.".to_string();
    }

    let mut table = new_table(vec!["Chain", "Address", "Symbol", "Price (USD)", "Source", "Updated"]);
    for price in prices {
        table.add_row(vec![
            Cell::new(price.chain_id),
            Cell::new(format!("{:#}", price.address)),
            Cell::new(price.symbol.as_deref().unwrap_or("-")),
            Cell::new(format_price(price.price)),
            Cell::new(price.source.as_deref().unwrap_or("-")),
            Cell::new(price.updated_at),
        ]);
    }

    table.to_string()
}

fn format_prices_json(prices: &[StoredPrice]) -> String {
    let json_prices: Vec<_> = prices
        .iter()
        .map(|p| {
            json!({
                "chain_id": p.chain_id,
                "address": format!("{:?}", p.address),
                "symbol": p.symbol,
                "price": p.price,
                "source": p.source,
                "updated_at": p.updated_at,
            })
        })
        .collect();

    serde_json::to_string_pretty(&json_prices).unwrap_or_else(|_| "[]".to_string())
}

fn format_prices_csv(prices: &[StoredPrice]) -> String {
    let mut wtr = Writer::from_writer(vec![]);
    let _ = wtr.write_record(["chain_id", "address", "symbol", "price", "source", "updated_at"]);

    for price in prices {
        let _ = wtr.write_record([
            price.chain_id.to_string(),
            format!("{:?}", price.address),
            price.symbol.clone().unwrap_or_default(),
            price.price.to_string(),
            price.source.clone().unwrap_or_default(),
            price.updated_at.to_string(),
        ]);
    }

    finish_csv(wtr)
}

pub fn format_tokens(tokens: &[Token], format: &OutputFormat) -> String {
    match format {
        OutputFormat::Table => {
            if tokens.is_empty() {
                return "No tokens found.".to_string();
            }
            let mut table = new_table(vec!["Chain", "Address", "Symbol", "Name", "Decimals"]);
            for token in tokens {
                table.add_row(vec![
                    Cell::new(token.chain_id),
                    Cell::new(format!("{:#}", token.address)),
                    Cell::new(&token.symbol),
                    Cell::new(&token.name),
                    Cell::new(token.decimals),
                ]);
            }
            table.to_string()
        }
        OutputFormat::Json => {
            serde_json::to_string_pretty(tokens).unwrap_or_else(|_| "[]".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["chain_id", "address", "symbol", "name", "decimals"]);
            for token in tokens {
                let _ = wtr.write_record([
                    &token.chain_id.to_string(),
                    &format!("{:?}", token.address),
                    &token.symbol,
                    &token.name,
                    &token.decimals.to_string(),
                ]);
            }
            finish_csv(wtr)
        }
    }
}

pub fn format_stats(stats: &PriceStats, format: &OutputFormat) -> String {
    let oldest = stats
        .oldest_update
        .map_or("N/A".to_string(), |t| t.to_string());
    let newest = stats
        .newest_update
        .map_or("N/A".to_string(), |t| t.to_string());

    match format {
        OutputFormat::Table => {
            let mut table = new_table(vec!["Metric", "Value"]);
            table.add_row(vec![Cell::new("Total Prices"), Cell::new(stats.total_prices)]);
            table.add_row(vec![
                Cell::new("Networks"),
                Cell::new(stats.per_chain.len()),
            ]);
            for (chain_id, count) in &stats.per_chain {
                table.add_row(vec![
                    Cell::new(format!("  Chain {chain_id}")),
                    Cell::new(count),
                ]);
            }
            table.add_row(vec![Cell::new("Oldest Update"), Cell::new(&oldest)]);
            table.add_row(vec![Cell::new("Newest Update"), Cell::new(&newest)]);
            table.to_string()
        }
        OutputFormat::Json => {
            let per_chain: serde_json::Map<String, serde_json::Value> = stats
                .per_chain
                .iter()
                .map(|(chain_id, count)| (chain_id.to_string(), json!(count)))
                .collect();
            serde_json::to_string_pretty(&json!({
                "total_prices": stats.total_prices,
                "per_chain": per_chain,
                "oldest_update": stats.oldest_update,
                "newest_update": stats.newest_update,
            }))
            .unwrap_or_else(|_| "{}".to_string())
        }
        OutputFormat::Csv => {
            let mut wtr = Writer::from_writer(vec![]);
            let _ = wtr.write_record(["metric", "value"]);
            let _ = wtr.write_record(["total_prices", &stats.total_prices.to_string()]);
            for (chain_id, count) in &stats.per_chain {
                let _ = wtr.write_record([format!("chain_{chain_id}"), count.to_string()]);
            }
            let _ = wtr.write_record(["oldest_update", &oldest]);
            let _ = wtr.write_record(["newest_update", &newest]);
            finish_csv(wtr)
        }
    }
}

/// Prices below a cent keep significant digits instead of rounding to zero.
fn format_price(price: f64) -> String {
    if price != 0.0 && price.abs() < 0.01 {
        format!("{price:.8}")
    } else {
        format!("{price:.4}")
    }
}
