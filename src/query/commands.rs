use crate::query::formatters::{OutputFormat, format_prices, format_stats, format_tokens};
use crate::repository::{PriceRepository, TokenRepository};
use alloy_primitives::Address;
use anyhow::Result;
use std::str::FromStr;

pub struct PageQuery {
    pub chain_id: u64,
    pub limit: usize,
    pub offset: usize,
}

fn parse_address(address: &str) -> Result<Address> {
    Address::from_str(address.trim())
        .map_err(|_| anyhow::anyhow!("Invalid address format: {}", address))
}

pub fn cmd_price(
    price_repo: &PriceRepository,
    chain_id: u64,
    address: &str,
    format: &OutputFormat,
) -> Result<String> {
    let address = parse_address(address)?;
    let price = price_repo.get_price(chain_id, &address)?;
    Ok(format_prices(price.as_slice(), format))
}

pub fn cmd_prices(price_repo: &PriceRepository, query: PageQuery, format: &OutputFormat) -> Result<String> {
    let prices = price_repo.list_prices(query.chain_id, query.limit, query.offset)?;
    Ok(format_prices(&prices, format))
}

pub fn cmd_tokens(token_repo: &TokenRepository, query: PageQuery, format: &OutputFormat) -> Result<String> {
    let tokens = token_repo.list_for_chain(query.chain_id, query.limit, query.offset)?;
    Ok(format_tokens(&tokens, format))
}

pub fn cmd_stats(price_repo: &PriceRepository, format: &OutputFormat) -> Result<String> {
    let stats = price_repo.get_statistics()?;
    Ok(format_stats(&stats, format))
}
