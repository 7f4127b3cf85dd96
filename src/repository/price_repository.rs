use super::models::{PriceRecord, StoredPrice};
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{OptionalExtension, Row, params};
use std::str::FromStr;

pub struct PriceRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> PriceRepository<'a> {
    const UPSERT_PRICE: &'static str = "INSERT OR REPLACE INTO prices (
            chain_id, address, price, symbol, source, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    const SELECT_PRICE: &'static str =
        "SELECT chain_id, address, price, symbol, source, updated_at FROM prices";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Replaces every given record in one transaction. Returns rows written.
    pub fn upsert_batch(&self, records: &[PriceRecord], updated_at: u64) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(Self::UPSERT_PRICE)?;

            for record in records {
                let (symbol, source) = match &record.metadata {
                    Some(meta) => (meta.symbol.clone(), Some(meta.source.clone())),
                    None => (None, None),
                };
                count += stmt.execute(params![
                    record.chain_id,
                    format!("{:?}", record.address),
                    record.price,
                    symbol,
                    source,
                    updated_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    pub fn get_price(&self, chain_id: u64, address: &Address) -> Result<Option<StoredPrice>> {
        let query = format!("{} WHERE chain_id = ?1 AND address = ?2", Self::SELECT_PRICE);
        let price = self
            .conn
            .query_row(
                &query,
                params![chain_id, format!("{address:?}")],
                Self::row_to_price,
            )
            .optional()?;
        Ok(price)
    }

    pub fn list_prices(&self, chain_id: u64, limit: usize, offset: usize) -> Result<Vec<StoredPrice>> {
        let query = format!(
            "{} WHERE chain_id = ?1 ORDER BY address LIMIT ?2 OFFSET ?3",
            Self::SELECT_PRICE
        );
        let mut stmt = self.conn.prepare(&query)?;
        let prices = stmt
            .query_map(params![chain_id, limit, offset], Self::row_to_price)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(prices)
    }

    pub fn get_statistics(&self) -> Result<PriceStats> {
        let (total_prices, oldest_update, newest_update): (usize, Option<u64>, Option<u64>) =
            self.conn.query_row(
                "SELECT COUNT(*), MIN(updated_at), MAX(updated_at) FROM prices",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let mut stmt = self
            .conn
            .prepare("SELECT chain_id, COUNT(*) FROM prices GROUP BY chain_id ORDER BY chain_id")?;
        let per_chain = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(u64, usize)>, _>>()?;

        Ok(PriceStats {
            total_prices,
            per_chain,
            oldest_update,
            newest_update,
        })
    }

    fn row_to_price(row: &Row) -> rusqlite::Result<StoredPrice> {
        let address = Address::from_str(&row.get::<_, String>(1)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(StoredPrice {
            chain_id: row.get(0)?,
            address,
            price: row.get(2)?,
            symbol: row.get(3)?,
            source: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

#[derive(Debug)]
pub struct PriceStats {
    pub total_prices: usize,
    pub per_chain: Vec<(u64, usize)>,
    pub oldest_update: Option<u64>,
    pub newest_update: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Database, PriceMetadata};

    fn record(chain_id: u64, byte: u8, price: f64) -> PriceRecord {
        PriceRecord {
            chain_id,
            address: Address::repeat_byte(byte),
            price,
            metadata: Some(PriceMetadata {
                symbol: Some("TKN".to_string()),
                source: "test".to_string(),
            }),
        }
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let repo = PriceRepository::new(conn);
            repo.upsert_batch(&[record(1, 0xaa, 2.5)], 100)?;

            let mut replacement = record(1, 0xaa, 3.0);
            replacement.metadata = None;
            repo.upsert_batch(&[replacement], 200)?;

            let stored = repo.get_price(1, &Address::repeat_byte(0xaa))?.unwrap();
            assert_eq!(stored.price, 3.0);
            assert_eq!(stored.symbol, None);
            assert_eq!(stored.updated_at, 200);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_statistics_per_chain() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let repo = PriceRepository::new(conn);
            repo.upsert_batch(&[record(1, 0x01, 1.0), record(1, 0x02, 2.0)], 10)?;
            repo.upsert_batch(&[record(56, 0x01, 1.0)], 20)?;

            let stats = repo.get_statistics()?;
            assert_eq!(stats.total_prices, 3);
            assert_eq!(stats.per_chain, vec![(1, 2), (56, 1)]);
            assert_eq!(stats.oldest_update, Some(10));
            assert_eq!(stats.newest_update, Some(20));

            assert!(repo.get_price(10, &Address::repeat_byte(0x01))?.is_none());
            assert_eq!(repo.list_prices(1, 1, 1)?.len(), 1);
            Ok(())
        })
        .unwrap();
    }
}
