use crate::clock::unix_millis;
use crate::collaborators::PriceStore;
use crate::repository::{Database, PriceRecord, PriceRepository};
use anyhow::Result;
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

pub struct SqlitePriceStore {
    db: Database,
}

impl SqlitePriceStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn store_prices(&self, chain_id: u64, records: Vec<PriceRecord>) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let db = self.db.clone();

        // Database operations are blocking
        tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let updated_at = unix_millis() / 1000;
            let written = db.with_conn(|conn| {
                PriceRepository::new(conn).upsert_batch(&records, updated_at)
            })?;
            debug!(
                "Chain {}: stored {} prices in {:?}",
                chain_id,
                written,
                start.elapsed()
            );
            Ok::<_, anyhow::Error>(written)
        })
        .await?
    }
}
