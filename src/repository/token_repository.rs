use super::models::{NetworkTokenSet, Token};
use crate::clock::unix_millis;
use alloy_primitives::Address;
use anyhow::Result;
use rusqlite::{Row, params};
use std::str::FromStr;

pub struct TokenRepository<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> TokenRepository<'a> {
    const INSERT_TOKEN: &'static str = "INSERT OR IGNORE INTO tokens (
            chain_id, address, symbol, name, decimals, discovered_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

    // rowid follows first insertion, which keeps discovery order stable.
    const SELECT_ALL: &'static str = "SELECT chain_id, address, symbol, name, decimals
         FROM tokens ORDER BY chain_id, rowid";

    const SELECT_BY_CHAIN: &'static str = "SELECT chain_id, address, symbol, name, decimals
         FROM tokens WHERE chain_id = ?1 ORDER BY rowid LIMIT ?2 OFFSET ?3";

    pub fn new(conn: &'a rusqlite::Connection) -> Self {
        Self { conn }
    }

    pub fn insert_batch(&self, tokens: &[Token]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let discovered_at = unix_millis() / 1000;
        let mut count = 0;

        {
            let mut stmt = tx.prepare(Self::INSERT_TOKEN)?;

            for token in tokens {
                count += stmt.execute(params![
                    token.chain_id,
                    format!("{:?}", token.address),
                    token.symbol,
                    token.name,
                    token.decimals,
                    discovered_at,
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    pub fn load_all(&self) -> Result<NetworkTokenSet> {
        let mut stmt = self.conn.prepare(Self::SELECT_ALL)?;
        let tokens = stmt
            .query_map([], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut networks = NetworkTokenSet::new();
        for token in tokens {
            networks.entry(token.chain_id).or_default().push(token);
        }
        Ok(networks)
    }

    pub fn list_for_chain(&self, chain_id: u64, limit: usize, offset: usize) -> Result<Vec<Token>> {
        let mut stmt = self.conn.prepare(Self::SELECT_BY_CHAIN)?;
        let tokens = stmt
            .query_map(params![chain_id, limit, offset], Self::row_to_token)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tokens)
    }

    fn row_to_token(row: &Row) -> rusqlite::Result<Token> {
        let address = Address::from_str(&row.get::<_, String>(1)?).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Token {
            chain_id: row.get(0)?,
            address,
            symbol: row.get(2)?,
            name: row.get(3)?,
            decimals: row.get(4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::Database;

    fn token(chain_id: u64, byte: u8, symbol: &str) -> Token {
        Token {
            chain_id,
            address: Address::repeat_byte(byte),
            symbol: symbol.to_string(),
            name: format!("{symbol} Token"),
            decimals: 18,
        }
    }

    #[test]
    fn test_load_all_groups_by_chain_in_insertion_order() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let repo = TokenRepository::new(conn);
            repo.insert_batch(&[token(10, 0x03, "C"), token(1, 0x02, "B"), token(1, 0x01, "A")])?;

            let networks = repo.load_all()?;
            assert_eq!(networks.len(), 2);
            let symbols: Vec<_> = networks[&1].iter().map(|t| t.symbol.as_str()).collect();
            assert_eq!(symbols, vec!["B", "A"]);
            assert_eq!(networks[&10][0].address, Address::repeat_byte(0x03));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_insert_ignores_duplicates() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            let repo = TokenRepository::new(conn);
            assert_eq!(repo.insert_batch(&[token(1, 0x01, "A")])?, 1);
            assert_eq!(repo.insert_batch(&[token(1, 0x01, "A2")])?, 0);

            let tokens = repo.list_for_chain(1, 10, 0)?;
            assert_eq!(tokens.len(), 1);
            assert_eq!(tokens[0].symbol, "A");
            Ok(())
        })
        .unwrap();
    }
}
