pub mod database;
pub mod models;
pub mod price_repository;
pub mod token_repository;

pub use database::Database;
pub use models::{NetworkTokenSet, PriceMap, PriceMetadata, PriceRecord, StoredPrice, Token};
pub use price_repository::{PriceRepository, PriceStats};
pub use token_repository::TokenRepository;
