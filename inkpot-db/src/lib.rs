pub mod client;
pub mod memory;
pub mod postgres;
mod record;

pub use client::{DbClient, DbError};
pub use memory::MemoryClient;
pub use postgres::PgClient;
