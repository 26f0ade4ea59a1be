mod connection;
mod article_repository;

pub use connection::SqliteStorage;
pub use article_repository::{article_id, SqliteArticleRepository};
