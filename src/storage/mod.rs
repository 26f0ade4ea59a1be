pub mod traits;
pub mod sqlite;

pub use traits::{ArticleRepository, PurgeReport};
pub use sqlite::{SqliteArticleRepository, SqliteStorage};
