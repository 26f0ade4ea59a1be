pub mod traits;
pub mod html;
pub mod feed;
pub mod webpage;
pub mod category_api;
pub mod registry;

pub use traits::SourceAdapter;
pub use feed::FeedAdapter;
pub use webpage::WebpageAdapter;
pub use category_api::{CategoryApiAdapter, CategoryConfig};
pub use registry::SourceRegistry;
