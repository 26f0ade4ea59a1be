pub mod article;
pub mod source;

pub use article::{host_of, Article};
pub use source::{Batch, FetchResult, FetchUnit, SourceKind, UpstreamClass};
