pub mod aggregator;
pub mod news;
pub mod structs;

pub use aggregator::{aggregate, Aggregation};
pub use news::{FinnhubSource, NewsClient, NewsSource};
pub use structs::NewsBatch;
