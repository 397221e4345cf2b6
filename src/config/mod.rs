pub mod settings;
pub mod tickers;

pub use settings::Settings;
pub use tickers::TickerRegistry;
