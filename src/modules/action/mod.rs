pub mod delivery;
pub mod history;
pub mod report;

pub use delivery::{DeliveryStatus, ReportDelivery};
pub use history::{HistoryLogger, Trend};
