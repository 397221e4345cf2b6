pub mod http_client;
pub mod notifier;
pub mod pacer;
pub mod retry;
