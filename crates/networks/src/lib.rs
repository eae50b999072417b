pub mod control;
pub mod fetcher;
pub mod tor;

pub use self::control::ControlClient;
pub use self::fetcher::{FetchPolicy, Fetcher, Jitter, Pacer};
pub use self::tor::TorGateway;
