pub mod crypto;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod store;

pub use crypto::Cipher;
pub use error::{ExportError, StoreError, WipeError};
pub use export::{export_records, ExportFormat};
pub use fingerprint::fingerprint;
pub use store::{DataStore, SaveReport, ScanRecord, StoreStats, StoredRecord, ENCRYPTED_PLACEHOLDER};
