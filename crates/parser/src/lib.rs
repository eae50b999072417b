pub mod entities;
pub mod links;
pub mod page;

pub use entities::has_sensitive_identifiers;
pub use links::{extract_links, is_blacklisted, AddressRule};
pub use page::{extract_page_data, MAX_CONTENT_CHARS, MAX_TITLE_CHARS};
