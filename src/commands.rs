pub mod export;
pub mod renew;
pub mod search;
pub mod status;
pub mod wipe;
