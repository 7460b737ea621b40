pub mod backlog;
pub mod case_id;
pub mod case_sync;
pub mod config;
pub mod errors;
pub mod fingerprint;
pub mod model;
pub mod providers;
pub mod reconcile;
pub mod report;
pub mod storage;
