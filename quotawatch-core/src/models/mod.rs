//! Domain models for quotawatch.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider types (ProviderKind, Identity, Metadata)
//! - [`usage`] - Usage types (UsageSnapshot, RateWindow, Credits)
//! - [`status`] - How data was fetched (FetchSource)

mod provider;
mod status;
mod usage;

pub use provider::{LoginMethod, ProviderIdentity, ProviderKind, ProviderMetadata};
pub use status::FetchSource;
pub use usage::{Credits, DashboardInfo, RateWindow, UsageSnapshot};
