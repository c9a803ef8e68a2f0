// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # quotawatch Core
//!
//! Core types, models, and traits shared by every quotawatch crate.
//!
//! ## Key Types
//!
//! ### Provider Types
//! - [`ProviderKind`] - Enum of supported providers
//! - [`ProviderIdentity`] - Account identity (siloed per provider)
//! - [`ProviderMetadata`] - Static display info for a provider
//!
//! ### Usage Types
//! - [`UsageSnapshot`] - Primary/secondary/tertiary windows plus identity
//! - [`RateWindow`] - A single rate-limit window
//! - [`Credits`] - Credit balances
//! - [`DashboardInfo`] - Extra metadata scraped from a web dashboard
//!
//! ### Parsing
//! - [`UsageParser`] - `raw text -> snapshot` contract used by strategies
//! - [`ParseError`] - Parser failures

pub mod error;
pub mod models;
pub mod traits;

pub use error::{CoreError, ParseError};

pub use models::{
    // Provider types
    LoginMethod,
    ProviderIdentity,
    ProviderKind,
    ProviderMetadata,
    // Usage types
    Credits,
    DashboardInfo,
    RateWindow,
    UsageSnapshot,
    // Fetch
    FetchSource,
};

pub use traits::UsageParser;
