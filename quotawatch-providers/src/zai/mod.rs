//! z.ai (Zhipu GLM coding plan) provider.
//!
//! A single API-token strategy reads the quota endpoint. The key comes
//! from settings first, then `Z_AI_API_KEY`, `ZAI_API_TOKEN` or
//! `ZAI_API_KEY`.

mod api;
mod descriptor;
mod strategies;

pub use api::{QuotaData, QuotaLimit, QuotaResponse, TOKEN_ENV_KEYS, parse_quota_response};
pub use descriptor::zai_descriptor;
pub use strategies::ZaiApiStrategy;
