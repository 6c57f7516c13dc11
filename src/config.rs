use serde::{Deserialize, Serialize};

use crate::Quota;

/// Rate limiter settings, as they appear in a service's configuration file.
///
/// ```rust
/// # use remote_governor::LimiterConfig;
/// let config: LimiterConfig = serde_json::from_str(r#"{ "qps": 120 }"#).unwrap();
/// assert_eq!(config.key, "");
/// assert_eq!(config.quota().capacity(), 120);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LimiterConfig {
    /// Identity of the rate-limited resource. Empty means the default identity.
    #[serde(default)]
    pub key: String,
    /// Tokens per second, which is also the bucket's capacity.
    pub qps: u32,
}

impl LimiterConfig {
    /// The quota described by this configuration.
    pub fn quota(&self) -> Quota {
        Quota::per_second(self.qps)
    }
}
