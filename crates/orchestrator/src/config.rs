use std::time::Duration;

use domain::PricingPolicy;
use resilience::GuardConfig;

/// Tunables of the order workflows.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub pricing: PricingPolicy,
    /// Bound on the whole create workflow.
    pub create_timeout: Duration,
    /// Bound on the whole process workflow.
    pub process_timeout: Duration,
    /// Pending orders placed longer ago than this are cancelled by the
    /// stale-order sweep.
    pub stale_order_age: Duration,
    pub inventory: GuardConfig,
    pub customer: GuardConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            create_timeout: Duration::from_secs(30),
            process_timeout: Duration::from_secs(60),
            stale_order_age: Duration::from_secs(24 * 60 * 60),
            inventory: GuardConfig::default(),
            customer: GuardConfig::default(),
        }
    }
}
