//! Tier resolution policy.
//!
//! Maps a provider product name to a `(tier, credit limit)` pair. Matching is
//! case-insensitive substring classification against an ordered rule table;
//! the first matching rule wins and anything unmatched falls back to the
//! basic tier. The table is configuration: adding a tier is a new rule, not
//! new control flow.
//!
//! The free tier is never produced here. Free is what an account is when no
//! paid subscription event has claimed it.

use serde::{Deserialize, Serialize};

use crate::account::{BASIC_TIER_CREDITS, ENTERPRISE_TIER_CREDITS, PREMIUM_TIER_CREDITS};
use crate::Tier;

/// One classification rule: product names containing `needle` map to
/// `(tier, credit_limit)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    /// Substring to look for in the product name (matched case-insensitively).
    pub needle: String,

    /// Tier assigned on match.
    pub tier: Tier,

    /// Credit limit granted on match.
    pub credit_limit: i64,
}

impl TierRule {
    /// Create a rule.
    #[must_use]
    pub fn new(needle: impl Into<String>, tier: Tier, credit_limit: i64) -> Self {
        Self {
            needle: needle.into(),
            tier,
            credit_limit,
        }
    }
}

/// Ordered product-name classification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Rules checked in order; first match wins.
    pub rules: Vec<TierRule>,

    /// Tier for paid products no rule recognizes.
    pub default_tier: Tier,

    /// Credit limit for unrecognized paid products.
    pub default_credit_limit: i64,
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self {
            rules: vec![
                TierRule::new("enterprise", Tier::Enterprise, ENTERPRISE_TIER_CREDITS),
                TierRule::new("premium", Tier::Premium, PREMIUM_TIER_CREDITS),
            ],
            default_tier: Tier::Basic,
            default_credit_limit: BASIC_TIER_CREDITS,
        }
    }
}

impl TierPolicy {
    /// Resolve a product name to its tier and credit limit.
    #[must_use]
    pub fn resolve(&self, product_name: &str) -> (Tier, i64) {
        let haystack = product_name.to_lowercase();
        for rule in &self.rules {
            if haystack.contains(&rule.needle.to_lowercase()) {
                return (rule.tier.clone(), rule.credit_limit);
            }
        }
        (self.default_tier.clone(), self.default_credit_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premium_product_resolves_to_premium() {
        let policy = TierPolicy::default();
        assert_eq!(
            policy.resolve("Acme Premium Plan"),
            (Tier::Premium, PREMIUM_TIER_CREDITS)
        );
    }

    #[test]
    fn basic_product_falls_through_to_default() {
        let policy = TierPolicy::default();
        assert_eq!(policy.resolve("Acme Basic"), (Tier::Basic, BASIC_TIER_CREDITS));
    }

    #[test]
    fn unrecognized_product_gets_the_default() {
        let policy = TierPolicy::default();
        assert_eq!(
            policy.resolve("Mystery Bundle"),
            (Tier::Basic, BASIC_TIER_CREDITS)
        );
        assert_eq!(policy.resolve(""), (Tier::Basic, BASIC_TIER_CREDITS));
    }

    #[test]
    fn matching_ignores_case() {
        let policy = TierPolicy::default();
        assert_eq!(
            policy.resolve("ACME ENTERPRISE (ANNUAL)"),
            (Tier::Enterprise, ENTERPRISE_TIER_CREDITS)
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let policy = TierPolicy::default();
        // "enterprise" is listed before "premium" on purpose.
        assert_eq!(
            policy.resolve("Premium Enterprise Suite"),
            (Tier::Enterprise, ENTERPRISE_TIER_CREDITS)
        );
    }

    #[test]
    fn injected_table_overrides_the_builtin() {
        let policy = TierPolicy {
            rules: vec![TierRule::new("labs", Tier::Enterprise, 50_000)],
            default_tier: Tier::Basic,
            default_credit_limit: 250,
        };
        assert_eq!(policy.resolve("Acme Labs Beta"), (Tier::Enterprise, 50_000));
        assert_eq!(policy.resolve("Acme Premium Plan"), (Tier::Basic, 250));
    }
}
