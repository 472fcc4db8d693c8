//! Static cost estimates for image generation.
//!
//! Figures are estimates only: the provider picks the real output size and
//! bills on its own terms. Reports must label them as such.

use serde::{Deserialize, Serialize};

use crate::domain::assets::ResolutionTier;

/// Label attached to every cost figure shown to users.
pub const ESTIMATE_LABEL: &str = "estimated, not billing-accurate";

/// One row of the pricing table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    pub model: &'static str,
    pub price_per_million_tokens: f64,
    /// Expected output tokens for 1K, 2K and 4K images.
    pub output_tokens: [u32; 3],
}

impl ModelPricing {
    pub fn expected_output_tokens(&self, tier: ResolutionTier) -> u32 {
        self.output_tokens[tier_index(tier)]
    }
}

/// Known image models, matched by prefix so dated preview suffixes still hit.
pub const PRICING: &[ModelPricing] = &[
    ModelPricing {
        model: "gemini-3-pro-image",
        price_per_million_tokens: 120.0,
        output_tokens: [1120, 1120, 2000],
    },
    ModelPricing {
        model: "gemini-2.5-flash-image",
        price_per_million_tokens: 30.0,
        output_tokens: [1290, 1290, 1290],
    },
];

/// Token counts used when a model is priced through an override.
const FALLBACK_OUTPUT_TOKENS: [u32; 3] = [1120, 1120, 2000];

const fn tier_index(tier: ResolutionTier) -> usize {
    match tier {
        ResolutionTier::OneK => 0,
        ResolutionTier::TwoK => 1,
        ResolutionTier::FourK => 2,
    }
}

/// A cost estimate for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub expected_output_tokens: u32,
    pub usd: f64,
}

/// Pricing lookups with an optional per-million override.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PricingTable {
    price_override: Option<f64>,
}

impl PricingTable {
    pub fn new(price_per_million_override: Option<f64>) -> Self {
        Self {
            price_override: price_per_million_override.filter(|p| p.is_finite() && *p >= 0.0),
        }
    }

    pub fn lookup(model: &str) -> Option<&'static ModelPricing> {
        let model = model.strip_prefix("models/").unwrap_or(model);
        PRICING.iter().find(|row| model.starts_with(row.model))
    }

    /// `expected_output_tokens(tier) / 1e6 * price_per_million(model)`.
    ///
    /// `None` when the model is unknown and no override is configured.
    pub fn estimate(&self, model: &str, tier: ResolutionTier) -> Option<CostEstimate> {
        let row = Self::lookup(model);
        let tokens = row.map_or(FALLBACK_OUTPUT_TOKENS[tier_index(tier)], |r| {
            r.expected_output_tokens(tier)
        });
        let price = self.price_override.or(row.map(|r| r.price_per_million_tokens))?;

        Some(CostEstimate {
            expected_output_tokens: tokens,
            usd: f64::from(tokens) / 1_000_000.0 * price,
        })
    }
}
