//! Trust score for federated members, derived from review and transaction
//! statistics.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrustInputs {
    pub avg_rating: f64,
    pub review_count: u32,
    pub completion_rate: f64,
    pub transaction_count: u32,
    pub cross_tenant_activity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    New,
    Growing,
    Established,
    Trusted,
    Excellent,
}

impl TrustLevel {
    pub fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            TrustLevel::Excellent
        } else if score >= 60.0 {
            TrustLevel::Trusted
        } else if score >= 40.0 {
            TrustLevel::Established
        } else if score >= 20.0 {
            TrustLevel::Growing
        } else {
            TrustLevel::New
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    pub score: f64,
    pub level: TrustLevel,
    pub review: f64,
    pub transaction: f64,
    pub federation: f64,
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

fn saturating_ratio(count: u32, cap: u32) -> f64 {
    (count as f64 / cap as f64).min(1.0)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn calculate_trust_score(inputs: &TrustInputs) -> TrustScore {
    let rating = clamp_unit(inputs.avg_rating / 5.0);
    let completion = clamp_unit(inputs.completion_rate);

    let review = rating * 30.0 + saturating_ratio(inputs.review_count, 10) * 10.0;
    let transaction = completion * 25.0 + saturating_ratio(inputs.transaction_count, 20) * 15.0;
    let federation = saturating_ratio(inputs.cross_tenant_activity, 5) * 20.0;

    let score = round2((review + transaction + federation).clamp(0.0, 100.0));

    TrustScore {
        score,
        level: TrustLevel::for_score(score),
        review: round2(review),
        transaction: round2(transaction),
        federation: round2(federation),
    }
}
