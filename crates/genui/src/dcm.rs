//! Debt capital markets reference data: issuers, priced deals, investors and the
//! allocation, participation and secondary-market figures derived from them.
//!
//! The issuers, deals and investors are fixed tables. Everything derived from them is a
//! pure function of identifiers, so the same deal always yields the same book and the
//! same secondary curve across restarts.
pub mod deals;
pub mod investors;
pub mod issuers;
pub mod secondary;

use crate::errors::{AgentError, AgentResult};

pub use deals::{Deal, DealQuery, DealSort, DealSummary, MarketSummary};
pub use investors::{Allocation, Behaviour, Investor, InvestorType, Participation};
pub use issuers::{Issuer, IssuerMatch, MatchType, Rating};
pub use secondary::{CurvePoint, PerformancePoint, PerformanceSummary, SectorCurve};

/// Sum of UTF-16 code units, the seed every derived figure starts from.
pub(crate) fn char_code_sum(s: &str) -> u64 {
    s.encode_utf16().map(u64::from).sum()
}

/// Linear congruential draw in `[0, 1)` for step `n` of `seed`.
pub(crate) fn lcg(seed: u64, n: u64) -> f64 {
    ((seed * (n + 1) * 9301 + 49297) % 233_280) as f64 / 233_280.0
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// The in-memory DCM dataset.
#[derive(Debug, Clone)]
pub struct DcmDataset {
    issuers: Vec<Issuer>,
    deals: Vec<Deal>,
    investors: Vec<Investor>,
}

impl Default for DcmDataset {
    fn default() -> Self {
        Self::load()
    }
}

impl DcmDataset {
    pub fn load() -> Self {
        let issuers = issuers::seed();
        let deals = deals::seed(&issuers);
        Self {
            issuers,
            deals,
            investors: investors::seed(),
        }
    }

    pub fn issuers(&self) -> &[Issuer] {
        &self.issuers
    }

    pub fn deals(&self) -> &[Deal] {
        &self.deals
    }

    pub fn investors(&self) -> &[Investor] {
        &self.investors
    }

    pub fn issuer(&self, id: &str) -> AgentResult<&Issuer> {
        self.issuers
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| AgentError::ExecutionError(format!("Issuer not found: {}", id)))
    }

    pub fn deal(&self, id: &str) -> AgentResult<&Deal> {
        self.deals
            .iter()
            .find(|d| d.id == id)
            .ok_or_else(|| AgentError::ExecutionError(format!("Deal not found: {}", id)))
    }

    pub fn deal_by_isin(&self, isin: &str) -> AgentResult<&Deal> {
        self.deals
            .iter()
            .find(|d| d.isin == isin)
            .ok_or_else(|| AgentError::ExecutionError(format!("Bond not found: {}", isin)))
    }

    pub fn investor(&self, id: &str) -> AgentResult<&Investor> {
        self.investors
            .iter()
            .find(|i| i.id == id)
            .ok_or_else(|| AgentError::ExecutionError(format!("Investor not found: {}", id)))
    }

    pub fn sector_of(&self, issuer_id: &str) -> Option<&str> {
        self.issuers
            .iter()
            .find(|i| i.id == issuer_id)
            .map(|i| i.sector.as_str())
    }

    pub fn search_issuers(&self, query: &str) -> Vec<IssuerMatch<'_>> {
        issuers::search(&self.issuers, query)
    }

    /// Issuers in `sector` other than `exclude`, in table order.
    pub fn peers(&self, sector: &str, exclude: &str) -> Vec<&Issuer> {
        self.issuers
            .iter()
            .filter(|i| i.sector == sector && i.id != exclude)
            .collect()
    }

    /// An issuer's deals, most recently priced first.
    pub fn deals_for_issuer(&self, issuer_id: &str, limit: Option<usize>) -> Vec<&Deal> {
        let mut deals: Vec<&Deal> = self.deals.iter().filter(|d| d.issuer_id == issuer_id).collect();
        deals.sort_by(|a, b| b.pricing_date.cmp(&a.pricing_date));
        if let Some(limit) = limit.filter(|l| *l > 0) {
            deals.truncate(limit);
        }
        deals
    }

    pub fn query_deals(&self, query: &DealQuery) -> Vec<&Deal> {
        deals::query(self, query)
    }

    pub fn allocations(&self, deal: &Deal) -> Vec<Allocation> {
        investors::allocations_for_deal(&self.investors, deal)
    }

    pub fn participation_history(
        &self,
        investor_id: Option<&str>,
        issuer_id: Option<&str>,
    ) -> Vec<Participation> {
        investors::participation_history(self, investor_id, issuer_id)
    }

    pub fn flip_score(&self, investor_id: &str) -> u32 {
        investors::flip_score(&self.participation_history(Some(investor_id), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lcg_stays_in_unit_interval() {
        let seed = char_code_sum("bmw-001");
        for n in 0..500 {
            let r = lcg(seed, n);
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_char_code_sum() {
        assert_eq!(char_code_sum("ab"), 97 + 98);
    }

    #[test]
    fn test_lookups_report_missing_ids() {
        let data = DcmDataset::load();
        assert_eq!(data.issuer("bmw-ag").unwrap().short_name, "BMW AG");
        assert_eq!(
            data.issuer("acme").unwrap_err(),
            AgentError::ExecutionError("Issuer not found: acme".to_string())
        );
        assert!(data.deal_by_isin("XS0000000000").is_err());
    }

    #[test]
    fn test_deals_for_issuer_newest_first() {
        let data = DcmDataset::load();
        let ids: Vec<&str> = data
            .deals_for_issuer("bmw-ag", None)
            .iter()
            .map(|d| d.id.as_str())
            .collect();
        assert_eq!(ids, vec!["bmw-001", "bmw-002", "bmw-003", "bmw-004"]);
        assert_eq!(data.deals_for_issuer("bmw-ag", Some(2)).len(), 2);
    }

    #[test]
    fn test_peers_exclude_issuer() {
        let data = DcmDataset::load();
        let peers: Vec<&str> = data
            .peers("Automobiles", "bmw-ag")
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(
            peers,
            vec!["volkswagen-ag", "mercedes-benz-ag", "porsche-ag", "audi-ag"]
        );
    }
}
