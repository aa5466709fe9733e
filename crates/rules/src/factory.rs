use crate::{CaptainAmerica, IronMan, TradeRule};
use anyhow::Result;
use core_types::RuleKind;
use database::RuleStore;
use std::sync::Arc;

/// Builds the rule engines configured for one (instrument, granularity) pair.
pub fn create_rules(
    kinds: &[RuleKind],
    store: Arc<dyn RuleStore>,
    order_lot: i64,
) -> Result<Vec<Box<dyn TradeRule>>> {
    let mut active_rules: Vec<Box<dyn TradeRule>> = Vec::new();

    for kind in kinds {
        if active_rules.iter().any(|r| r.kind() == *kind) {
            anyhow::bail!("Rule configured twice: {}", kind);
        }
        let rule: Box<dyn TradeRule> = match kind {
            RuleKind::CaptainAmerica => Box::new(CaptainAmerica::new(store.clone())),
            RuleKind::IronMan => Box::new(IronMan::new(store.clone(), order_lot)),
        };
        active_rules.push(rule);
    }

    if active_rules.is_empty() {
        anyhow::bail!("No rules configured.");
    }
    Ok(active_rules)
}
