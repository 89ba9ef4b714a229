//! Post-extraction fixes for two misplacements the updater is known to make.

use crate::matcher::{CREDITI_PREFIX, INTERESSI_ALTRI_PATH, PROVENTI_DIVERSI_ALTRI_PATH};
use crate::schema::ExtractionConfig;
use crate::template::{get_number, get_path, set_existing_leaf};
use log::{debug, info};
use serde_json::Value;

const ENTRO_KEY: &str = "esigibili_entro_l_esercizio_successivo";

const PROVENTI_DIVERSI_TOTALE_PATH: &str = "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Totale_proventi_diversi_dai_precedenti_immobilizzazioni";
const INTERESSI_TOTALE_LEAF_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Totale_interessi_e_altri_oneri_finanziari";

/// A due-within-the-year amount that tends to land on `source` when it
/// belongs to `destination`, recognisable because it equals the
/// destination's total.
struct MisplacedReceivable {
    source: &'static str,
    destination: &'static str,
    destination_total: &'static str,
}

const MISPLACED_RECEIVABLES: &[MisplacedReceivable] = &[
    MisplacedReceivable {
        source: "Verso_imprese_controllate",
        destination: "Crediti_tributari",
        destination_total: "Totale_crediti_tributari",
    },
    MisplacedReceivable {
        source: "Verso_imprese_collegate",
        destination: "Verso_altri",
        destination_total: "Totale_crediti_verso_altri",
    },
];

/// Amounts involved in the financial "Altri" decision.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AltriAmounts {
    pub proventi_altri: f64,
    pub interessi_altri: f64,
    pub proventi_total: f64,
    pub interessi_total: f64,
}

impl AltriAmounts {
    fn read(tree: &Value) -> Self {
        let value = |path: &str| get_number(tree, path).unwrap_or(0.0);
        Self {
            proventi_altri: value(PROVENTI_DIVERSI_ALTRI_PATH),
            interessi_altri: value(INTERESSI_ALTRI_PATH),
            proventi_total: value(PROVENTI_DIVERSI_TOTALE_PATH),
            interessi_total: value(INTERESSI_TOTALE_LEAF_PATH),
        }
    }

    /// Neither value matches its own branch total but each matches the
    /// other's, so the two rows were read into each other's slot.
    pub fn totals_crossed(&self) -> bool {
        if self.proventi_total <= 0.0 || self.interessi_total <= 0.0 {
            return false;
        }
        let proventi_match = (self.proventi_altri - self.proventi_total).abs() < 1.0;
        let interessi_match = (self.interessi_altri - self.interessi_total).abs() < 1.0;
        !proventi_match
            && !interessi_match
            && (self.proventi_altri - self.interessi_total).abs() < 1.0
            && (self.interessi_altri - self.proventi_total).abs() < 1.0
    }
}

/// Size-based guess at whether the two financial "Altri" values were
/// written the wrong way round.
pub trait AltriPlacement {
    /// Only consulted for XBRL output.
    fn is_swapped(&self, amounts: &AltriAmounts) -> bool;

    /// Whether a "proventi diversi" total is small enough to stand in for an
    /// empty "Altri" row.
    fn is_small_income(&self, value: f64) -> bool;
}

/// Interest expense is usually the large figure and miscellaneous financial
/// income the small one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MagnitudeHeuristic {
    pub threshold: f64,
}

impl MagnitudeHeuristic {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Default for MagnitudeHeuristic {
    fn default() -> Self {
        Self::new(ExtractionConfig::default().altri_magnitude_threshold)
    }
}

impl AltriPlacement for MagnitudeHeuristic {
    fn is_swapped(&self, a: &AltriAmounts) -> bool {
        let swapped = a.proventi_altri >= self.threshold && a.interessi_altri < self.threshold;
        if swapped {
            debug!(
                "Altri swap by magnitude: proventi {} interessi {}",
                a.proventi_altri, a.interessi_altri
            );
        }
        swapped
    }

    fn is_small_income(&self, value: f64) -> bool {
        value > 0.0 && value < self.threshold
    }
}

fn receivable_number(tree: &Value, branch: &str, key: &str) -> Option<f64> {
    get_number(tree, &format!("{}.{}.{}", CREDITI_PREFIX, branch, key))
}

/// The branch's own `Totale_*` leaf, if any.
fn branch_total(tree: &Value, branch: &str) -> Option<f64> {
    get_path(tree, &format!("{}.{}", CREDITI_PREFIX, branch))?
        .as_object()?
        .iter()
        .find(|(key, value)| key.starts_with("Totale_") && value.is_number())
        .and_then(|(_, value)| value.as_f64())
}

/// Moves "esigibili entro" amounts that landed on the controllate/collegate
/// receivables back to the tax and "verso altri" receivables whose totals
/// they equal. Running it twice changes nothing more.
pub fn fix_crediti_mismatches(tree: &mut Value) -> usize {
    let mut moved = 0;

    for rule in MISPLACED_RECEIVABLES {
        let source_entro = receivable_number(tree, rule.source, ENTRO_KEY);
        let destination_entro = receivable_number(tree, rule.destination, ENTRO_KEY);
        let destination_total = receivable_number(tree, rule.destination, rule.destination_total);

        let (Some(amount), Some(dest_entro), Some(dest_total)) = (source_entro, destination_entro, destination_total)
        else {
            continue;
        };
        if amount <= 0.0 || dest_entro != 0.0 || dest_total != amount {
            continue;
        }
        if branch_total(tree, rule.source) == Some(amount) {
            continue;
        }

        let destination = format!("{}.{}.{}", CREDITI_PREFIX, rule.destination, ENTRO_KEY);
        let source = format!("{}.{}.{}", CREDITI_PREFIX, rule.source, ENTRO_KEY);
        if set_existing_leaf(tree, &destination, amount) && set_existing_leaf(tree, &source, 0.0) {
            info!("moved esigibili entro {} from {} to {}", amount, rule.source, rule.destination);
            moved += 1;
        }
    }

    moved
}

/// Puts the two financial "Altri" values back in place.
///
/// The size-based swap is only applied to XBRL output. Swapping values that
/// each match the other branch's total, and filling an empty "proventi
/// diversi" row from a small total, apply to every source.
pub fn fix_altri_swap(tree: &mut Value, is_xbrl: bool) -> bool {
    fix_altri_swap_with(tree, is_xbrl, &MagnitudeHeuristic::default())
}

pub fn fix_altri_swap_with<H: AltriPlacement + ?Sized>(tree: &mut Value, is_xbrl: bool, heuristic: &H) -> bool {
    let mut amounts = AltriAmounts::read(tree);
    let mut changed = false;

    if is_xbrl
        && amounts.proventi_altri > 0.0
        && amounts.proventi_total == 0.0
        && amounts.interessi_altri == 0.0
        && amounts.interessi_total > 0.0
        && (amounts.proventi_altri - amounts.interessi_total).abs() < 1.0
    {
        set_existing_leaf(tree, PROVENTI_DIVERSI_ALTRI_PATH, 0.0);
        set_existing_leaf(tree, INTERESSI_ALTRI_PATH, amounts.interessi_total);
        info!(
            "moved {} from proventi diversi Altri to interessi Altri, matching the interest total",
            amounts.interessi_total
        );
        amounts.proventi_altri = 0.0;
        amounts.interessi_altri = amounts.interessi_total;
        changed = true;
    }

    changed |= fill_proventi_from_total(tree, &mut amounts, heuristic);

    let crossed = amounts.totals_crossed();
    if crossed {
        debug!("Altri swap by totals: each value matches the other branch's total");
    }
    if crossed || (is_xbrl && heuristic.is_swapped(&amounts)) {
        set_existing_leaf(tree, PROVENTI_DIVERSI_ALTRI_PATH, amounts.interessi_altri);
        set_existing_leaf(tree, INTERESSI_ALTRI_PATH, amounts.proventi_altri);
        info!(
            "swapped financial Altri: proventi diversi = {}, interessi = {}",
            amounts.interessi_altri, amounts.proventi_altri
        );
        std::mem::swap(&mut amounts.proventi_altri, &mut amounts.interessi_altri);
        changed = true;
    }

    changed |= fill_proventi_from_total(tree, &mut amounts, heuristic);
    changed
}

fn fill_proventi_from_total<H: AltriPlacement + ?Sized>(tree: &mut Value, amounts: &mut AltriAmounts, heuristic: &H) -> bool {
    if amounts.proventi_altri != 0.0 || !heuristic.is_small_income(amounts.proventi_total) {
        return false;
    }
    if !set_existing_leaf(tree, PROVENTI_DIVERSI_ALTRI_PATH, amounts.proventi_total) {
        return false;
    }
    debug!("proventi diversi Altri was empty, set to total {}", amounts.proventi_total);
    amounts.proventi_altri = amounts.proventi_total;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn crediti(controllate_entro: f64, tributari_entro: f64, tributari_total: f64) -> Value {
        json!({
            "Stato_patrimoniale": {"Attivo": {"Attivo_circolante": {"Crediti": {
                "Verso_imprese_controllate": {
                    "esigibili_entro_l_esercizio_successivo": controllate_entro,
                    "esigibili_oltre_l_esercizio_successivo": 0.0
                },
                "Verso_imprese_collegate": {
                    "esigibili_entro_l_esercizio_successivo": 0.0,
                    "esigibili_oltre_l_esercizio_successivo": 0.0
                },
                "Crediti_tributari": {
                    "esigibili_entro_l_esercizio_successivo": tributari_entro,
                    "esigibili_oltre_l_esercizio_successivo": 0.0,
                    "Totale_crediti_tributari": tributari_total
                },
                "Verso_altri": {
                    "esigibili_entro_l_esercizio_successivo": 0.0,
                    "esigibili_oltre_l_esercizio_successivo": 0.0,
                    "Totale_crediti_verso_altri": 0.0
                }
            }}}}
        })
    }

    fn altri(proventi: f64, interessi: f64, proventi_total: f64, interessi_total: f64) -> Value {
        json!({
            "Conto_economico": {"Proventi_e_oneri_finanziari": {
                "Altri_proventi_finanziari": {"Proventi_diversi_dai_precedenti": {
                    "Altri": proventi,
                    "Totale_proventi_diversi_dai_precedenti_immobilizzazioni": proventi_total
                }},
                "Interessi_e_oneri_finanziari": {
                    "Altri": interessi,
                    "Totale_interessi_e_altri_oneri_finanziari": interessi_total
                }
            }}
        })
    }

    fn entro(tree: &Value, branch: &str) -> f64 {
        receivable_number(tree, branch, ENTRO_KEY).unwrap()
    }

    #[test]
    fn test_misplaced_entro_is_moved() {
        let mut tree = crediti(4200.0, 0.0, 4200.0);
        assert_eq!(fix_crediti_mismatches(&mut tree), 1);
        assert_eq!(entro(&tree, "Crediti_tributari"), 4200.0);
        assert_eq!(entro(&tree, "Verso_imprese_controllate"), 0.0);
    }

    #[test]
    fn test_crediti_fix_is_idempotent() {
        let mut once = crediti(4200.0, 0.0, 4200.0);
        fix_crediti_mismatches(&mut once);
        let mut twice = once.clone();
        assert_eq!(fix_crediti_mismatches(&mut twice), 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_entro_kept_when_totals_differ() {
        let mut tree = crediti(4200.0, 0.0, 9000.0);
        let before = tree.clone();
        assert_eq!(fix_crediti_mismatches(&mut tree), 0);
        assert_eq!(tree, before);
    }

    #[test]
    fn test_missing_branches_are_ignored() {
        let mut tree = json!({"Stato_patrimoniale": {}});
        assert_eq!(fix_crediti_mismatches(&mut tree), 0);
    }

    #[test]
    fn test_swap_in_xbrl_mode() {
        let mut tree = altri(50000.0, 10.0, 0.0, 0.0);
        assert!(fix_altri_swap(&mut tree, true));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(10.0));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(50000.0));
    }

    #[test]
    fn test_no_swap_in_pdf_mode() {
        let mut tree = altri(50000.0, 10.0, 0.0, 0.0);
        assert!(!fix_altri_swap(&mut tree, false));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(50000.0));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(10.0));
    }

    #[test]
    fn test_swap_by_crossed_totals() {
        let mut tree = altri(900.0, 300.0, 300.0, 900.0);
        assert!(fix_altri_swap(&mut tree, true));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(300.0));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(900.0));
    }

    #[test]
    fn test_crossed_totals_swap_in_pdf_mode() {
        let mut tree = altri(2400.0, 120.0, 120.0, 2400.0);
        assert!(fix_altri_swap(&mut tree, false));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(120.0));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(2400.0));

        let settled = tree.clone();
        assert!(!fix_altri_swap(&mut tree, false));
        assert_eq!(tree, settled);
    }

    #[test]
    fn test_values_matching_own_totals_stay() {
        let mut tree = altri(120.0, 2400.0, 120.0, 2400.0);
        assert!(!fix_altri_swap(&mut tree, false));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(120.0));
        assert!(!AltriAmounts::read(&tree).totals_crossed());
    }

    #[test]
    fn test_interest_total_recovered_from_proventi() {
        let mut tree = altri(1500.0, 0.0, 0.0, 1500.0);
        assert!(fix_altri_swap(&mut tree, true));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(0.0));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(1500.0));
    }

    #[test]
    fn test_small_total_fills_empty_proventi() {
        let mut tree = altri(0.0, 25000.0, 420.0, 25000.0);
        assert!(fix_altri_swap(&mut tree, false));
        assert_eq!(get_number(&tree, PROVENTI_DIVERSI_ALTRI_PATH), Some(420.0));
    }

    #[test]
    fn test_swap_is_stable() {
        let mut tree = altri(50000.0, 10.0, 0.0, 0.0);
        fix_altri_swap(&mut tree, true);
        let after_first = tree.clone();
        assert!(!fix_altri_swap(&mut tree, true));
        assert_eq!(tree, after_first);
    }

    struct NeverSwap;

    impl AltriPlacement for NeverSwap {
        fn is_swapped(&self, _: &AltriAmounts) -> bool {
            false
        }

        fn is_small_income(&self, _: f64) -> bool {
            false
        }
    }

    #[test]
    fn test_custom_placement_rule() {
        let mut tree = altri(50000.0, 10.0, 0.0, 0.0);
        assert!(!fix_altri_swap_with(&mut tree, true, &NeverSwap));
        assert_eq!(get_number(&tree, INTERESSI_ALTRI_PATH), Some(10.0));

        let mut crossed = altri(900.0, 300.0, 300.0, 900.0);
        assert!(fix_altri_swap_with(&mut crossed, true, &NeverSwap));
        assert_eq!(get_number(&crossed, INTERESSI_ALTRI_PATH), Some(900.0));
    }
}
