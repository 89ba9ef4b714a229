//! Context-aware resolution of an extracted label to a template path.
//!
//! Candidates are gathered from exact and case-insensitive key hits, a set of
//! direct routes for labels that are known to be ambiguous, and finally fuzzy
//! key similarity. They are then filtered by the current section, scored and
//! screened by exclusion rules before the first unused one is returned.

use crate::labels::{close_matches, similarity};
use crate::schema::ExtractionConfig;
use crate::template::HierarchicalIndex;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub const ISTITUTI_TOTALE_PATH: &str = "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale";
pub const CREDITI_SOCI_TOTALE_PATH: &str = "Stato_patrimoniale.Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti.Totale_crediti_verso_soci_per_versamenti_ancora_dovuti";
pub const DISPONIBILITA_TOTALE_PATH: &str =
    "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Totale_disponibilita_liquide";
pub const SVALUTAZIONI_CREDITI_PATH: &str = "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Svalutazioni_dei_crediti_compresi_nell_attivo_circolante";
pub const CONTRIBUTI_PATH: &str =
    "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Contributi_in_conto_esercizio";
pub const CREDITI_PREFIX: &str = "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti";
pub const ALTRI_PROVENTI_TOTALE_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.TOTALE";
pub const INTERESSI_TOTALE_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.TOTALE";
pub const RETTIFICHE_TOTALE_PATH: &str =
    "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie .TOTALE";
pub const PROVENTI_ONERI_TOTALE_PATH: &str = "Conto_economico.Proventi_e_oneri_finanziari.TOTALE";
pub const INTERESSI_ALTRI_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Altri";
pub const PROVENTI_DIVERSI_ALTRI_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Altri";
pub const DA_ALTRI_PATH: &str = "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_altri";

const ISTITUTI_PARENT: &str = "Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale";
const SVALUTAZIONI_KEY: &str = "Svalutazioni_dei_crediti_compresi_nell_attivo_circolante";

lazy_static! {
    static ref TOTALE_WORD_RE: Regex = Regex::new(r"(?i)\btotale\b").unwrap();
}

/// Lower-cased views of the label and its line, shared by every rule.
struct Query {
    name: String,
    nl: String,
    ll: String,
    is_totale: bool,
}

impl Query {
    fn new(extracted_name: &str, line_text: &str) -> Self {
        let alias = extracted_name.to_lowercase().replace('\'', "").replace(' ', "_");
        let name = if ["svalutazioni", "crediti", "attivo", "circolante"]
            .iter()
            .all(|kw| alias.contains(kw))
        {
            SVALUTAZIONI_KEY.to_string()
        } else {
            extracted_name.to_string()
        };
        let nl = name.to_lowercase();
        Self {
            is_totale: nl.contains("totale"),
            ll: line_text.to_lowercase(),
            name,
            nl,
        }
    }

    fn name_has(&self, kw: &str) -> bool {
        self.nl.contains(kw)
    }

    fn line_has(&self, kw: &str) -> bool {
        self.ll.contains(kw)
    }

    fn either(&self, kw: &str) -> bool {
        self.name_has(kw) || self.line_has(kw)
    }

    fn is_crediti_soci(&self) -> bool {
        self.either("crediti") && self.either("soci")
    }

    fn has_financial_formula(&self) -> bool {
        ["15", "16", "17", "c)"].iter().any(|kw| self.line_has(kw))
    }

    fn is_proventi_oneri_total(&self) -> bool {
        ["totale", "proventi", "oneri", "finanziari"].iter().all(|kw| self.name_has(kw))
    }
}

fn insert_front(candidates: &mut Vec<String>, path: &str) {
    candidates.insert(0, path.to_string());
}

fn insert_front_unique(candidates: &mut Vec<String>, path: &str) {
    if !candidates.iter().any(|c| c == path) {
        insert_front(candidates, path);
    }
}

/// Resolves extracted labels to template paths, remembering which paths have
/// already been filled so one path is never claimed twice.
#[derive(Debug, Clone)]
pub struct HierarchicalMatcher {
    index: HierarchicalIndex,
    used_paths: HashSet<String>,
    config: ExtractionConfig,
}

impl HierarchicalMatcher {
    pub fn new(template: &Value) -> Self {
        Self::with_config(template, ExtractionConfig::default())
    }

    pub fn with_config(template: &Value, config: ExtractionConfig) -> Self {
        Self {
            index: HierarchicalIndex::build(template),
            used_paths: HashSet::new(),
            config,
        }
    }

    pub fn index(&self) -> &HierarchicalIndex {
        &self.index
    }

    pub fn is_used(&self, path: &str) -> bool {
        self.used_paths.contains(path)
    }

    pub fn mark_used(&mut self, path: &str) {
        self.used_paths.insert(path.to_string());
    }

    pub fn used_paths(&self) -> &HashSet<String> {
        &self.used_paths
    }

    fn exists(&self, path: &str) -> bool {
        self.index.contains_path(path)
    }

    /// Returns the best unused template path for a label seen on `line_text`
    /// while the tracker was in `context`, and marks it used.
    pub fn find_best_match(&mut self, extracted_name: &str, line_text: &str, context: &str) -> Option<String> {
        let query = Query::new(extracted_name, line_text);

        let mut candidates = self.exact_candidates(&query);
        if query.is_totale && candidates.is_empty() {
            candidates = self.totale_parent_candidates(&query);
        }
        if candidates.is_empty() {
            candidates = self.routed_candidates(&query);
        }
        if candidates.is_empty() {
            return None;
        }

        if extracted_name == "Altri" && context.contains("Proventi_e_oneri_finanziari") {
            if let Some(path) = self.financial_altri_target(&query, context) {
                debug!("'Altri' in {} routed to {}", context, path);
                self.mark_used(&path);
                return Some(path);
            }
        }

        if query.is_totale && !context.is_empty() {
            self.prefer_context_totals(&query, context, &mut candidates);
        }

        let filtered = self.filter_by_context(&candidates, context);
        let mut scored: Vec<(f64, String)> = filtered
            .into_iter()
            .map(|path| {
                let mut score = self.score(&path, &query, context);
                if query.is_totale && path.ends_with("TOTALE") {
                    score += 1000.0;
                }
                if path.ends_with(&format!("{}.Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale", ISTITUTI_PARENT))
                    && (query.line_has("istituti") || query.line_has("previdenza") || query.name_has("previdenza"))
                {
                    score += 5000.0;
                }
                (score, path)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        // Used paths are never reclaimed: once every candidate is filled the
        // label stays unmatched rather than overwriting an earlier value.
        for (_, path) in scored {
            if self.is_used(&path) || self.is_excluded(&path, &query, context) {
                continue;
            }

            let mut chosen = path;
            if query.is_totale && !chosen.ends_with("TOTALE") {
                let with_total = format!("{}.TOTALE", chosen);
                if self.exists(&with_total) {
                    chosen = with_total;
                }
            }
            if query.is_totale && chosen.ends_with(ISTITUTI_PARENT) {
                let with_total = format!(
                    "{}.Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale",
                    chosen
                );
                if self.exists(&with_total) {
                    chosen = with_total;
                }
            }
            if chosen.ends_with("Ratei_e_risconti") {
                chosen.push_str(".TOTALE");
            }

            self.mark_used(&chosen);
            return Some(chosen);
        }
        None
    }

    fn exact_candidates(&self, query: &Query) -> Vec<String> {
        let exact = self.index.paths_for_key(&query.name);
        if !exact.is_empty() {
            return exact.to_vec();
        }
        self.index
            .final_keys()
            .find(|key| key.to_lowercase() == query.nl)
            .map(|key| self.index.paths_for_key(key).to_vec())
            .unwrap_or_default()
    }

    /// "Totale X": look for a TOTALE next to or under keys resembling X.
    fn totale_parent_candidates(&self, query: &Query) -> Vec<String> {
        let mut candidates = Vec::new();
        let stripped = TOTALE_WORD_RE.replace_all(&query.name, "");
        let rest = stripped.trim_matches('_').trim().to_lowercase();
        if rest.is_empty() {
            return candidates;
        }

        let mentions_debiti = rest.contains("debiti") || rest.contains("istituti") || rest.contains("previdenza");
        if mentions_debiti && (rest.contains("istituti") || rest.contains("previdenza")) {
            if self.exists(ISTITUTI_TOTALE_PATH) {
                candidates.push(ISTITUTI_TOTALE_PATH.to_string());
            }
            return candidates;
        }

        for key in self.index.final_keys() {
            let key_lower = key.to_lowercase();
            if !(key_lower.contains(&rest) || rest.contains(&key_lower)) {
                continue;
            }
            for path in self.index.paths_for_key(key) {
                if let Some((parent, _)) = path.rsplit_once('.') {
                    let sibling_total = format!("{}.TOTALE", parent);
                    if self.exists(&sibling_total) {
                        candidates.push(sibling_total);
                    }
                }
                let child_total = format!("{}.TOTALE", path);
                if self.exists(&child_total) {
                    candidates.push(child_total);
                }
            }
        }
        candidates
    }

    /// Direct routes for known-ambiguous labels, then fuzzy key similarity.
    fn routed_candidates(&self, query: &Query) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let q = query;

        if ["svalutazioni", "crediti", "attivo", "circolante"].iter().all(|kw| q.either(kw))
            && self.exists(SVALUTAZIONI_CREDITI_PATH)
        {
            candidates.push(SVALUTAZIONI_CREDITI_PATH.to_string());
        }

        if (q.name_has("debiti") || q.name_has("istituti") || q.name_has("previdenza"))
            && (q.either("istituti") || q.either("previdenza"))
            && self.exists(ISTITUTI_TOTALE_PATH)
        {
            candidates.push(ISTITUTI_TOTALE_PATH.to_string());
        }

        if q.is_crediti_soci() {
            for key in self.index.final_keys() {
                let kl = key.to_lowercase();
                if kl.contains("crediti") && kl.contains("soci") && kl.contains("totale") {
                    candidates.extend(self.index.paths_for_key(key).iter().cloned());
                }
            }
            if candidates.is_empty() && self.exists(CREDITI_SOCI_TOTALE_PATH) {
                candidates.push(CREDITI_SOCI_TOTALE_PATH.to_string());
            }
        }

        if (q.either("disponibilita") || q.line_has("disponibilità")) && q.either("liquide") {
            for key in self.index.final_keys() {
                let kl = key.to_lowercase();
                if kl.contains("disponibilita") && kl.contains("liquide") && kl.contains("totale") {
                    candidates.extend(self.index.paths_for_key(key).iter().cloned());
                }
            }
            if candidates.is_empty() && self.exists(DISPONIBILITA_TOTALE_PATH) {
                candidates.push(DISPONIBILITA_TOTALE_PATH.to_string());
            }
        }

        if q.either("contributi") && q.either("conto") && q.either("esercizio") && self.exists(CONTRIBUTI_PATH) {
            insert_front(&mut candidates, CONTRIBUTI_PATH);
        }

        let tributari = (q.either("tributari") && q.either("crediti")) || q.line_has("5-bis");
        if tributari {
            self.route_esigibili(q, "Crediti_tributari", &mut candidates);
        }
        let verso_altri = (q.either("verso") && q.either("altri")) || q.line_has("5-quater");
        if verso_altri {
            self.route_esigibili(q, "Verso_altri", &mut candidates);
        }

        if q.either("altri")
            && q.either("proventi")
            && q.either("finanziari")
            && !q.line_has("diversi")
            && !q.line_has("precedenti")
            && self.exists(ALTRI_PROVENTI_TOTALE_PATH)
        {
            insert_front_unique(&mut candidates, ALTRI_PROVENTI_TOTALE_PATH);
            candidates.retain(|c| !c.contains("Proventi_da_partecipazioni") || c == ALTRI_PROVENTI_TOTALE_PATH);
        }

        if q.either("interessi") && (q.either("oneri") || q.either("finanziari")) && self.exists(INTERESSI_TOTALE_PATH) {
            insert_front_unique(&mut candidates, INTERESSI_TOTALE_PATH);
        }

        if q.either("rettifiche")
            && (q.either("valore") || q.name_has("attivita") || q.name_has("passivita"))
            && self.exists(RETTIFICHE_TOTALE_PATH)
        {
            insert_front_unique(&mut candidates, RETTIFICHE_TOTALE_PATH);
        }

        if q.is_proventi_oneri_total() && q.has_financial_formula() && self.exists(PROVENTI_ONERI_TOTALE_PATH) {
            insert_front_unique(&mut candidates, PROVENTI_ONERI_TOTALE_PATH);
            candidates.retain(|c| {
                c == PROVENTI_ONERI_TOTALE_PATH
                    || !(c.contains("Altri_proventi_finanziari")
                        || c.contains("Interessi_e_oneri_finanziari")
                        || c.contains("Proventi_da_partecipazioni"))
            });
        }

        if candidates.is_empty() {
            candidates = self.fuzzy_candidates(q);
        }
        candidates
    }

    fn route_esigibili(&self, q: &Query, receivable: &str, candidates: &mut Vec<String>) {
        if !q.either("esigibili") {
            return;
        }
        let leaf = if q.either("entro") {
            "esigibili_entro_l_esercizio_successivo"
        } else if q.either("oltre") {
            "esigibili_oltre_l_esercizio_successivo"
        } else {
            return;
        };
        let path = format!("{}.{}.{}", CREDITI_PREFIX, receivable, leaf);
        if self.exists(&path) {
            insert_front(candidates, &path);
        }
    }

    fn fuzzy_candidates(&self, q: &Query) -> Vec<String> {
        if q.is_totale {
            let totals = self.index.paths_for_key("TOTALE");
            if !totals.is_empty() {
                return totals.to_vec();
            }
        }

        let mut originals: HashMap<String, &str> = HashMap::new();
        let mut lowered: Vec<String> = Vec::new();
        for key in self.index.final_keys() {
            let kl = key.to_lowercase();
            if !originals.contains_key(&kl) {
                lowered.push(kl.clone());
            }
            originals.insert(kl, key);
        }
        let refs: Vec<&str> = lowered.iter().map(String::as_str).collect();

        let (n, cutoff) = if !q.is_totale {
            (3, self.config.fuzzy_cutoff)
        } else if q.name_has("crediti") && q.name_has("soci") {
            (5, self.config.soci_cutoff)
        } else {
            (3, self.config.totale_cutoff)
        };

        let mut candidates = Vec::new();
        for hit in close_matches(&q.nl, &refs, n, cutoff) {
            if let Some(original) = originals.get(hit) {
                candidates.extend(self.index.paths_for_key(original).iter().cloned());
            }
        }
        candidates
    }

    /// "Altri" inside the financial section is ambiguous between the interest
    /// expense row and the "proventi diversi" income row.
    fn financial_altri_target(&self, q: &Query, context: &str) -> Option<String> {
        let available = |path: &str| self.exists(path) && !self.is_used(path);

        if context.contains("Interessi_e_oneri_finanziari") && available(INTERESSI_ALTRI_PATH) {
            return Some(INTERESSI_ALTRI_PATH.to_string());
        }
        if (context.contains("Proventi_diversi_dai_precedenti")
            || context.contains("Proventi_diversi_dalle_partecipazioni"))
            && available(PROVENTI_DIVERSI_ALTRI_PATH)
        {
            return Some(PROVENTI_DIVERSI_ALTRI_PATH.to_string());
        }

        let mut ordered: Vec<&str> = Vec::new();
        if q.line_has("interessi") && (q.line_has("oneri") || q.line_has("finanziari")) {
            ordered.push(INTERESSI_ALTRI_PATH);
        }
        if (q.line_has("diversi") && q.line_has("precedenti")) || q.line_has("proventi diversi") {
            ordered.push(PROVENTI_DIVERSI_ALTRI_PATH);
        }
        if q.line_has("crediti") && (q.line_has("immobilizzazioni") || q.line_has("immobilizzazione")) {
            ordered.push(DA_ALTRI_PATH);
        }

        let interessi_used = self.is_used(INTERESSI_ALTRI_PATH);
        let proventi_used = self.is_used(PROVENTI_DIVERSI_ALTRI_PATH);
        if interessi_used && !proventi_used {
            ordered.push(PROVENTI_DIVERSI_ALTRI_PATH);
        } else if proventi_used && !interessi_used {
            ordered.push(INTERESSI_ALTRI_PATH);
        } else {
            ordered.extend([INTERESSI_ALTRI_PATH, PROVENTI_DIVERSI_ALTRI_PATH, DA_ALTRI_PATH]);
        }

        ordered.into_iter().find(|p| available(p)).map(str::to_string)
    }

    fn prefer_context_totals(&self, q: &Query, context: &str, candidates: &mut Vec<String>) {
        let crediti_soci = q.is_crediti_soci();
        let parts: Vec<&str> = context.split('.').collect();
        for width in (1..=parts.len()).rev() {
            let total = format!("{}.TOTALE", parts[..width].join("."));
            if !self.exists(&total) {
                continue;
            }
            if crediti_soci && total.contains("Debiti_verso_istituti") {
                continue;
            }
            insert_front_unique(candidates, &total);
        }

        let mentions_istituti = q.either("istituti") || q.either("previdenza");
        let mentions_soci = q.either("crediti") || q.either("soci");
        if mentions_istituti && !mentions_soci && self.exists(ISTITUTI_TOTALE_PATH) {
            *candidates = vec![ISTITUTI_TOTALE_PATH.to_string()];
        }
    }

    /// Keeps candidates that share at least the first context level; falls
    /// back to all of them when none do.
    pub fn filter_by_context(&self, candidates: &[String], context: &str) -> Vec<String> {
        if context.is_empty() {
            return candidates.to_vec();
        }
        let ctx_parts: Vec<&str> = context.split('.').collect();
        let filtered: Vec<String> = candidates
            .iter()
            .filter(|candidate| {
                let parts: Vec<&str> = candidate.split('.').collect();
                ctx_parts
                    .iter()
                    .zip(parts.iter())
                    .take_while(|(c, p)| c == p)
                    .count()
                    >= 1
            })
            .cloned()
            .collect();
        if filtered.is_empty() {
            candidates.to_vec()
        } else {
            filtered
        }
    }

    fn score(&self, path: &str, q: &Query, context: &str) -> f64 {
        let Some(info) = self.index.info(path) else {
            return f64::MIN;
        };
        let path_parts: Vec<&str> = path.split('.').collect();
        let ctx_parts: Vec<&str> = if context.is_empty() {
            Vec::new()
        } else {
            context.split('.').collect()
        };

        let mut score = 0.0;
        for (i, ctx_part) in ctx_parts.iter().enumerate() {
            if path_parts.get(i) == Some(ctx_part) {
                score += 100.0;
            }
        }

        let expected_depth = ctx_parts.len() as f64 + 1.0;
        score -= (info.depth as f64 - expected_depth).abs() * 10.0;

        score += similarity(&q.nl, &info.final_key.to_lowercase()) * 50.0;

        for parent in &info.parents {
            let readable = parent.replace('_', " ").to_lowercase();
            if q.ll.contains(&readable) {
                score += 20.0;
            }
        }

        if self.is_used(path) {
            score -= 1000.0;
        }
        score
    }

    fn is_excluded(&self, path: &str, q: &Query, context: &str) -> bool {
        let debiti_istituti = (q.name_has("istituti") || q.name_has("previdenza") || q.line_has("istituti"))
            && q.either("totale");
        let tributari = (q.either("tributari") && q.either("crediti")) || q.line_has("5-bis");
        let verso_altri = (q.either("verso") && q.either("altri")) || q.line_has("5-quater");

        (q.is_crediti_soci() && path.contains("Debiti_verso_istituti"))
            || (debiti_istituti
                && (path.contains("crediti") || path.contains("soci") || path.contains("Debiti_verso_imprese_collegate")))
            || (q.name_has("immobilizzazioni") && path.contains("Debiti_verso_istituti"))
            || ((q.either("disponibilita") || q.either("liquide")) && path.contains("Debiti_verso_istituti"))
            || (tributari && path.contains("Verso_imprese_controllate"))
            || (verso_altri && path.contains("Verso_imprese_collegate"))
            || ((context.contains("Crediti_tributari") || q.line_has("5-bis"))
                && q.name_has("esigibili")
                && path.contains("Verso_imprese_controllate"))
            || ((context.contains("Verso_altri") || q.line_has("5-quater"))
                && q.name_has("esigibili")
                && path.contains("Verso_imprese_collegate"))
            || (q.name_has("altri") && q.name_has("proventi") && path.contains("Interessi_e_oneri_finanziari"))
            || (q.name_has("interessi") && q.name_has("oneri") && path.contains("Altri_proventi_finanziari"))
            || (q.name_has("rettifiche")
                && (path.contains("Proventi_e_oneri_finanziari")
                    || path.contains("Altri_proventi")
                    || path.contains("Interessi_e_oneri")))
            || (q.name_has("risultato")
                && q.name_has("prima")
                && (path.contains("Proventi_e_oneri_finanziari")
                    || path.contains("Altri_proventi")
                    || path.contains("Interessi_e_oneri")
                    || path.contains("Rettifiche")))
            || ((q.name_has("diversi") || q.name_has("precedenti")) && path.contains("Proventi_da_partecipazioni"))
            || ((q.line_has("diversi") || q.line_has("precedenti"))
                && path.ends_with("Proventi_e_oneri_finanziari.TOTALE"))
            || (q.either("altri") && q.name_has("proventi") && path.contains("Proventi_da_partecipazioni"))
            || (q.name_has("totale")
                && q.name_has("proventi")
                && q.name_has("oneri")
                && q.has_financial_formula()
                && (path.contains("Altri_proventi_finanziari")
                    || path.contains("Interessi_e_oneri_finanziari")
                    || path.contains("Proventi_da_partecipazioni")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Value {
        json!({
            "Stato_patrimoniale": {
                "Attivo": {
                    "Crediti_verso_soci_per_versamenti_ancora_dovuti": {
                        "Totale_crediti_verso_soci_per_versamenti_ancora_dovuti": 0.0
                    },
                    "Attivo_circolante": {
                        "Crediti": {
                            "Verso_imprese_controllate": {
                                "esigibili_entro_l_esercizio_successivo": 0.0
                            },
                            "Crediti_tributari": {
                                "esigibili_entro_l_esercizio_successivo": 0.0,
                                "esigibili_oltre_l_esercizio_successivo": 0.0
                            },
                            "Verso_altri": {
                                "esigibili_entro_l_esercizio_successivo": 0.0
                            },
                            "TOTALE": 0.0
                        },
                        "Disponibilita_liquide": {
                            "Depositi_bancari_e_postali": 0.0,
                            "Totale_disponibilita_liquide": 0.0
                        }
                    },
                    "Ratei_e_risconti": {"TOTALE": 0.0}
                },
                "Passivo": {
                    "Debiti": {
                        "Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale": {
                            "esigibili_entro_l_esercizio_successivo": 0.0,
                            "Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale": 0.0
                        }
                    }
                }
            },
            "Conto_economico": {
                "Valore_della_produzione": {
                    "Ricavi_delle_vendite_e_delle_prestazioni": 0.0,
                    "TOTALE": 0.0
                },
                "Proventi_e_oneri_finanziari": {
                    "Altri_proventi_finanziari": {
                        "Proventi_diversi_dai_precedenti": {"Altri": 0.0},
                        "TOTALE": 0.0
                    },
                    "Interessi_e_oneri_finanziari": {"Altri": 0.0, "TOTALE": 0.0},
                    "TOTALE": 0.0
                }
            }
        })
    }

    #[test]
    fn test_exact_match_marks_path_used() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let path = matcher.find_best_match(
            "Ricavi_delle_vendite_e_delle_prestazioni",
            "Ricavi delle vendite e delle prestazioni 1.000",
            "Conto_economico.Valore_della_produzione",
        );
        assert_eq!(
            path.as_deref(),
            Some("Conto_economico.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni")
        );
        assert!(matcher.is_used("Conto_economico.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni"));

        let again = matcher.find_best_match(
            "Ricavi_delle_vendite_e_delle_prestazioni",
            "Ricavi delle vendite e delle prestazioni 1.000",
            "Conto_economico.Valore_della_produzione",
        );
        assert_eq!(again, None);
    }

    #[test]
    fn test_repeated_label_fills_each_path_once() {
        let template = json!({
            "Conto_economico": {
                "Costi_di_produzione": {
                    "Per_personale": {"Salari_e_stipendi": 0.0, "Altri_costi": 0.0},
                    "Altri_costi": 0.0
                }
            }
        });
        let mut matcher = HierarchicalMatcher::new(&template);
        let context = "Conto_economico.Costi_di_produzione";

        let first = matcher.find_best_match("Altri_costi", "altri costi 500", context);
        assert_eq!(
            first.as_deref(),
            Some("Conto_economico.Costi_di_produzione.Per_personale.Altri_costi")
        );
        let second = matcher.find_best_match("Altri_costi", "altri costi 700", context);
        assert_eq!(second.as_deref(), Some("Conto_economico.Costi_di_produzione.Altri_costi"));
        assert_eq!(matcher.find_best_match("Altri_costi", "altri costi 900", context), None);
        assert_eq!(matcher.used_paths().len(), 2);
    }

    #[test]
    fn test_totale_resolves_to_context_total() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let path = matcher.find_best_match(
            "Totale",
            "Totale valore della produzione 5.000",
            "Conto_economico.Valore_della_produzione",
        );
        assert_eq!(path.as_deref(), Some("Conto_economico.Valore_della_produzione.TOTALE"));
    }

    #[test]
    fn test_crediti_soci_route_ignores_debiti_context() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let path = matcher.find_best_match(
            "Crediti verso soci",
            "A) Crediti verso soci 1.200",
            "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale",
        );
        assert_eq!(path.as_deref(), Some(CREDITI_SOCI_TOTALE_PATH));
    }

    #[test]
    fn test_tributari_esigibili_route() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let path = matcher.find_best_match(
            "esigibili entro l'esercizio successivo",
            "5-bis) crediti tributari esigibili entro l'esercizio successivo 4.000",
            "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari",
        );
        assert_eq!(
            path.as_deref(),
            Some("Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari.esigibili_entro_l_esercizio_successivo")
        );
    }

    #[test]
    fn test_financial_altri_follows_context() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let interessi = matcher.find_best_match(
            "Altri",
            "altri 12.000",
            "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari",
        );
        assert_eq!(interessi.as_deref(), Some(INTERESSI_ALTRI_PATH));

        let proventi = matcher.find_best_match(
            "Altri",
            "altri 35",
            "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari",
        );
        assert_eq!(proventi.as_deref(), Some(PROVENTI_DIVERSI_ALTRI_PATH));
    }

    #[test]
    fn test_ratei_parent_goes_to_totale() {
        let mut matcher = HierarchicalMatcher::new(&template());
        let path = matcher.find_best_match(
            "Ratei_e_risconti",
            "D) Ratei e risconti 300",
            "Stato_patrimoniale.Attivo",
        );
        assert_eq!(path.as_deref(), Some("Stato_patrimoniale.Attivo.Ratei_e_risconti.TOTALE"));
    }

    #[test]
    fn test_filter_by_context_falls_back() {
        let matcher = HierarchicalMatcher::new(&template());
        let candidates = vec!["Conto_economico.Valore_della_produzione.TOTALE".to_string()];
        assert_eq!(
            matcher.filter_by_context(&candidates, "Stato_patrimoniale.Attivo"),
            candidates
        );
        assert_eq!(
            matcher.filter_by_context(&candidates, "Conto_economico"),
            candidates
        );
    }

    #[test]
    fn test_unknown_label_has_no_match() {
        let mut matcher = HierarchicalMatcher::new(&template());
        assert_eq!(matcher.find_best_match("Xyzzy", "xyzzy 10", "Conto_economico"), None);
    }
}
