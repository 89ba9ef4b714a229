//! Fills a bilancio template from statement text.
//!
//! The text (a PDF page dump or the rendering of an XBRL instance) goes
//! through four passes: multi-line entries are merged, numbering prefixes are
//! stripped, lines without amounts or headings are dropped, and each remaining
//! line is resolved to a template path and written. Writes only ever touch
//! leaves that already exist in the template.

use crate::labels::clean_name;
use crate::matcher::{
    HierarchicalMatcher, ALTRI_PROVENTI_TOTALE_PATH, CONTRIBUTI_PATH, CREDITI_PREFIX, CREDITI_SOCI_TOTALE_PATH,
    DA_ALTRI_PATH, DISPONIBILITA_TOTALE_PATH, INTERESSI_ALTRI_PATH, INTERESSI_TOTALE_PATH, ISTITUTI_TOTALE_PATH,
    PROVENTI_DIVERSI_ALTRI_PATH, PROVENTI_ONERI_TOTALE_PATH, RETTIFICHE_TOTALE_PATH,
};
use crate::numeric::{
    ends_with_dash_number, ends_with_dash_placeholder, first_positive_amount, is_amount_token, is_zero_token,
    parse_italian_amount, AMOUNT_RE, SPACED_AMOUNT_RE,
};
use crate::schema::{ExtractionConfig, FileType};
use crate::sections::{FinancialSubsection, SectionTracker};
use crate::template::{get_number, get_path, get_path_mut, set_existing_leaf};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

const TOTALE_MATERIALI_PATH: &str =
    "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Totale_immobilizzazioni_materiali";
const TOTALE_IMMATERIALI_PATH: &str =
    "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Totale_immobilizzazioni_immateriali";
const IMMOBILIZZAZIONI_MATERIALI_PATH: &str = "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali";
const CORSO_ACCONTI_MATERIALI_PATH: &str =
    "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Immobilizzazioni_in_corso_e_acconti";
const IMPOSTE_TOTALE_PATH: &str = "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Totale_delle_imposte_sul_reddito_di_esercizio_correnti,_differite_e_anticipate";
const IMPOSTE_CORRENTI_PATH: &str = "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Imposte_correnti";
const PROVENTI_ONERI_XBRL_TOTALE_PATH: &str = "Conto_economico.Proventi_e_oneri_finanziari.Totale_proventi_e_oneri_finanziari";
const PROVENTI_DIVERSI_TOTALE_PATH: &str = "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Totale_proventi_diversi_dai_precedenti_immobilizzazioni";
const ALTRI_PROVENTI_PDF_TOTALE_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Totale_altri_proventi_finanziari";
const INTERESSI_TOTALE_LEAF_PATH: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Totale_interessi_e_altri_oneri_finanziari";
const UTILE_PN_PATH: &str = "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dellesercizio";
const UTILE_PN_ALT_PATH: &str = "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dell_esercizio";
const UTILE_CE_PATH: &str = "Conto_economico.Risultato_prima_delle_imposte.Utile_(perdita)_dell_esercizio";
const UTILE_CE_APOSTROPHE_PATH: &str = "Conto_economico.Risultato_prima_delle_imposte.Utile_(perdita)_dell'esercizio";
const VARIAZIONE_LAVORI_PATH: &str = "Conto_economico.Valore_della_produzione.Variazione_dei_lavori_in_corso_di_esecuzione";
const AMMORTAMENTO_IMMATERIALI_PATH: &str =
    "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_immateriale";
const RATEI_PASSIVO_TOTALE_PATH: &str = "Stato_patrimoniale.Passivo.Ratei_e_risconti.TOTALE";
const RATEI_PASSIVI_PATH: &str = "Stato_patrimoniale.Passivo.Ratei_e_risconti.Ratei_passivi";
const RISCONTI_PASSIVI_PATH: &str = "Stato_patrimoniale.Passivo.Ratei_e_risconti.Risconti_passivi";
const ISTITUTI_ENTRO_PATH: &str = "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.esigibili_entro_l_esercizio_successivo";
const BANCHE_ENTRO_PATH: &str =
    "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche.esigibili_entro_l_esercizio_successivo";
const CREDITI_SOCI_CONTEXT: &str = "Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti";
const FINANCIAL_CONTEXT: &str = "Conto_economico.Proventi_e_oneri_finanziari";

const ENTRO_KEY: &str = "esigibili_entro_l_esercizio_successivo";
const OLTRE_KEY: &str = "esigibili_oltre_l_esercizio_successivo";
const ISTITUTI_PARENT_KEY: &str = "Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale";
const ISTITUTI_TOTALE_KEY: &str = "Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale";
const RISERVA_DEROGHE_SUFFIX: &str = ".Riserva_da_deroghe_ex_articolo_2423_codice_civile";

const SECTION_KEYWORDS: &[&str] = &[
    "CONTO ECONOMICO",
    "STATO PATRIMONIALE",
    "ATTIVO",
    "PASSIVO",
    "VALORE DELLA PRODUZIONE",
    "VALORE PRODUZIONE",
    "COSTI DELLA PRODUZIONE",
    "COSTI DI PRODUZIONE",
    "COSTO DELLA PRODUZIONE",
    "B) COSTI",
    "IMMOBILIZZAZIONI",
    "ATTIVO CIRCOLANTE",
    "CREDITI VERSO SOCI",
    "PATRIMONIO NETTO",
    "FONDI PER RISCHI",
    "DEBITI",
    "PROVENTI E ONERI FINANZIARI",
    "ACCONTI",
    "OBBLIGAZIONI",
    "RIMANENZE",
];

/// Tangible-asset wording that places "in corso e acconti" under Materiali.
const MATERIALI_HINTS: &[&str] = &[
    "altri_beni",
    "altri beni",
    "impianti",
    "macchinari",
    "terreni",
    "fabbricati",
    "attrezzature",
];

/// Pieces of the article number "2423" that must never be read as an amount.
const ARTICLE_PIECES: &[&str] = &["2423", "242", "423", "2", "3"];

lazy_static! {
    static ref PAREN_AMOUNT_RE: Regex =
        Regex::new(r"\(((?:\d{1,3}\.){1,}\d{3}(?:,\d+)?|\d{1,3},\d+)\)").unwrap();
    static ref COLUMN_DASH_RE: Regex = Regex::new(r"(^|\D)-\s+(\d)").unwrap();
    static ref FORMULA_RE: Regex = Regex::new(r"\([^)]*[+*/\-A-Za-z][^)]*\)").unwrap();
    static ref NUMERIC_FORMULA_RE: Regex = Regex::new(r"\(\d+\s*-\s*\d+\)").unwrap();
    static ref SMALL_INDEX_RE: Regex = Regex::new(r"\(\s*\d{1,2}\s*\)").unwrap();
    static ref TRAILING_PAIR_RE: Regex =
        Regex::new(r"-?\d{1,3}(?:\.\d{3})*(?:,\d+)?\s+-?\d{1,3}(?:\.\d{3})*(?:,\d+)?$").unwrap();
    static ref STANDARD_ENTRY_RE: Regex =
        Regex::new(r"^(?:esigibili entro|esigibili oltre|totale\s|altri\s|altri$)").unwrap();
    static ref NUMBERS_ONLY_RE: Regex = Regex::new(r"^-?[\d\s.,]+$").unwrap();
    static ref STARTS_NUMBERED_RE: Regex = Regex::new(r"^\d+\)").unwrap();
    static ref NUMBER_PREFIX_RE: Regex = Regex::new(r"^\d+\)\s*").unwrap();
    static ref ROMAN_DASH_PREFIX_RE: Regex = Regex::new(r"^(?:[IVXLCDM]+\)?\s*-\s*)").unwrap();
    static ref NUMBERED_OR_DASHED_RE: Regex = Regex::new(r"^\d+[)\-]").unwrap();
    static ref SUBSECTION_PREFIX_RE: Regex = Regex::new(r"^\s*(?:\d+(?:-[a-z]+)?|[IVXLCDM]+)\)\s*").unwrap();
    static ref DATE_RE: Regex = Regex::new(r"\b\d{2}[/.-]\d{2}[/.-]\d{4}\b").unwrap();
    static ref TOTALE_WORD_RE: Regex = Regex::new(r"(?i)\btotale\b").unwrap();
    static ref TRAILING_DASH_RE: Regex = Regex::new(r"\s*-\s*$").unwrap();
    static ref END_AMOUNTS_RE: Regex =
        Regex::new(r"(-?\d{1,3}(?:\.\d{3})*(?:,\d+)?)(?:\s+(-?\d{1,3}(?:\.\d{3})*(?:,\d+)?))?\s*$").unwrap();
    static ref IMPOSTE_CORRENTI_RE: Regex = Regex::new(
        r"(?i)(?:imposte.*correnti|correnti).*?(-?\d{1,3}(?:\.\d{3})*(?:,\d+)?)(?:\s+(-?\d{1,3}(?:\.\d{3})*(?:,\d+)?))?\s*$"
    )
    .unwrap();
    static ref RISERVA_DEROGHE_RE: Regex =
        Regex::new(r"Riserva da deroghe ex articolo 2423 codice civile(.*)").unwrap();
}

/// Counters describing one update run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub lines_considered: usize,
    pub values_written: usize,
    pub unmatched: usize,
    pub skipped: usize,
}

/// Receivable branches that carry "esigibili entro/oltre" rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReceivableBranch {
    Tributari,
    Altri,
    Clienti,
    Controllate,
    Collegate,
}

impl ReceivableBranch {
    fn key(self) -> &'static str {
        match self {
            ReceivableBranch::Tributari => "Crediti_tributari",
            ReceivableBranch::Altri => "Verso_altri",
            ReceivableBranch::Clienti => "Verso_clienti",
            ReceivableBranch::Controllate => "Verso_imprese_controllate",
            ReceivableBranch::Collegate => "Verso_imprese_collegate",
        }
    }

    fn from_context(context: &str) -> Option<Self> {
        [
            ReceivableBranch::Altri,
            ReceivableBranch::Tributari,
            ReceivableBranch::Clienti,
            ReceivableBranch::Controllate,
            ReceivableBranch::Collegate,
        ]
        .into_iter()
        .find(|branch| context.contains(branch.key()))
    }

    /// Looks for the branch heading among nearby lines. "Verso altri"
    /// (item 5-quater) is searched for first.
    fn from_lines(lines: &[String]) -> Option<Self> {
        let altri = lines.iter().any(|l| {
            l.contains("5-quater")
                || l.contains("5 quater")
                || (l.contains('5') && l.contains("quater") && (l.contains("verso") || l.contains("altri")))
                || (l.contains("verso")
                    && l.contains("altri")
                    && !l.contains("controllate")
                    && !l.contains("collegate")
                    && !l.contains("finanziatori"))
        });
        if altri {
            return Some(ReceivableBranch::Altri);
        }

        lines.iter().find_map(|l| {
            if l.contains("5-bis") || (l.contains("tributari") && l.contains("crediti")) {
                Some(ReceivableBranch::Tributari)
            } else if (l.contains("verso") && l.contains("clienti")) || (l.starts_with("1)") && l.contains("clienti")) {
                Some(ReceivableBranch::Clienti)
            } else if (l.contains("verso") && l.contains("imprese") && l.contains("controllate"))
                || (l.starts_with("2)") && l.contains("controllate"))
            {
                Some(ReceivableBranch::Controllate)
            } else if (l.contains("verso") && l.contains("imprese") && l.contains("collegate"))
                || (l.starts_with("3)") && l.contains("collegate"))
            {
                Some(ReceivableBranch::Collegate)
            } else {
                None
            }
        })
    }
}

fn amount_values(line: &str) -> Vec<f64> {
    AMOUNT_RE
        .find_iter(line)
        .filter_map(|m| parse_italian_amount(m.as_str()))
        .collect()
}

/// Drops parenthesised formulas and keeps parenthesised amounts positive.
fn strip_formulas(line: &str) -> String {
    let line = PAREN_AMOUNT_RE.replace_all(line, "$1");
    let line = COLUMN_DASH_RE.replace_all(&line, "${1} ${2}");
    let line = FORMULA_RE.replace_all(&line, "");
    NUMERIC_FORMULA_RE.replace_all(&line, "").into_owned()
}

/// Joins wrapped labels and number-only continuation lines to the entry they
/// belong to.
fn merge_lines(text: &str) -> Vec<String> {
    let mut merged = Vec::new();
    let mut previous = String::new();

    for raw in text.lines() {
        let mut line = raw.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let stripped = strip_formulas(&line);
        let without_prefix = SUBSECTION_PREFIX_RE.replace(&stripped, "");
        let without_indices = SMALL_INDEX_RE.replace_all(&without_prefix, "").into_owned();
        let numbers: Vec<&str> = AMOUNT_RE.find_iter(&without_indices).map(|m| m.as_str()).collect();
        if numbers.len() > 1 {
            let pair = format!("{} {}", numbers[0], numbers[1].replace('-', ""));
            line = TRAILING_PAIR_RE.replace(&line, NoExpand(&pair)).into_owned();
        }

        let is_standard_entry = STANDARD_ENTRY_RE.is_match(&line.to_lowercase());
        let is_continuation = line.starts_with(|c: char| c.is_ascii_lowercase()) || line.starts_with('-');

        if !previous.is_empty()
            && is_continuation
            && !STARTS_NUMBERED_RE.is_match(&line)
            && !previous.ends_with(|c: char| c.is_ascii_digit())
            && !is_standard_entry
        {
            previous.push(' ');
            previous.push_str(&line);
        } else if !previous.is_empty() && NUMBERS_ONLY_RE.is_match(&line) {
            previous.push(' ');
            previous.push_str(&line);
        } else {
            if !previous.is_empty() {
                merged.push(std::mem::take(&mut previous));
            }
            previous = line;
        }
    }

    if !previous.is_empty() {
        merged.push(previous);
    }
    merged
}

fn clean_prefixes(lines: Vec<String>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            let line = NUMBER_PREFIX_RE.replace(&line, "");
            let line = ROMAN_DASH_PREFIX_RE.replace(&line, "");
            line.trim().to_string()
        })
        .collect()
}

/// Keeps lines that carry an amount, a section heading or a numbered item.
fn filter_lines(lines: &[String]) -> Vec<String> {
    let mut kept: Vec<String> = lines
        .iter()
        .filter(|line| {
            let upper = line.to_uppercase();
            let has_numbers = AMOUNT_RE.is_match(line) && !NUMBERED_OR_DASHED_RE.is_match(line);
            let is_heading = SECTION_KEYWORDS.iter().any(|kw| upper.contains(kw));
            has_numbers || is_heading || SUBSECTION_PREFIX_RE.is_match(line)
        })
        .cloned()
        .collect();

    if let Some(last) = lines.last() {
        if AMOUNT_RE.is_match(last) && !kept.contains(last) {
            kept.push(last.clone());
        }
    }
    kept
}

/// The statement lines that survive merging, cleaning and filtering.
pub fn preprocess_lines(text: &str) -> Vec<String> {
    filter_lines(&clean_prefixes(merge_lines(text)))
}

/// Drives the section tracker and the matcher over statement text and writes
/// the recovered amounts into the template.
pub struct BilancioUpdater<'a> {
    tree: &'a mut Value,
    text: &'a str,
    source: FileType,
    config: ExtractionConfig,
    matcher: HierarchicalMatcher,
    tracker: SectionTracker,
    recent_lines: VecDeque<String>,
    last_line_without_numbers: Option<String>,
    report: UpdateReport,
}

impl<'a> BilancioUpdater<'a> {
    pub fn new(tree: &'a mut Value, text: &'a str, source: FileType, config: ExtractionConfig) -> Self {
        let matcher = HierarchicalMatcher::with_config(tree, config.clone());
        Self {
            tree,
            text,
            source,
            config,
            matcher,
            tracker: SectionTracker::new(),
            recent_lines: VecDeque::new(),
            last_line_without_numbers: None,
            report: UpdateReport::default(),
        }
    }

    fn is_xbrl(&self) -> bool {
        self.source == FileType::Xbrl
    }

    fn is_pdf(&self) -> bool {
        self.source == FileType::Pdf
    }

    fn exists(&self, path: &str) -> bool {
        self.matcher.index().contains_path(path)
    }

    fn remember(&mut self, line: &str) {
        self.recent_lines.push_back(line.to_string());
        while self.recent_lines.len() > self.config.context_window {
            self.recent_lines.pop_front();
        }
    }

    pub fn run(mut self) -> UpdateReport {
        let lines = preprocess_lines(self.text);
        for line in &lines {
            self.report.lines_considered += 1;
            self.process_line(line);
        }
        info!(
            "{} update: {} lines, {} values written, {} unmatched, {} skipped",
            self.source,
            self.report.lines_considered,
            self.report.values_written,
            self.report.unmatched,
            self.report.skipped
        );
        self.report
    }

    /// Number tokens of the cleaned line, after the amount filter and the
    /// per-format leniency rules.
    fn value_tokens(&self, cleaned: &str, context: &str) -> (Vec<String>, Vec<String>) {
        let numbers: Vec<String> = if DATE_RE.is_match(cleaned) {
            Vec::new()
        } else {
            SPACED_AMOUNT_RE.find_iter(cleaned).map(|m| m.as_str().to_string()).collect()
        };
        if numbers.is_empty() {
            return (numbers, Vec::new());
        }

        let strict: Vec<String> = numbers.iter().filter(|n| is_amount_token(n)).cloned().collect();
        let mut filtered = if strict.is_empty() { numbers.clone() } else { strict };

        let lower = cleaned.to_lowercase();
        let ctx = context.to_lowercase();
        let has = |kw: &str| lower.contains(kw);

        if self.is_xbrl() {
            let only_zeros = filtered.iter().all(|t| is_zero_token(t));
            let any_non_zero = numbers.iter().any(|t| t.chars().any(|c| c.is_ascii_digit() && c != '0'));
            let proventi_diversi_line = has("proventi diversi") || (has("diversi") && has("precedenti"));
            let proventi_context = ctx.contains("proventi_e_oneri_finanziari") || ctx.contains("proventi_diversi");
            let financial_altri = has("altri")
                && (has("proventi") || has("oneri") || has("finanziari"))
                && (ctx.contains("proventi_e_oneri_finanziari") || ctx.contains("interessi"));

            if (only_zeros && any_non_zero)
                || (has("debiti verso banche") && has("esigibili entro"))
                || (has("debiti verso istituti") && has("esigibili entro"))
                || (has("ratei") && has("risconti"))
                || has("risconti passivi")
                || proventi_diversi_line
                || (proventi_context && has("altri"))
                || financial_altri
            {
                filtered = numbers.clone();
            }
        }

        if self.is_pdf() {
            let banche_entro =
                has("debiti") && has("banche") && has("esigibili") && has("entro") && !has("oltre");
            let ratei_passivo = has("ratei") && has("risconti") && ctx.contains("passivo");
            if banche_entro || ratei_passivo {
                filtered = numbers.clone();
            }
        }

        if filtered.is_empty() && has("esigibili") && (has("entro") || has("oltre")) {
            filtered = numbers.clone();
        }

        (numbers, filtered)
    }

    fn process_line(&mut self, line: &str) {
        let context = self.tracker.update_section(line);

        let cleaned = SUBSECTION_PREFIX_RE.replace(line, "");
        let cleaned = SMALL_INDEX_RE.replace_all(&strip_formulas(&cleaned), "").into_owned();
        let (numbers, filtered) = self.value_tokens(&cleaned, &context);

        let (name, value) = if !numbers.is_empty() {
            let value = if ends_with_dash_number(line) {
                0.0
            } else {
                let Some(first) = filtered.first() else {
                    return;
                };
                let compact: String = first.chars().filter(|c| !c.is_whitespace()).collect();
                match parse_italian_amount(&compact) {
                    Some(v) => v,
                    None => return,
                }
            };

            let raw_name = AMOUNT_RE.replace_all(line, "").trim().to_string();
            let raw_lower = raw_name.to_lowercase();
            let mut name = clean_name(&raw_name);

            if TOTALE_WORD_RE.is_match(&raw_name) && !name.to_lowercase().contains("totale") {
                name = if name.is_empty() {
                    "Totale".to_string()
                } else {
                    format!("Totale_{}", name)
                };
            }
            if (raw_lower.contains("istituti") || raw_lower.contains("previdenza"))
                && raw_lower.contains("debiti")
                && !name.to_lowercase().contains("debiti")
                && !name.starts_with("Debiti_")
            {
                name = format!("Debiti_{}", name);
            }

            if self.is_xbrl()
                && raw_lower.contains("da altri")
                && raw_lower.contains("crediti")
                && raw_lower.contains("immobilizzazioni")
                && set_existing_leaf(self.tree, DA_ALTRI_PATH, value)
            {
                debug!("direct write {} = {}", DA_ALTRI_PATH, value);
                self.report.values_written += 1;
                return;
            }

            if name.chars().count() < 3 {
                if let Some(previous) = self.last_line_without_numbers.take() {
                    name = clean_name(&previous);
                }
            }

            self.remember(line);
            (name, value)
        } else if ends_with_dash_placeholder(&cleaned) {
            let name = clean_name(TRAILING_DASH_RE.replace(line, "").trim());
            self.remember(line);
            (name, 0.0)
        } else {
            self.last_line_without_numbers = Some(line.to_string());
            self.remember(line);
            return;
        };

        let Some(path) = self.select_path(&name, line, &context, value) else {
            debug!("[NO MATCH] {} (context: {})", name, context);
            self.report.unmatched += 1;
            return;
        };

        let Some((path, value)) = self.correct(path, value, &name, line) else {
            self.report.skipped += 1;
            return;
        };

        if self.write(&path, value, &name, line, &context) {
            self.report.values_written += 1;
        } else {
            self.report.skipped += 1;
        }
    }

    fn direct(&mut self, path: &str, name: &str, line: &str, context: &str) -> Option<String> {
        if self.exists(path) {
            debug!("direct match {} -> {}", name, path);
            Some(path.to_string())
        } else {
            self.matcher.find_best_match(name, line, context)
        }
    }

    fn matched(&mut self, name: &str, line: &str, context: &str) -> Option<String> {
        self.matcher.find_best_match(name, line, context)
    }

    /// Picks the target path: the direct-match table first, then the matcher.
    fn select_path(&mut self, name: &str, line: &str, context: &str, value: f64) -> Option<String> {
        let ll = line.to_lowercase();
        let nl = name.to_lowercase();
        let ctx_lower = context.to_lowercase();
        let l = |kw: &str| ll.contains(kw);
        let either = |kw: &str| ll.contains(kw) || nl.contains(kw);
        let xbrl = self.is_xbrl();
        let pdf = self.is_pdf();

        if l("totale") && l("debiti") && (l("istituti") || l("previdenza")) {
            if !l("disponibilita") && !l("liquide") && !l("immobilizzazioni") {
                return self.direct(ISTITUTI_TOTALE_PATH, name, line, context);
            }
            return self.matched(name, line, context);
        }

        if ((l("totale") && l("immobilizzazioni") && l("materiali"))
            || (l("immobilizzazioni") && l("materiali") && !l("immateriali") && !l("finanziarie")))
            && context.contains("Immobilizzazioni")
        {
            let target = if l("totale") {
                TOTALE_MATERIALI_PATH
            } else {
                IMMOBILIZZAZIONI_MATERIALI_PATH
            };
            return self.direct(target, name, line, context);
        }

        if l("totale")
            && l("imposte")
            && (l("reddito") || l("esercizio"))
            && (l("correnti") || l("differite") || l("anticipate"))
        {
            return self.direct(IMPOSTE_TOTALE_PATH, name, line, context);
        }

        if name == "Altri" && context.starts_with(FINANCIAL_CONTEXT) {
            return match self.financial_altri_target(value, &ll, context) {
                Some(forced) if self.exists(forced) => {
                    debug!("financial Altri -> {}", forced);
                    Some(forced.to_string())
                }
                _ => self.matched(name, line, context),
            };
        }

        if l("totale") && l("crediti") && l("soci") {
            return self.direct(CREDITI_SOCI_TOTALE_PATH, name, line, context);
        }

        if l("totale") && (l("disponibilita") || l("disponibilità")) && l("liquide") {
            return self.direct(DISPONIBILITA_TOTALE_PATH, name, line, context);
        }

        if l("totale") && l("proventi") && l("oneri") && l("finanziari") && (l("15+16") || l("c)")) {
            return self.direct(PROVENTI_ONERI_TOTALE_PATH, name, line, context);
        }

        if l("totale") && l("altri") && l("proventi") && l("finanziari") {
            if !l("diversi") || !l("precedenti") {
                return self.direct(ALTRI_PROVENTI_TOTALE_PATH, name, line, context);
            }
            return self.matched(name, line, context);
        }

        if l("totale") && l("interessi") && (l("oneri") || l("finanziari")) {
            return self.direct(INTERESSI_TOTALE_PATH, name, line, context);
        }

        if l("totale") && l("rettifiche") && (l("valore") || l("attivita") || l("passivita")) {
            return self.direct(RETTIFICHE_TOTALE_PATH, name, line, context);
        }

        if l("risultato") && l("prima") && l("imposte") {
            return self.matched(name, line, context);
        }

        if l("imposte") && l("correnti") && ctx_lower.contains("risultato_prima_delle_imposte") {
            return self.direct(IMPOSTE_CORRENTI_PATH, name, line, context);
        }

        if (l("crediti") && l("soci") && (l("versamenti") || l("ancora") || l("dovuti")))
            || context.ends_with(CREDITI_SOCI_CONTEXT)
        {
            return self.direct(CREDITI_SOCI_TOTALE_PATH, name, line, context);
        }

        if xbrl && l("totale") && l("proventi") && l("oneri") && l("finanziari") && !l("altri") {
            return self.direct(PROVENTI_ONERI_XBRL_TOTALE_PATH, name, line, context);
        }

        if pdf && l("totale") && l("proventi") && l("diversi") && l("precedenti") {
            return self.direct(PROVENTI_DIVERSI_TOTALE_PATH, name, line, context);
        }

        if xbrl && either("utile") && either("perdita") && either("esercizio") {
            if self.exists(UTILE_PN_PATH) {
                return Some(UTILE_PN_PATH.to_string());
            }
            return self.direct(UTILE_PN_ALT_PATH, name, line, context);
        }

        if xbrl && l("totale") && l("immobilizzazioni") && l("materiali") && !l("immateriali") {
            return self.direct(TOTALE_MATERIALI_PATH, name, line, context);
        }

        if xbrl && l("totale") && l("immobilizzazioni") && l("immateriali") {
            return self.direct(TOTALE_IMMATERIALI_PATH, name, line, context);
        }

        if l("utile") && l("perdita") && l("esercizio") {
            let target = if context.starts_with("Conto_economico") {
                UTILE_CE_PATH
            } else {
                UTILE_PN_PATH
            };
            return self.direct(target, name, line, context);
        }

        if xbrl && (l("variazione") || l("variazioni") || nl.contains("variazione")) && either("lavori") && either("corso")
        {
            return self.direct(VARIAZIONE_LAVORI_PATH, name, line, context);
        }

        if xbrl
            && either("ammortamento")
            && either("immobilizzazioni")
            && (either("immateriali") || either("immateriale"))
        {
            return self.direct(AMMORTAMENTO_IMMATERIALI_PATH, name, line, context);
        }

        if xbrl && l("ratei") && l("risconti") && ctx_lower.contains("passivo") {
            return self.direct(RATEI_PASSIVO_TOTALE_PATH, name, line, context);
        }

        if xbrl && l("verso") && l("imprese") && l("controllate") && l("esigibili") {
            let key = if l("entro") { ENTRO_KEY } else { OLTRE_KEY };
            let target = format!("{}.Verso_imprese_controllate.{}", CREDITI_PREFIX, key);
            if self.exists(&target) {
                return Some(target);
            }
            debug!("[SKIP] {} not in template", target);
            return None;
        }

        if xbrl && l("debiti verso istituti") && l("esigibili entro") {
            return self.direct(ISTITUTI_ENTRO_PATH, name, line, context);
        }

        if xbrl && l("ratei passivi") {
            return self.direct(RATEI_PASSIVI_PATH, name, line, context);
        }

        if xbrl && l("risconti passivi") {
            return self.direct(RISCONTI_PASSIVI_PATH, name, line, context);
        }

        if pdf && l("ratei") && l("risconti") && ctx_lower.contains("passivo") {
            return self.direct(RATEI_PASSIVO_TOTALE_PATH, name, line, context);
        }

        if pdf && l("imposte") && l("correnti") && ctx_lower.contains("risultato") && !l("totale") {
            return self.direct(IMPOSTE_CORRENTI_PATH, name, line, context);
        }

        if (l("contributi") && l("conto") && l("esercizio"))
            || (nl.contains("contributi") && nl.contains("conto") && nl.contains("esercizio"))
        {
            return self.direct(CONTRIBUTI_PATH, name, line, context);
        }

        if either("esigibili") && context.contains("Crediti") {
            return self.receivable_maturity(name, line, &ll, &nl, context);
        }

        self.matched(name, line, context)
    }

    /// Which financial "Altri" leaf a bare "Altri" row belongs to.
    fn financial_altri_target(&self, value: f64, line_lower: &str, context: &str) -> Option<&'static str> {
        let interessi_diff = get_number(self.tree, INTERESSI_TOTALE_LEAF_PATH)
            .map(|total| (value - total).abs())
            .filter(|diff| *diff < 1.0);
        let proventi_diff = get_number(self.tree, PROVENTI_DIVERSI_TOTALE_PATH)
            .map(|total| (value - total).abs())
            .filter(|diff| *diff < 1.0);
        match (interessi_diff, proventi_diff) {
            (Some(i), Some(p)) => return Some(if i <= p { INTERESSI_ALTRI_PATH } else { PROVENTI_DIVERSI_ALTRI_PATH }),
            (Some(_), None) => return Some(INTERESSI_ALTRI_PATH),
            (None, Some(_)) => return Some(PROVENTI_DIVERSI_ALTRI_PATH),
            (None, None) => {}
        }

        if line_lower.contains("interessi") || line_lower.contains("oneri") {
            return Some(INTERESSI_ALTRI_PATH);
        }
        if line_lower.contains("diversi") || line_lower.contains("precedenti") {
            return Some(PROVENTI_DIVERSI_ALTRI_PATH);
        }

        for previous in &self.recent_lines {
            let upper = previous.to_uppercase();
            if upper.contains("PROVENTI DIVERSI") || (upper.contains("DIVERSI") && upper.contains("PRECEDENTI")) {
                return Some(PROVENTI_DIVERSI_ALTRI_PATH);
            }
            if upper.contains("INTERESSI") && (upper.contains("ONERI") || upper.contains("FINANZIARI")) {
                return Some(INTERESSI_ALTRI_PATH);
            }
        }

        match self.tracker.last_financial_subsection() {
            Some(FinancialSubsection::Interessi) => return Some(INTERESSI_ALTRI_PATH),
            Some(FinancialSubsection::ProventiDiversi) => return Some(PROVENTI_DIVERSI_ALTRI_PATH),
            None => {}
        }

        if context.contains("Interessi_e_oneri_finanziari") {
            return Some(INTERESSI_ALTRI_PATH);
        }
        if context.contains("Proventi_diversi") {
            return Some(PROVENTI_DIVERSI_ALTRI_PATH);
        }

        match (
            self.matcher.is_used(INTERESSI_ALTRI_PATH),
            self.matcher.is_used(PROVENTI_DIVERSI_ALTRI_PATH),
        ) {
            (true, false) => Some(PROVENTI_DIVERSI_ALTRI_PATH),
            (false, true) => Some(INTERESSI_ALTRI_PATH),
            _ => None,
        }
    }

    /// "esigibili entro/oltre" rows under Crediti: the branch comes from the
    /// tracker, then from the headings just above.
    fn receivable_maturity(&mut self, name: &str, line: &str, ll: &str, nl: &str, context: &str) -> Option<String> {
        let branch = ReceivableBranch::from_context(context).or_else(|| {
            let mut lines = vec![ll.to_string()];
            lines.extend(self.recent_lines.iter().map(|l| l.to_lowercase()));
            ReceivableBranch::from_lines(&lines)
        });

        let entro = nl.contains("entro") || ll.contains("entro");
        let oltre = nl.contains("oltre") || ll.contains("oltre");
        let Some(branch) = branch.filter(|_| entro || oltre) else {
            return self.matched(name, line, context);
        };

        let key = if entro { ENTRO_KEY } else { OLTRE_KEY };
        let target = format!("{}.{}.{}", CREDITI_PREFIX, branch.key(), key);
        if self.exists(&target) {
            debug!("esigibili row routed to {}", target);
            return Some(target);
        }

        let fallback = self.matched(name, line, context);
        if branch == ReceivableBranch::Altri {
            if let Some(path) = &fallback {
                if path.contains("Crediti_tributari") && !path.contains("Verso_altri") {
                    warn!("rejected {} for a Verso_altri maturity row", path);
                    return None;
                }
            }
        }
        fallback
    }

    /// Path and value adjustments applied after selection. `None` drops the line.
    fn correct(&self, mut path: String, mut value: f64, name: &str, line: &str) -> Option<(String, f64)> {
        let nl = name.to_lowercase();
        let ll = line.to_lowercase();
        let either = |kw: &str| nl.contains(kw) || ll.contains(kw);

        if path.ends_with(RISERVA_DEROGHE_SUFFIX) {
            match riserva_deroghe_amount(line, self.text) {
                Some(v) => value = v,
                None => debug!("no amount beside article 2423 on {:?}", line),
            }
        }

        let immateriali_total = name.contains("Totale_immobilizzazioni_immateriali")
            || (nl.contains("immateriali") && nl.contains("totale") && nl.contains("immobilizzazioni"));
        if immateriali_total && path.contains("Immobilizzazioni_Materiali") && !path.contains("Immobilizzazioni_Immateriali")
        {
            if !self.exists(TOTALE_IMMATERIALI_PATH) {
                return None;
            }
            path = TOTALE_IMMATERIALI_PATH.to_string();
        }

        let materiali_total = name.contains("Totale_immobilizzazioni_materiali")
            || (nl.contains("materiali")
                && nl.contains("totale")
                && nl.contains("immobilizzazioni")
                && !nl.contains("immateriali"));
        if materiali_total && path.contains("Immobilizzazioni_Immateriali") && !path.contains("Immobilizzazioni_Materiali")
        {
            if !self.exists(TOTALE_MATERIALI_PATH) {
                return None;
            }
            path = TOTALE_MATERIALI_PATH.to_string();
        }

        if self.is_xbrl() {
            if either("utile") && either("perdita") && self.exists(UTILE_PN_PATH) {
                path = UTILE_PN_PATH.to_string();
            }
            if (either("variazione") || either("variazioni"))
                && either("lavori")
                && either("corso")
                && self.exists(VARIAZIONE_LAVORI_PATH)
            {
                path = VARIAZIONE_LAVORI_PATH.to_string();
            }
            if either("ammortamento")
                && either("immobilizzazioni")
                && (either("immateriali") || either("immateriale"))
                && self.exists(AMMORTAMENTO_IMMATERIALI_PATH)
            {
                path = AMMORTAMENTO_IMMATERIALI_PATH.to_string();
            }
        }

        if self.is_pdf() {
            value = self.correct_pdf_value(&mut path, value, line);
        }

        if (path == TOTALE_MATERIALI_PATH || path == TOTALE_IMMATERIALI_PATH) && value <= 0.0 {
            if let Some(v) = first_positive_amount(line) {
                value = v;
            }
        }

        if path.ends_with(CREDITI_SOCI_TOTALE_PATH) {
            if let Some(v) = END_AMOUNTS_RE
                .captures(line)
                .and_then(|caps| parse_italian_amount(&caps[1]))
            {
                value = v;
            }
        }

        Some((path, value))
    }

    /// Re-reads PDF amounts for paths whose first token is often wrong.
    fn correct_pdf_value(&self, path: &mut String, mut value: f64, line: &str) -> f64 {
        let threshold = self.config.altri_magnitude_threshold;

        if [
            PROVENTI_DIVERSI_TOTALE_PATH,
            ALTRI_PROVENTI_PDF_TOTALE_PATH,
            BANCHE_ENTRO_PATH,
            RATEI_PASSIVO_TOTALE_PATH,
        ]
        .contains(&path.as_str())
        {
            if let Some(v) = first_positive_amount(line) {
                value = v;
            }
        }

        if path.as_str() == PROVENTI_DIVERSI_ALTRI_PATH {
            let total = get_number(self.tree, PROVENTI_DIVERSI_TOTALE_PATH);
            let off_total = total.map(|t| (value - t).abs() > 1.0).unwrap_or(false);
            if value >= threshold || off_total {
                let amounts = amount_values(line);
                match total {
                    Some(t) => {
                        if let Some(v) = amounts.iter().find(|v| (**v - t).abs() < 1.0) {
                            value = *v;
                        }
                    }
                    None => {
                        if let Some(v) = amounts
                            .iter()
                            .copied()
                            .filter(|v| *v > 0.0 && *v < threshold)
                            .reduce(f64::min)
                        {
                            value = v;
                        }
                    }
                }
            }
        }

        if path.as_str() == INTERESSI_ALTRI_PATH && value > 0.0 && value < threshold {
            if let Some(v) = amount_values(line).into_iter().filter(|v| *v >= threshold).reduce(f64::max) {
                value = v;
            }
        }

        if path.as_str() == IMPOSTE_CORRENTI_PATH && AMOUNT_RE.is_match(line) {
            match IMPOSTE_CORRENTI_RE.captures(line) {
                Some(caps) => {
                    if let Some(v) = parse_italian_amount(&caps[1]).filter(|v| *v > 0.0) {
                        value = v;
                    }
                }
                None => {
                    if let Some(v) = first_positive_amount(line) {
                        value = v;
                    }
                }
            }
        }

        if path.contains("Immobilizzazioni_in_corso_e_acconti") {
            if path.contains("Immobilizzazioni_Immateriali") {
                let skip = self.recent_lines.len().saturating_sub(3);
                let recent = self
                    .recent_lines
                    .iter()
                    .skip(skip)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                if MATERIALI_HINTS.iter().any(|kw| recent.contains(kw)) {
                    debug!("in corso e acconti redirected to Materiali");
                    *path = CORSO_ACCONTI_MATERIALI_PATH.to_string();
                }
            }
            if path.contains(CORSO_ACCONTI_MATERIALI_PATH) {
                if let Some(v) = amount_values(line).into_iter().filter(|v| *v > 100.0).reduce(f64::max) {
                    value = v;
                }
            }
        }

        value
    }

    fn section_side(path: &str) -> Option<&'static str> {
        if path.starts_with("Stato_patrimoniale.Attivo") {
            Some("Attivo")
        } else if path.starts_with("Stato_patrimoniale.Passivo") {
            Some("Passivo")
        } else {
            None
        }
    }

    /// Writes `value` at `path` under the template guards.
    fn write(&mut self, path: &str, value: f64, name: &str, line: &str, context: &str) -> bool {
        if let (Some(ctx_side), Some(path_side)) = (Self::section_side(context), Self::section_side(path)) {
            if ctx_side != path_side {
                debug!("[SKIP] {} line matched {} path {}", ctx_side, path_side, path);
                return false;
            }
        }

        let (parent_path, last_key) = match path.rsplit_once('.') {
            Some((parent, key)) => (Some(parent), key),
            None => (None, path),
        };
        let parent_is_object = match parent_path {
            Some(parent) => get_path(self.tree, parent).map(Value::is_object).unwrap_or(false),
            None => self.tree.is_object(),
        };
        if !parent_is_object {
            debug!("[SKIP] {} has a missing or non-object parent", path);
            return false;
        }

        let parent_number = |key: &str| parent_path.and_then(|p| get_number(self.tree, &format!("{}.{}", p, key)));
        let expected_entro = if last_key == ISTITUTI_TOTALE_KEY && path.contains(ISTITUTI_PARENT_KEY) {
            parent_number(ENTRO_KEY)
        } else {
            None
        };

        if let Some(expected) = expected_entro {
            if expected > 0.0 {
                let diff = (value - expected).abs();
                if diff / expected >= 0.01 && expected > 1000.0 && value < 100.0 && diff > 1000.0 {
                    warn!("{} = {} is implausible next to {} due within the year", path, value, expected);
                    return false;
                }
                if diff / expected >= 0.01 && diff > expected * 2.0 {
                    warn!("{} = {} is far from {} due within the year", path, value, expected);
                }
            } else if value > 1000.0 {
                warn!("{} = {} while nothing is due within the year", path, value);
            }
        }

        let Some(slot) = get_path(self.tree, path) else {
            debug!("[SKIP] {} is not a template leaf", path);
            return false;
        };

        if slot.is_object() {
            return self.write_section_total(path, last_key, value, name, line, context);
        }

        if let Some(existing) = slot.as_f64() {
            let overwrite = last_key == ENTRO_KEY
                || last_key == OLTRE_KEY
                || (self.is_xbrl() && last_key == "Ammortamento_delle_immobilizzazioni_immateriale")
                || ((last_key == "Totale_immobilizzazioni_materiali" || last_key == "Totale_immobilizzazioni_immateriali")
                    && value > 0.0)
                || self.replaces_implausible_istituti_total(path, last_key, existing, value, expected_entro);

            if self.is_xbrl() && last_key == "Utile_(perdita)_dellesercizio" {
                set_existing_leaf(self.tree, path, value);
                for mirror in [UTILE_CE_APOSTROPHE_PATH, UTILE_CE_PATH] {
                    if set_existing_leaf(self.tree, mirror, value) {
                        debug!("{} mirrored to {}", path, mirror);
                        break;
                    }
                }
                debug!("[OK] {} -> {} = {}", name, path, value);
                return true;
            }

            if !overwrite && existing != 0.0 {
                debug!("[SKIP] {} already holds {}", path, existing);
                return false;
            }
        }

        if let Some(slot) = get_path_mut(self.tree, path) {
            *slot = Value::from(value);
        }
        debug!("[OK] {} -> {} = {}", name, path, value);
        true
    }

    fn replaces_implausible_istituti_total(
        &self,
        path: &str,
        last_key: &str,
        existing: f64,
        value: f64,
        expected_entro: Option<f64>,
    ) -> bool {
        if last_key != ISTITUTI_TOTALE_KEY || !path.contains(ISTITUTI_PARENT_KEY) {
            return false;
        }
        match expected_entro {
            Some(expected) => existing > expected * 5.0 || (expected > 1000.0 && (existing - expected).abs() > expected),
            None => existing < 100.0 && value > 1000.0,
        }
    }

    /// A value aimed at a section object lands on that section's total leaf.
    fn write_section_total(&mut self, path: &str, last_key: &str, mut value: f64, name: &str, line: &str, context: &str) -> bool {
        let total_key = if path.ends_with("Immobilizzazioni_Finanziarie") {
            if value <= 0.0 {
                return false;
            }
            Some("TOTALE".to_string())
        } else if path.ends_with("Immobilizzazioni_Materiali") {
            let nl = name.to_lowercase();
            if nl.contains("verso") && nl.contains("imprese") && nl.contains("controllate") && context.contains("Attivo_circolante") {
                return false;
            }
            if value <= 0.0 {
                value = first_positive_amount(line).unwrap_or(value);
            }
            if value <= 0.0 {
                return false;
            }
            Some("Totale_immobilizzazioni_materiali".to_string())
        } else if path.ends_with("Immobilizzazioni_Immateriali") {
            if value <= 0.0 {
                value = first_positive_amount(line).unwrap_or(value);
            }
            if value <= 0.0 {
                return false;
            }
            Some("Totale_immobilizzazioni_immateriali".to_string())
        } else if path.ends_with("Risultato_prima_delle_imposte") {
            Some("TOTALE".to_string())
        } else {
            self.single_total_child(path)
        };

        let Some(total_key) = total_key else {
            debug!("[SKIP] '{}' is a section without a single total; {} ignored", last_key, value);
            return false;
        };

        let target = format!("{}.{}", path, total_key);
        if set_existing_leaf(self.tree, &target, value) {
            debug!("[OK] {} -> {} = {}", name, target, value);
            true
        } else {
            debug!("[SKIP] {} has no {} leaf", path, total_key);
            false
        }
    }

    fn single_total_child(&self, path: &str) -> Option<String> {
        let section = get_path(self.tree, path)?.as_object()?;
        if section.get("TOTALE").map(Value::is_number).unwrap_or(false) {
            return Some("TOTALE".to_string());
        }
        let totals: Vec<&String> = section
            .iter()
            .filter(|(key, value)| key.starts_with("Totale_") && value.is_number())
            .map(|(key, _)| key)
            .collect();
        match totals.as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        }
    }
}

/// The reserve amount on a "Riserva da deroghe ex articolo 2423" row,
/// ignoring the pieces of the article number.
fn riserva_deroghe_amount(line: &str, text: &str) -> Option<f64> {
    fn candidates(s: &str) -> Vec<String> {
        AMOUNT_RE
            .find_iter(s)
            .map(|m| m.as_str().to_string())
            .filter(|tok| {
                let digits: String = tok.chars().filter(|c| c.is_ascii_digit()).collect();
                !ARTICLE_PIECES.contains(&digits.as_str())
            })
            .collect()
    }
    fn pick(tokens: &[String]) -> Option<&String> {
        if tokens.len() >= 2 {
            tokens.get(tokens.len() - 2)
        } else {
            tokens.last()
        }
    }

    let on_line = candidates(line);
    if let Some(tok) = pick(&on_line) {
        return parse_italian_amount(tok);
    }

    let tail = RISERVA_DEROGHE_RE.captures(text).map(|caps| caps[1].to_string())?;
    let in_text = candidates(&tail);
    pick(&in_text).and_then(|tok| parse_italian_amount(tok))
}

/// Fills `tree` from statement text and returns what happened.
///
/// `is_xbrl` forces the XBRL-specific rules whatever `file_type` says.
pub fn update_bilancio_json(tree: &mut Value, text: &str, is_xbrl: bool, file_type: FileType) -> UpdateReport {
    update_bilancio_json_with_config(tree, text, is_xbrl, file_type, ExtractionConfig::default())
}

pub fn update_bilancio_json_with_config(
    tree: &mut Value,
    text: &str,
    is_xbrl: bool,
    file_type: FileType,
    config: ExtractionConfig,
) -> UpdateReport {
    let source = if is_xbrl { FileType::Xbrl } else { file_type };
    BilancioUpdater::new(tree, text, source, config).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Value {
        json!({
            "informazioni_generali": {"id_bilancio": "1"},
            "Stato_patrimoniale": {
                "Attivo": {
                    "Crediti_verso_soci_per_versamenti_ancora_dovuti": {
                        "Totale_crediti_verso_soci_per_versamenti_ancora_dovuti": 0.0
                    },
                    "Immobilizzazioni": {
                        "Immobilizzazioni_Immateriali": {
                            "Avviamento": 0.0,
                            "Totale_immobilizzazioni_immateriali": 0.0
                        },
                        "Immobilizzazioni_Materiali": {
                            "Terreni_e_fabbricati": 0.0,
                            "Totale_immobilizzazioni_materiali": 0.0
                        }
                    },
                    "Attivo_circolante": {
                        "Crediti": {
                            "Verso_clienti": {
                                "esigibili_entro_l_esercizio_successivo": 0.0,
                                "esigibili_oltre_l_esercizio_successivo": 0.0
                            },
                            "Crediti_tributari": {
                                "esigibili_entro_l_esercizio_successivo": 0.0,
                                "esigibili_oltre_l_esercizio_successivo": 0.0
                            },
                            "Verso_altri": {
                                "esigibili_entro_l_esercizio_successivo": 0.0,
                                "esigibili_oltre_l_esercizio_successivo": 0.0
                            }
                        },
                        "Disponibilita_liquide": {
                            "Depositi_bancari_e_postali": 0.0,
                            "Totale_disponibilita_liquide": 0.0
                        }
                    }
                },
                "Passivo": {
                    "Patrimonio_netto": {
                        "Capitale": 0.0,
                        "Utile_(perdita)_dellesercizio": 0.0
                    },
                    "Debiti": {
                        "Debiti_verso_banche": {
                            "esigibili_entro_l_esercizio_successivo": 0.0
                        }
                    }
                }
            },
            "Conto_economico": {
                "Costi_di_produzione": {
                    "Altri_costi": 0.0
                },
                "Proventi_e_oneri_finanziari": {
                    "Altri_proventi_finanziari": {
                        "Proventi_diversi_dai_precedenti": {
                            "Altri": 0.0,
                            "Totale_proventi_diversi_dai_precedenti_immobilizzazioni": 0.0
                        }
                    },
                    "Interessi_e_oneri_finanziari": {
                        "Altri": 0.0,
                        "Totale_interessi_e_altri_oneri_finanziari": 0.0
                    }
                }
            }
        })
    }

    fn number(tree: &Value, path: &str) -> f64 {
        get_number(tree, path).unwrap()
    }

    #[test]
    fn test_merge_wrapped_label() {
        let lines = merge_lines("Crediti verso\nimprese controllate 1.000 900\nTotale 5.000");
        assert_eq!(lines, vec!["Crediti verso imprese controllate 1.000 900", "Totale 5.000"]);
    }

    #[test]
    fn test_merge_number_only_line() {
        let lines = merge_lines("Avviamento\n12.000 10.000");
        assert_eq!(lines, vec!["Avviamento 12.000 10.000"]);
    }

    #[test]
    fn test_standard_entries_are_not_merged() {
        let lines = merge_lines("Verso clienti\nesigibili entro l'esercizio successivo 1.000");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_previous_year_sign_is_dropped() {
        let lines = merge_lines("Utile 1.200 -745");
        assert_eq!(lines, vec!["Utile 1.200 745"]);
    }

    #[test]
    fn test_item_number_is_not_an_amount() {
        let lines = merge_lines("7) Altre 1.655.493 -1.291.912");
        assert_eq!(lines, vec!["7) Altre 1.655.493 1.291.912"]);
    }

    #[test]
    fn test_prefixes_and_filtering() {
        let lines = preprocess_lines("7) Altre 1.655.493 1.291.912\nII - Crediti\nNota senza importi\nPATRIMONIO NETTO");
        assert_eq!(lines, vec!["Altre 1.655.493 1.291.912", "PATRIMONIO NETTO"]);
    }

    #[test]
    fn test_dash_number_forces_zero() {
        let mut tree = template();
        let report = update_bilancio_json(&mut tree, "CONTO ECONOMICO\nAltri costi   -   745", false, FileType::Pdf);
        assert_eq!(report.values_written, 1);
        assert_eq!(number(&tree, "Conto_economico.Costi_di_produzione.Altri_costi"), 0.0);

        let mut tree = template();
        update_bilancio_json(&mut tree, "CONTO ECONOMICO\nAltri costi   745", false, FileType::Pdf);
        assert_eq!(number(&tree, "Conto_economico.Costi_di_produzione.Altri_costi"), 745.0);
    }

    #[test]
    fn test_lone_dash_does_not_fail() {
        let mut tree = template();
        let report = update_bilancio_json(&mut tree, "Altri costi\n-", false, FileType::Pdf);
        assert_eq!(report.values_written, 0);
        assert_eq!(number(&tree, "Conto_economico.Costi_di_produzione.Altri_costi"), 0.0);
    }

    #[test]
    fn test_totals_use_direct_paths() {
        let mut tree = template();
        let text = "STATO PATRIMONIALE\nATTIVO\nC) ATTIVO CIRCOLANTE\nTotale disponibilita liquide 12.345 10.000";
        update_bilancio_json(&mut tree, text, false, FileType::Pdf);
        assert_eq!(
            number(&tree, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Totale_disponibilita_liquide"),
            12345.0
        );
    }

    #[test]
    fn test_never_creates_keys() {
        let mut tree = template();
        let before = crate::template::extract_keys(&tree);
        update_bilancio_json(
            &mut tree,
            "STATO PATRIMONIALE\nATTIVO\nVoce inesistente nel modello 1.234 999\nTotale imposte sul reddito correnti 50.000",
            false,
            FileType::Pdf,
        );
        assert_eq!(crate::template::extract_keys(&tree), before);
    }

    #[test]
    fn test_esigibili_routed_by_heading() {
        let mut tree = template();
        let text = "STATO PATRIMONIALE\nATTIVO\nC) ATTIVO CIRCOLANTE\nII) CREDITI\n5-bis) crediti tributari\nesigibili entro l'esercizio successivo 4.500 3.000";
        update_bilancio_json(&mut tree, text, false, FileType::Pdf);
        assert_eq!(
            number(&tree, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari.esigibili_entro_l_esercizio_successivo"),
            4500.0
        );
    }

    #[test]
    fn test_existing_value_is_kept() {
        let mut tree = template();
        tree["Stato_patrimoniale"]["Attivo"]["Attivo_circolante"]["Disponibilita_liquide"]["Totale_disponibilita_liquide"] =
            json!(7.0);
        let text = "STATO PATRIMONIALE\nATTIVO\nTotale disponibilita liquide 12.345 10.000";
        update_bilancio_json(&mut tree, text, false, FileType::Pdf);
        assert_eq!(
            number(&tree, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Totale_disponibilita_liquide"),
            7.0
        );
    }

    #[test]
    fn test_section_value_goes_to_total_child() {
        let mut tree = template();
        let text = "STATO PATRIMONIALE\nATTIVO\nB) IMMOBILIZZAZIONI\nII - Immobilizzazioni materiali 80.000 70.000";
        update_bilancio_json(&mut tree, text, false, FileType::Pdf);
        assert_eq!(
            number(&tree, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Totale_immobilizzazioni_materiali"),
            80000.0
        );
    }

    #[test]
    fn test_financial_altri_matches_known_total() {
        let mut tree = template();
        tree["Conto_economico"]["Proventi_e_oneri_finanziari"]["Altri_proventi_finanziari"]["Proventi_diversi_dai_precedenti"]
            ["Totale_proventi_diversi_dai_precedenti_immobilizzazioni"] = json!(300.0);
        tree["Conto_economico"]["Proventi_e_oneri_finanziari"]["Interessi_e_oneri_finanziari"]
            ["Totale_interessi_e_altri_oneri_finanziari"] = json!(25000.0);

        let text = "CONTO ECONOMICO\nC) PROVENTI E ONERI FINANZIARI\nAltri 300 250";
        update_bilancio_json(&mut tree, text, false, FileType::Pdf);
        assert_eq!(
            number(&tree, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Altri"),
            300.0
        );
        assert_eq!(
            number(&tree, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Altri"),
            0.0
        );
    }

    #[test]
    fn test_xbrl_utile_is_forced_to_equity() {
        let mut tree = template();
        let text = "STATO PATRIMONIALE\nPASSIVO\nUtile (perdita) dell'esercizio 1.500";
        update_bilancio_json(&mut tree, text, true, FileType::Xbrl);
        assert_eq!(
            number(&tree, "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dellesercizio"),
            1500.0
        );
    }

    #[test]
    fn test_riserva_deroghe_ignores_article_number() {
        assert_eq!(
            riserva_deroghe_amount("Riserva da deroghe ex articolo 2423 codice civile 1.000 800", ""),
            Some(1000.0)
        );
        assert_eq!(
            riserva_deroghe_amount(
                "Riserva da deroghe ex articolo 2423",
                "Riserva da deroghe ex articolo 2423 codice civile 5.000"
            ),
            Some(5000.0)
        );
    }

    #[test]
    fn test_receivable_branch_detection() {
        let lines = vec!["esigibili entro".to_string(), "5-quater) verso altri".to_string()];
        assert_eq!(ReceivableBranch::from_lines(&lines), Some(ReceivableBranch::Altri));
        let lines = vec!["1) verso clienti".to_string()];
        assert_eq!(ReceivableBranch::from_lines(&lines), Some(ReceivableBranch::Clienti));
        assert_eq!(
            ReceivableBranch::from_context("Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari"),
            Some(ReceivableBranch::Tributari)
        );
    }
}
