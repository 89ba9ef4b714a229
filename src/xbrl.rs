//! XBRL instance documents rendered as statement-like text lines.
//!
//! Facts are read in document order until the first note/cash-flow element,
//! mapped to a label and a section, and emitted under the same headings a PDF
//! statement would show so the updater can treat both sources alike.

use crate::error::{BilancioError, Result};
use crate::labels::{infer_section_path, normalize_label_tokens, prettify_label_from_tokens, tokenize_camel_case};
use crate::numeric::{format_amount_with_cap, parse_xbrl_numeric};
use crate::schema::{ExtractionConfig, Observation};
use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

pub const XBRLI_NS: &str = "http://www.xbrl.org/2003/instance";

/// A registered fact: the label it renders as, its section, and any other
/// sections the same line must also appear under. An empty label drops the fact.
#[derive(Debug, Clone, Copy)]
pub struct FactMapping {
    pub label: &'static str,
    pub section: Option<&'static str>,
    pub additional_sections: &'static [&'static str],
}

const fn fact(label: &'static str, section: &'static str) -> FactMapping {
    FactMapping {
        label,
        section: Some(section),
        additional_sections: &[],
    }
}

const fn ignored() -> FactMapping {
    FactMapping {
        label: "",
        section: None,
        additional_sections: &[],
    }
}

pub const SECTION_HEADERS: &[(&str, &str)] = &[
    ("Stato_patrimoniale", "STATO PATRIMONIALE"),
    ("Stato_patrimoniale.Attivo", "ATTIVO"),
    ("Stato_patrimoniale.Attivo.Immobilizzazioni", "IMMOBILIZZAZIONI"),
    ("Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali", "IMMOBILIZZAZIONI IMMATERIALI"),
    ("Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali", "IMMOBILIZZAZIONI MATERIALI"),
    ("Stato_patrimoniale.Attivo.Attivo_circolante", "ATTIVO CIRCOLANTE"),
    ("Stato_patrimoniale.Attivo.Attivo_circolante.Crediti", "CREDITI"),
    ("Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide", "DISPONIBILITA LIQUIDE"),
    ("Stato_patrimoniale.Attivo.Ratei_e_risconti", "RATEI E RISCONTI"),
    ("Stato_patrimoniale.Passivo", "PASSIVO"),
    ("Stato_patrimoniale.Passivo.Patrimonio_netto", "PATRIMONIO NETTO"),
    ("Stato_patrimoniale.Passivo.Debiti", "DEBITI"),
    ("Stato_patrimoniale.Passivo.Trattamento_di_fine_rapporto_di_lavoro_subordinato", "TRATTAMENTO DI FINE RAPPORTO"),
    ("Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche", "DEBITI VERSO BANCHE"),
    ("Stato_patrimoniale.Passivo.Debiti.Debiti_verso_fornitori", "DEBITI VERSO FORNITORI"),
    ("Stato_patrimoniale.Passivo.Debiti.Debiti_tributari", "DEBITI TRIBUTARI"),
    (
        "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale",
        "DEBITI VERSO ISTITUTI DI PREVIDENZA E DI SICUREZZA SOCIALE",
    ),
    ("Stato_patrimoniale.Passivo.Debiti.Altri_debiti", "ALTRI DEBITI"),
    ("Stato_patrimoniale.Passivo.Ratei_e_risconti", "RATEI E RISCONTI"),
    ("Conto_economico", "CONTO ECONOMICO"),
    ("Conto_economico.Valore_della_produzione", "VALORE DELLA PRODUZIONE"),
    ("Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi", "ALTRI RICAVI E PROVENTI"),
    ("Conto_economico.Costi_di_produzione", "COSTI DELLA PRODUZIONE"),
    ("Conto_economico.Risultato_prima_delle_imposte", "RISULTATO PRIMA DELLE IMPOSTE"),
    (
        "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate",
        "IMPOSTE SUL REDDITO DI ESERCIZIO CORRENTI DIFFERITE ANTICIPATE",
    ),
    ("Conto_economico.Proventi_e_oneri_finanziari", "PROVENTI E ONERI FINANZIARI"),
    ("Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari", "INTERESSI E ONERI FINANZIARI"),
    ("Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari", "ALTRI PROVENTI FINANZIARI"),
    (
        "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti",
        "PROVENTI DIVERSI DAI PRECEDENTI",
    ),
    (
        "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie ",
        "RETTIFICHE DI VALORE DI ATTIVITA PASSIVITA E FINANZIARIE",
    ),
];

pub const STOP_FACTS: &[&str] = &[
    "RendicontoFinanziarioMetodoIndiretto",
    "FlussoFinanziarioAttivitaOperativa",
    "FlussoFinanziarioAttivitaInvestimento",
    "FlussoFinanziarioAttivitaFinanziamento",
    "FlussoFinanziarioDopoVariazioniCapitaleCircolanteNetto",
];

pub const STOP_PREFIXES: &[&str] = &["FlussiFinanziariDerivanti", "FlussoFinanziario", "RendicontoFinanziario"];

/// Substrings of element names that open the notes section.
pub const STOP_KEYWORDS: &[&str] = &["notes", "nota", "integrativa", "information", "details", "tabella", "table"];

/// Equity and accrual facts that some filers place after the cash-flow block.
pub const ALLOW_AFTER_STOP: &[&str] = &[
    "PatrimonioNettoCapitale",
    "PatrimonioNettoRiservaLegale",
    "PatrimonioNettoUtilePerditaEsercizio",
    "UtilePerditaEsercizio",
    "PatrimonioNettoUtiliPerditePortatiNuovo",
    "PatrimonioNettoAltreRiserveDistintamenteIndicateRiservaStraordinaria",
    "PatrimonioNettoAltreRiserveDistintamenteIndicateTotaleAltreRiserve",
    "VarieAltreRiserve",
    "TotalePatrimonioNetto",
    "RateiPassiviValoreInizioEsercizio",
    "RiscontiPassiviValoreInizioEsercizio",
    "PassivoRateiRisconti",
];

/// Facts whose sign carries no statement meaning.
pub const ABSOLUTE_FACTS: &[&str] = &[
    "TotaleProventiOneriFinanziari",
    "ProventiOneriFinanziariAltriProventiFinanziariTotaleAltriProventiFinanziari",
];

pub const BLOCKED_TAGS: &[&str] = &[
    "DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliEntroEsercizioSuccessivo",
    "DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeTotaleDebitiVersoIstitutiPrevidenzaSicurezzaSociale",
];

/// Movement and maturity breakdowns from the notes, never statement values.
pub const BLOCKED_KEYWORDS: &[&str] = &[
    "ValoreInizioEsercizio",
    "VariazioneEsercizio",
    "QuotaScadente",
    "AltreDestinazioni",
    "Decrementi",
    "Incrementi",
    "VariazioniEsercizio",
];

const IMMATERIALI: &str = "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali";
const MATERIALI: &str = "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali";

pub const FACT_MAP: &[(&str, FactMapping)] = &[
    ("TotaleAttivo", fact("Totale attivo", "Stato_patrimoniale.Attivo")),
    ("TotalePassivo", fact("Totale passivo", "Stato_patrimoniale.Passivo")),
    ("TotalePatrimonioNetto", fact("Totale patrimonio netto", "Stato_patrimoniale.Passivo.Patrimonio_netto")),
    (
        "PatrimonioNettoUtiliPerditePortatiNuovo",
        fact(
            "Utili (perdite) portati a nuovo",
            "Stato_patrimoniale.Passivo.Patrimonio_netto.Utili_(perdite)_portati_a_nuovo",
        ),
    ),
    ("PatrimonioNettoCapitale", fact("Capitale", "Stato_patrimoniale.Passivo.Patrimonio_netto.Capitale")),
    (
        "PatrimonioNettoRiservaLegale",
        fact("Riserva legale", "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_legali"),
    ),
    (
        "PatrimonioNettoAltreRiserveDistintamenteRiservaStraordinaria",
        fact(
            "Riserva straordinaria",
            "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_straordinaria",
        ),
    ),
    (
        "VarieAltreRiserve",
        fact(
            "Varie altre riserve",
            "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Varie_altre_riserve",
        ),
    ),
    (
        "PatrimonioNettoAltreRiserveDistintamenteIndicateVarieAltreRiserve",
        fact(
            "Varie altre riserve",
            "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Varie_altre_riserve",
        ),
    ),
    (
        "UtilePerditaEsercizio",
        FactMapping {
            label: "Utile (perdita) dell esercizio",
            section: Some("Conto_economico.Risultato_prima_delle_imposte.Utile_(perdita)_dell'esercizio"),
            additional_sections: &["Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dellesercizio"],
        },
    ),
    (
        "PatrimonioNettoUtilePerditaEsercizio",
        fact(
            "Utile (perdita) dell esercizio",
            "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dellesercizio",
        ),
    ),
    (
        "ValoreProduzioneRicaviVenditePrestazioni",
        fact(
            "Ricavi delle vendite e delle prestazioni",
            "Conto_economico.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni",
        ),
    ),
    (
        "ValoreProduzioneAltriRicaviProventiAltri",
        fact("Altri", "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Altri"),
    ),
    ("CostiProduzioneServizi", fact("Per servizi", "Conto_economico.Costi_di_produzione.Per_servizi")),
    (
        "CostiProduzioneGodimentoBeniTerzi",
        fact("Per godimento di beni di terzi", "Conto_economico.Costi_di_produzione.Per_godimento_di_terzi"),
    ),
    (
        "CostiProduzionePersonaleSalariStipendi",
        fact("Salari e stipendi", "Conto_economico.Costi_di_produzione.Per_personale.Salari_e_stipendi"),
    ),
    (
        "CostiProduzionePersonaleOneriSociali",
        fact("Oneri sociali", "Conto_economico.Costi_di_produzione.Per_personale.Oneri_sociali"),
    ),
    (
        "CostiProduzionePersonaleTrattamentoFineRapporto",
        fact(
            "Trattamento di fine rapporto",
            "Conto_economico.Costi_di_produzione.Per_personale.Trattamento_di_fine_rapporto",
        ),
    ),
    (
        "CostiProduzionePersonaleAltriCosti",
        fact("Altri costi", "Conto_economico.Costi_di_produzione.Per_personale.Altri_costi"),
    ),
    (
        "ProventiOneriFinanziariAltriProventiFinanziariProventiDiversiPrecedentiTotaleProventiDiversiPrecedenti",
        fact(
            "Totale proventi diversi dai precedenti immobilizzazioni",
            "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Totale_proventi_diversi_dai_precedenti_immobilizzazioni",
        ),
    ),
    (
        "ProventiOneriFinanziariAltriProventiFinanziariCreditiIscrittiImmobilizzazioniAltri",
        fact(
            "Da altri (crediti iscritti nelle immobilizzazioni)",
            "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_altri",
        ),
    ),
    (
        "ProventiOneriFinanziariAltriProventiFinanziariProventiDiversiPrecedentiAltri",
        fact(
            "Altri",
            "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Altri",
        ),
    ),
    (
        "ProventiOneriFinanziariInteressiAltriOneriFinanziariAltri",
        fact("Altri", "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Altri"),
    ),
    (
        "CostiProduzioneAmmortamentiSvalutazioniAmmortamentoImmobilizzazioniMateriali",
        fact(
            "Ammortamento delle immobilizzazioni materiali",
            "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_materiali",
        ),
    ),
    (
        "CostiProduzioneAmmortamentiSvalutazioniAmmortamentoImmobilizzazioniImmateriali",
        fact(
            "Ammortamento delle immobilizzazioni immateriali",
            "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_immateriale",
        ),
    ),
    (
        "CostiProduzioneOneriDiversiGestione",
        fact("Oneri diversi di gestione", "Conto_economico.Costi_di_produzione.Oneri_diversi_di_gestione"),
    ),
    (
        "DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliOltreEsercizioSuccessivo",
        fact(
            "Debiti verso istituti di previdenza e di sicurezza sociale esigibili oltre l esercizio successivo",
            "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.esigibili_oltre_l_esercizio_successivo",
        ),
    ),
    (
        "RateiPassiviValoreInizioEsercizio",
        fact("Ratei passivi", "Stato_patrimoniale.Passivo.Ratei_e_risconti.Ratei_passivi"),
    ),
    (
        "RiscontiPassiviValoreInizioEsercizio",
        fact("Risconti passivi", "Stato_patrimoniale.Passivo.Ratei_e_risconti.Risconti_passivi"),
    ),
    ("TotaleDebiti", fact("Totale debiti", "Stato_patrimoniale.Passivo.Debiti")),
    ("TotaleCrediti", fact("Totale crediti", "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti")),
    ("TotaleAttivoCircolante", fact("Totale attivo circolante", "Stato_patrimoniale.Attivo.Attivo_circolante")),
    ("TotaleImmobilizzazioni", fact("Totale immobilizzazioni", "Stato_patrimoniale.Attivo.Immobilizzazioni")),
    (
        "TotaleImmobilizzazioniImmateriali",
        fact(
            "Totale immobilizzazioni immateriali",
            "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Totale_immobilizzazioni_immateriali",
        ),
    ),
    ("ImmobilizzazioniImmaterialiCostiImpiantoAmpliamento", fact("Costi impianto e di ampliamento", IMMATERIALI)),
    ("ImmobilizzazioniImmaterialiCostiSviluppo", fact("Costi di sviluppo", IMMATERIALI)),
    (
        "ImmobilizzazioniImmaterialiDirittiBrevettoIndustrialeUtilizzazioneOpereIngegno",
        fact(
            "Diritti di brevetto industriale e diritti di utilizzazione opere dell ingegno",
            IMMATERIALI,
        ),
    ),
    (
        "ImmobilizzazioniImmaterialiConcessioniLicenzeMarchiDirittiSimili",
        fact("Concessioni licenze marchi e diritti simili", IMMATERIALI),
    ),
    ("ImmobilizzazioniImmaterialiAvviamento", fact("Avviamento", IMMATERIALI)),
    (
        "ImmobilizzazioniImmaterialiImmobilizzazioniCorsoAcconti",
        fact("Immobilizzazioni in corso e acconti", IMMATERIALI),
    ),
    ("ImmobilizzazioniImmaterialiAltre", fact("Altre", IMMATERIALI)),
    (
        "TotaleImmobilizzazioniMateriali",
        fact(
            "Totale immobilizzazioni materiali",
            "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Totale_immobilizzazioni_materiali",
        ),
    ),
    ("ImmobilizzazioniMaterialiTerreniFabbricati", fact("Terreni e fabbricati", MATERIALI)),
    ("ImmobilizzazioniMaterialiImpiantiMacchinario", fact("Impianti e macchinari", MATERIALI)),
    (
        "ImmobilizzazioniMaterialiAttrezzatureIndustrialiCommerciali",
        fact("Attrezzature industriali e commerciali", MATERIALI),
    ),
    ("ImmobilizzazioniMaterialiAltriBeni", fact("Altri beni", MATERIALI)),
    (
        "ImmobilizzazioniMaterialiImmobilizzazioniCorsoAcconti",
        fact("Immobilizzazioni in corso e acconti", MATERIALI),
    ),
    (
        "TotaleDisponibilitaLiquide",
        fact(
            "Totale disponibilita liquide",
            "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide",
        ),
    ),
    (
        "DisponibilitaLiquideDepositiBancariPostali",
        fact(
            "Depositi bancari e postali",
            "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Depositi_bancari_e_postali:",
        ),
    ),
    (
        "DisponibilitaLiquideAssegni",
        fact("Assegni", "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Assegni"),
    ),
    (
        "DisponibilitaLiquideDanaroValoriCassa",
        fact(
            "Denaro e valori in cassa",
            "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Denaro_e_valori_in_cassa",
        ),
    ),
    (
        "CreditiImposteAnticipateTotaleImposteAnticipate",
        fact("Imposte anticipate", "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Imposte_anticipate"),
    ),
    ("TotaleValoreProduzione", fact("Totale valore della produzione", "Conto_economico.Valore_della_produzione")),
    ("TotaleCostiProduzione", fact("Totale costi della produzione", "Conto_economico.Costi_di_produzione")),
    (
        "TotaleProventiOneriFinanziari",
        fact(
            "Totale proventi e oneri finanziari",
            "Conto_economico.Proventi_e_oneri_finanziari.Totale_proventi_e_oneri_finanziari",
        ),
    ),
    (
        "ProventiOneriFinanziariAltriProventiFinanziariTotaleAltriProventiFinanziari",
        fact(
            "Totale altri proventi finanziari",
            "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Totale_altri_proventi_finanziari",
        ),
    ),
    (
        "ProventiOneriFinanziariInteressiAltriOneriFinanziariTotaleInteressiAltriOneriFinanziari",
        fact(
            "Totale interessi e altri oneri finanziari",
            "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Totale_interessi_e_altri_oneri_finanziari",
        ),
    ),
    (
        "ImposteRedditoEsercizioCorrentiDifferiteAnticipateImposteCorrenti",
        fact(
            "Imposte correnti",
            "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Imposte_correnti",
        ),
    ),
    (
        "RisultatoPrimaImposte",
        fact("Risultato prima delle imposte", "Conto_economico.Risultato_prima_delle_imposte"),
    ),
    // cost breakdowns from the fixed-asset notes
    ("CostoTotaleImmobilizzazioniMateriali", ignored()),
    ("CostoImmobilizzazioniMaterialiCorsoAcconti", ignored()),
    ("CostoImpiantiMacchinario", ignored()),
    ("CostoAttrezzatureIndustrialiCommerciali", ignored()),
    ("CostoAltreImmobilizzazioniMateriali", ignored()),
    ("CostoTotaleImmobilizzazioniImmateriali", ignored()),
    ("CostoImmobilizzazioniImmaterialiCostiImpiantoAmpliamento", ignored()),
    ("CostoImmobilizzazioniImmaterialiCostiSviluppo", ignored()),
    ("CostoImmobilizzazioniImmaterialiDirittiBrevettoIndustrialeUtilizzazioneOpereIngegno", ignored()),
    ("CostoImmobilizzazioniImmaterialiConcessioniLicenzeMarchiDirittiSimili", ignored()),
    ("CostoImmobilizzazioniImmaterialiAvviamento", ignored()),
    ("CostoImmobilizzazioniImmaterialiImmobilizzazioniCorsoAcconti", ignored()),
    ("CostoImmobilizzazioniImmaterialiAltre", ignored()),
];

lazy_static! {
    static ref ENTITY_RE: Regex = Regex::new(r"&[a-zA-Z][a-zA-Z0-9]*;").unwrap();
    static ref FACT_LOOKUP: HashMap<&'static str, FactMapping> = FACT_MAP.iter().copied().collect();
    static ref HEADER_LOOKUP: HashMap<&'static str, &'static str> = SECTION_HEADERS.iter().copied().collect();
}

pub fn lookup_fact(name: &str) -> Option<&'static FactMapping> {
    FACT_LOOKUP.get(name)
}

pub fn is_blocked(name: &str) -> bool {
    BLOCKED_TAGS.contains(&name) || BLOCKED_KEYWORDS.iter().any(|kw| name.contains(kw))
}

fn is_stop_fact(name: &str) -> bool {
    STOP_FACTS.contains(&name) || STOP_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Drops named entity references (`&nbsp;` and friends) that are undeclared in
/// most filings and would otherwise fail the parse.
pub fn strip_undefined_entities(content: &str) -> String {
    ENTITY_RE.replace_all(content, "").into_owned()
}

fn parse_period_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").ok().map(|dt| dt.date()))
        .or_else(|| raw.get(..10).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()))
}

fn child<'a, 'input>(node: roxmltree::Node<'a, 'input>, name: &str) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name && c.tag_name().namespace() == Some(XBRLI_NS))
}

/// Reporting date of a `<context>`: the instant, or the end date of a duration.
fn context_date(context: roxmltree::Node) -> Option<NaiveDate> {
    let period = child(context, "period")?;
    if let Some(instant) = child(period, "instant").and_then(|n| n.text()) {
        if !instant.trim().is_empty() {
            return parse_period_date(instant);
        }
    }
    child(period, "endDate")
        .and_then(|n| n.text())
        .filter(|t| !t.trim().is_empty())
        .and_then(parse_period_date)
}

#[derive(Debug, Clone)]
struct FactEntry {
    name: String,
    label: String,
    section: Option<String>,
    values: HashMap<String, (Decimal, Option<u32>)>,
}

#[derive(Default)]
struct FactEntries {
    entries: Vec<FactEntry>,
    positions: HashMap<String, usize>,
}

impl FactEntries {
    fn record(&mut self, key: String, fact_name: &str, label: &str, section: Option<String>, context: &str, value: (Decimal, Option<u32>)) {
        let idx = match self.positions.get(&key) {
            Some(&idx) => idx,
            None => {
                self.entries.push(FactEntry {
                    name: fact_name.to_string(),
                    label: label.to_string(),
                    section,
                    values: HashMap::new(),
                });
                self.positions.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        self.entries[idx].values.insert(context.to_string(), value);
    }
}

/// Parses an instance document into rendered observations: section headings
/// followed by `label amount [amount...]` lines, most recent context first.
pub fn extract_xbrl_observations(content: &str) -> Result<Vec<Observation>> {
    extract_xbrl_observations_with_config(content, &ExtractionConfig::default())
}

/// Like [`extract_xbrl_observations`], rendering amounts with at most
/// `config.max_format_decimals` decimals.
pub fn extract_xbrl_observations_with_config(content: &str, config: &ExtractionConfig) -> Result<Vec<Observation>> {
    let cleaned = strip_undefined_entities(content);
    let doc = roxmltree::Document::parse(&cleaned).map_err(|e| BilancioError::XbrlParse(e.to_string()))?;
    let root = doc.root_element();

    let mut context_dates: Vec<(String, Option<NaiveDate>)> = Vec::new();
    for context in root
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "context" && n.tag_name().namespace() == Some(XBRLI_NS))
    {
        if let Some(id) = context.attribute("id").filter(|id| !id.is_empty()) {
            context_dates.push((id.to_string(), context_date(context)));
        }
    }
    let known_contexts: HashSet<&str> = context_dates.iter().map(|(id, _)| id.as_str()).collect();

    let mut ordered_contexts = context_dates.clone();
    // dated contexts newest first, undated ones last in document order
    ordered_contexts.sort_by(|a, b| match (a.1, b.1) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    let ordered_ids: Vec<String> = ordered_contexts.into_iter().map(|(id, _)| id).collect();

    let mut facts = FactEntries::default();
    let mut stopped = false;

    for element in root.descendants().filter(|n| n.is_element()) {
        if element.tag_name().namespace().is_none() {
            continue;
        }
        let name = element.tag_name().name();
        let lower = name.to_lowercase();

        if STOP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            if !stopped {
                debug!("xbrl: notes start at <{}>", name);
            }
            stopped = true;
            continue;
        }
        if !stopped {
            if is_stop_fact(name) {
                debug!("xbrl: cash-flow block starts at <{}>", name);
                stopped = true;
                continue;
            }
        } else if !ALLOW_AFTER_STOP.contains(&name) {
            continue;
        }

        let Some(context_ref) = element.attribute("contextRef") else {
            continue;
        };
        if !known_contexts.contains(context_ref) {
            continue;
        }
        let raw_text = element.text().map(str::trim).unwrap_or("");
        if raw_text.is_empty() {
            continue;
        }
        if is_blocked(name) {
            continue;
        }
        let Some(parsed) = parse_xbrl_numeric(raw_text, element.attribute("decimals")) else {
            continue;
        };

        let mapping = lookup_fact(name);
        let (label, section) = match mapping {
            Some(m) if m.label.is_empty() => continue,
            Some(m) => (m.label.to_string(), m.section.map(str::to_string)),
            None => {
                let tokens = normalize_label_tokens(&tokenize_camel_case(name));
                let label = prettify_label_from_tokens(&tokens);
                if label.is_empty() {
                    continue;
                }
                let section = infer_section_path(&label);
                (label, section)
            }
        };

        facts.record(name.to_string(), name, &label, section, context_ref, parsed);
        if let Some(m) = mapping {
            for extra in m.additional_sections {
                let key = format!("{}_{}", name, extra.replace('.', "_"));
                facts.record(key, name, &label, Some(extra.to_string()), context_ref, parsed);
            }
        }
    }

    let mut observations = Vec::new();
    let mut header_stack: Vec<&'static str> = Vec::new();

    for entry in &facts.entries {
        if let Some(section) = entry.section.as_deref().filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = section.split('.').collect();
            let targets: Vec<&'static str> = (1..=parts.len())
                .filter_map(|i| HEADER_LOOKUP.get(parts[..i].join(".").as_str()).copied())
                .collect();
            let shared = header_stack
                .iter()
                .zip(targets.iter())
                .take_while(|(a, b)| a == b)
                .count();
            header_stack.truncate(shared);
            for header in &targets[shared..] {
                observations.push(Observation::heading(header));
                header_stack.push(*header);
            }
        }

        let absolute = ABSOLUTE_FACTS.contains(&entry.name.as_str());
        let mut current: Option<Decimal> = None;
        let mut formatted = Vec::new();
        for id in &ordered_ids {
            if let Some((value, decimals)) = entry.values.get(id) {
                let value = if absolute { value.abs() } else { *value };
                if current.is_none() {
                    current = Some(value);
                }
                formatted.push(format_amount_with_cap(value, *decimals, config.max_format_decimals));
            }
        }
        if formatted.is_empty() {
            continue;
        }

        observations.push(Observation {
            label: entry.label.clone(),
            line: format!("{} {}", entry.label, formatted.join(" ")),
            value: current,
        });
    }

    Ok(observations)
}

pub fn xbrl_text_from_str(content: &str) -> Result<String> {
    xbrl_text_from_str_with_config(content, &ExtractionConfig::default())
}

pub fn xbrl_text_from_str_with_config(content: &str, config: &ExtractionConfig) -> Result<String> {
    let observations = extract_xbrl_observations_with_config(content, config)?;
    Ok(observations
        .iter()
        .map(|o| o.line.as_str())
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Reads an XBRL instance file and renders it as statement text.
pub fn extract_text_from_xbrl<P: AsRef<Path>>(path: P) -> Result<String> {
    extract_text_from_xbrl_with_config(path, &ExtractionConfig::default())
}

pub fn extract_text_from_xbrl_with_config<P: AsRef<Path>>(path: P, config: &ExtractionConfig) -> Result<String> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let text = xbrl_text_from_str_with_config(&content, config)?;
    info!("xbrl {}: rendered {} lines", path.display(), text.lines().count());
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:itcc-ci="http://www.infocamere.it/itnn/fr/itcc/ci/2018-11-04">
  <xbrli:context id="c2023"><xbrli:entity/><xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period></xbrli:context>
  <xbrli:context id="c2022"><xbrli:entity/><xbrli:period><xbrli:instant>2022-12-31</xbrli:instant></xbrli:period></xbrli:context>
  <xbrli:context id="d2023"><xbrli:entity/><xbrli:period><xbrli:startDate>2023-01-01</xbrli:startDate><xbrli:endDate>2023-12-31</xbrli:endDate></xbrli:period></xbrli:context>
{}
</xbrli:xbrl>"#,
            body
        )
    }

    #[test]
    fn test_newest_context_first_with_headers() {
        let xml = instance(
            r#"<itcc-ci:TotaleAttivo contextRef="c2022" decimals="0">900</itcc-ci:TotaleAttivo>
<itcc-ci:TotaleAttivo contextRef="c2023" decimals="0">1000</itcc-ci:TotaleAttivo>"#,
        );
        let text = xbrl_text_from_str(&xml).unwrap();
        assert_eq!(text, "STATO PATRIMONIALE\nATTIVO\nTotale attivo 1.000 900");
    }

    #[test]
    fn test_end_date_context_is_accepted() {
        let xml = instance(r#"<itcc-ci:TotaleValoreProduzione contextRef="d2023" decimals="0">5000</itcc-ci:TotaleValoreProduzione>"#);
        let observations = extract_xbrl_observations(&xml).unwrap();
        let last = observations.last().unwrap();
        assert_eq!(last.line, "Totale valore della produzione 5.000");
        assert_eq!(last.value, Some(Decimal::from(5000)));
    }

    #[test]
    fn test_blocked_and_ignored_facts() {
        let xml = instance(
            r#"<itcc-ci:DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliEntroEsercizioSuccessivo contextRef="c2023" decimals="0">10</itcc-ci:DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliEntroEsercizioSuccessivo>
<itcc-ci:ImmobilizzazioniMaterialiValoreInizioEsercizio contextRef="c2023" decimals="0">10</itcc-ci:ImmobilizzazioniMaterialiValoreInizioEsercizio>
<itcc-ci:CostoImpiantiMacchinario contextRef="c2023" decimals="0">10</itcc-ci:CostoImpiantiMacchinario>"#,
        );
        assert_eq!(xbrl_text_from_str(&xml).unwrap(), "");
    }

    #[test]
    fn test_utile_duplicated_into_equity() {
        let xml = instance(r#"<itcc-ci:UtilePerditaEsercizio contextRef="c2023" decimals="0">-250</itcc-ci:UtilePerditaEsercizio>"#);
        let text = xbrl_text_from_str(&xml).unwrap();
        let utile_lines: Vec<&str> = text.lines().filter(|l| l.starts_with("Utile")).collect();
        assert_eq!(utile_lines, vec!["Utile (perdita) dell esercizio -250"; 2]);
        assert!(text.contains("RISULTATO PRIMA DELLE IMPOSTE"));
        assert!(text.contains("PATRIMONIO NETTO"));
    }

    #[test]
    fn test_absolute_facts_and_notes_stop() {
        let xml = instance(
            r#"<itcc-ci:TotaleProventiOneriFinanziari contextRef="d2023" decimals="0">-1200</itcc-ci:TotaleProventiOneriFinanziari>
<itcc-ci:NotaIntegrativaAbstract/>
<itcc-ci:TotaleCrediti contextRef="c2023" decimals="0">77</itcc-ci:TotaleCrediti>"#,
        );
        let text = xbrl_text_from_str(&xml).unwrap();
        assert!(text.contains("Totale proventi e oneri finanziari 1.200"));
        assert!(!text.contains("Totale crediti"));
    }

    #[test]
    fn test_decimal_cap_follows_config() {
        let xml = instance(r#"<itcc-ci:TotaleAttivo contextRef="c2023" decimals="INF">1234.56789</itcc-ci:TotaleAttivo>"#);
        assert!(xbrl_text_from_str(&xml).unwrap().ends_with("Totale attivo 1.234,56789"));

        let config = ExtractionConfig {
            max_format_decimals: 2,
            ..ExtractionConfig::default()
        };
        let text = xbrl_text_from_str_with_config(&xml, &config).unwrap();
        assert!(text.ends_with("Totale attivo 1.234,57"));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let err = xbrl_text_from_str("<xbrl><unclosed></xbrl>").unwrap_err();
        assert!(matches!(err, BilancioError::XbrlParse(_)));
        assert!(err.to_string().starts_with("Impossibile analizzare il file XBRL"));
    }

    #[test]
    fn test_undefined_entities_are_stripped() {
        assert_eq!(strip_undefined_entities("a&nbsp;b&amp;c"), "abc");
    }
}
