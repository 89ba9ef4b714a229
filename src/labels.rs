//! Label normalization: XBRL tag names and free PDF headings are turned into
//! comparable candidate keys.

use lazy_static::lazy_static;
use regex::Regex;
use similar::TextDiff;

lazy_static! {
    static ref SEPARATORS_RE: Regex = Regex::new(r"[_\-\s]+").unwrap();
    static ref CAMEL_TOKEN_RE: Regex = Regex::new(r"[A-Z][a-z0-9]*|[0-9]+").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();

    static ref ROMAN_DASH_PREFIX_RE: Regex = Regex::new(r"^[IVXLCDM]+\s*-\s*").unwrap();
    static ref NUMBER_PREFIX_RE: Regex = Regex::new(r"^\d+\)\s*").unwrap();
    static ref LETTER_PREFIX_RE: Regex = Regex::new(r"^[A-Za-z]\)\s*").unwrap();
    static ref LETTER_BULLET_RE: Regex = Regex::new(r"(^|\W)[A-Za-z]\)\s*").unwrap();
    static ref BIS_FORMULA_RE: Regex = Regex::new(r"\(\s*[A-Da-d+\-\s]*bis[ A-Da-d+\-]*\)").unwrap();
    static ref LETTER_FORMULA_RE: Regex = Regex::new(r"\(\s*[A-Da-d+\-\s]*\)").unwrap();
    static ref EMPTY_PARENS_RE: Regex = Regex::new(r"\(\s*\)").unwrap();
    static ref OPEN_FORMULA_RE: Regex = Regex::new(r"\(\s*[A-Da-d+\-\s]*$").unwrap();
    static ref OPEN_PAREN_RE: Regex = Regex::new(r"\(\s*$").unwrap();
    static ref SINGLE_LETTER_PARENS_RE: Regex = Regex::new(r"\([A-Za-z]\)").unwrap();
    static ref ROMAN_PARENS_RE: Regex = Regex::new(r"\(([IVXLCDM]+)\)").unwrap();
    static ref TRAILING_DASHES_RE: Regex = Regex::new(r"\s*[-–—]+\s*$").unwrap();
    static ref STOP_WORDS_RE: Regex = Regex::new(
        r"(?i)\b(?:tra|fra|con|per|del|della|dello|dei|degli|delle|al|alla|allo|ai|agli|alle|dal|dalla|dallo|dai|dagli|dalle|il|lo|la|i|gli|le|di|a|da|in|su|e|o)\b"
    )
    .unwrap();
}

const LABEL_REPLACEMENTS: &[(&str, &str)] = &[
    ("valore produzione", "valore della produzione"),
    ("costi produzione", "costi della produzione"),
    ("utile perdita esercizio", "utile (perdita) dell esercizio"),
    (
        "istituti previdenza sicurezza sociale",
        "istituti di previdenza e di sicurezza sociale",
    ),
    ("entro esercizio successivo", "entro l esercizio successivo"),
    ("oltre esercizio successivo", "oltre l esercizio successivo"),
    ("proventi oneri finanziari", "proventi e oneri finanziari"),
];

/// Inserts spaces at camelCase boundaries: `TotaleAttivo` -> `Totale Attivo`.
pub fn split_camel_case(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let value = SEPARATORS_RE.replace_all(value, " ");
    let value = value.trim();

    let mut out = String::with_capacity(value.len() + 8);
    let mut prev: Option<char> = None;
    for ch in value.chars() {
        if ch.is_ascii_uppercase() && prev.is_some_and(|p| p != ' ') {
            out.push(' ');
        }
        out.push(ch);
        prev = Some(ch);
    }
    out
}

pub fn tokenize_camel_case(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    let tokens: Vec<String> = CAMEL_TOKEN_RE
        .find_iter(value)
        .map(|m| m.as_str().to_string())
        .collect();
    if tokens.is_empty() {
        vec![value.to_string()]
    } else {
        tokens
    }
}

/// Drops repeated leading tokens (`DebitiDebiti...`) and anchors labels on
/// their `Totale` token when present.
pub fn normalize_label_tokens(tokens: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = tokens.to_vec();
    while normalized.len() > 1 && normalized[0].to_lowercase() == normalized[1].to_lowercase() {
        normalized.remove(0);
    }

    if let Some(idx) = normalized.iter().position(|t| t == "Totale") {
        let tail = &normalized[idx + 1..];
        if !tail.is_empty() {
            let mut anchored = vec!["Totale".to_string()];
            anchored.extend(tail.iter().cloned());
            normalized = anchored;
        }
    }

    normalized
}

pub fn prettify_label_from_tokens(tokens: &[String]) -> String {
    if tokens.is_empty() {
        return String::new();
    }

    let mut raw = tokens
        .iter()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    for (source, target) in LABEL_REPLACEMENTS {
        if raw.contains(source) {
            raw = raw.replace(source, target);
        }
    }

    let raw = WHITESPACE_RE.replace_all(&raw, " ");
    let raw = raw.trim();
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turns a raw statement heading into an underscore-joined candidate key.
pub fn clean_name(raw: &str) -> String {
    let mut name = ROMAN_DASH_PREFIX_RE.replace(raw, "").into_owned();
    name = NUMBER_PREFIX_RE.replace(&name, "").into_owned();
    name = LETTER_PREFIX_RE.replace(&name, "").into_owned();
    name = LETTER_BULLET_RE.replace_all(&name, "$1").into_owned();

    name = BIS_FORMULA_RE.replace_all(&name, "").into_owned();
    name = LETTER_FORMULA_RE.replace_all(&name, "").into_owned();
    name = EMPTY_PARENS_RE.replace_all(&name, "").into_owned();
    name = OPEN_FORMULA_RE.replace(&name, "").into_owned();
    name = OPEN_PAREN_RE.replace(&name, "").into_owned();
    name = SINGLE_LETTER_PARENS_RE.replace_all(&name, "").into_owned();
    name = ROMAN_PARENS_RE.replace_all(&name, "").into_owned();

    // "Per il personale: salari" keeps the part after the colon.
    if let Some((head, tail)) = name.split_once(':') {
        name = if tail.trim().is_empty() {
            head.trim().to_string()
        } else {
            tail.trim().to_string()
        };
    }

    name = TRAILING_DASHES_RE.replace(&name, "").into_owned();
    name = STOP_WORDS_RE.replace_all(&name, "").into_owned();
    name = name.replace('\'', "");

    let name = WHITESPACE_RE.replace_all(&name, " ");
    name.trim().replace(' ', "_")
}

fn normalize_key(key: &str) -> String {
    key.to_lowercase().replace('_', " ")
}

/// Similarity ratio in `[0, 1]` between two labels: twice the matched
/// characters over the combined length, so dropped stop words cost little.
pub fn similarity(a: &str, b: &str) -> f64 {
    f64::from(TextDiff::from_chars(a, b).ratio())
}

/// Up to `n` keys whose similarity with `target` clears `cutoff`, best first.
pub fn close_matches<'a>(target: &str, keys: &[&'a str], n: usize, cutoff: f64) -> Vec<&'a str> {
    let mut scored: Vec<(f64, &'a str)> = keys
        .iter()
        .map(|k| (similarity(target, k), *k))
        .filter(|(score, _)| *score >= cutoff)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.into_iter().take(n).map(|(_, k)| k).collect()
}

/// Fuzzy-matches a cleaned candidate against known key names, falling back to
/// containment when no key is similar enough.
pub fn find_best_match<'a>(target: &str, keys: &[&'a str]) -> Option<&'a str> {
    let normalized_target = normalize_key(target);
    let normalized: Vec<String> = keys.iter().map(|k| normalize_key(k)).collect();
    let refs: Vec<&str> = normalized.iter().map(|s| s.as_str()).collect();

    if let Some(best) = close_matches(&normalized_target, &refs, 1, 0.5).first() {
        if let Some(pos) = refs.iter().position(|k| k == best) {
            return Some(keys[pos]);
        }
    }

    keys.iter()
        .zip(normalized.iter())
        .find(|(_, norm)| norm.contains(&normalized_target))
        .map(|(key, _)| *key)
}

/// Best-effort guess of the template section a generated XBRL label belongs to.
pub fn infer_section_path(label: &str) -> Option<String> {
    let lower = label.to_lowercase();
    let all = |kw: &[&str]| kw.iter().all(|k| lower.contains(k));
    let any = |kw: &[&str]| kw.iter().any(|k| lower.contains(k));

    if any(&[
        "ricavi", "proventi", "costi", "ammortamenti", "imposte", "risultato", "utile", "oneri", "flusso",
    ]) {
        let base = "Conto_economico";
        let sub = if all(&["valore", "produzione"]) {
            Some("Valore_della_produzione")
        } else if all(&["costi", "produzione"]) {
            Some("Costi_di_produzione")
        } else if all(&["proventi", "oneri", "finanziari"]) {
            if all(&["interessi"]) || (all(&["oneri", "finanziari"]) && !all(&["altri", "proventi"])) {
                Some("Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari")
            } else if all(&["altri", "proventi"]) {
                Some("Proventi_e_oneri_finanziari.Altri_proventi_finanziari")
            } else {
                Some("Proventi_e_oneri_finanziari")
            }
        } else if all(&["imposte"]) {
            Some("Risultato_prima_delle_imposte")
        } else if all(&["rettifiche", "valore"]) {
            Some("Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie ")
        } else {
            None
        };
        return Some(match sub {
            Some(s) => format!("{}.{}", base, s),
            None => base.to_string(),
        });
    }

    if any(&["debiti", "patrimonio", "risconti passivi", "ratei passivi", "tfr"]) {
        let base = "Stato_patrimoniale.Passivo";
        let sub = if all(&["patrimonio", "netto"]) {
            "Patrimonio_netto"
        } else if all(&["tfr"]) || all(&["trattamento", "fine", "rapporto"]) {
            "Trattamento_di_fine_rapporto_di_lavoro_subordinato"
        } else if any(&["ratei", "risconti"]) {
            "Ratei_e_risconti"
        } else if all(&["istituti", "previdenza"]) || all(&["previdenza", "sicurezza"]) {
            "Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale"
        } else if all(&["tributari"]) {
            "Debiti.Debiti_tributari"
        } else if all(&["fornitori"]) {
            "Debiti.Debiti_verso_fornitori"
        } else if all(&["banche"]) {
            "Debiti.Debiti_verso_banche"
        } else if all(&["altri", "debiti"]) {
            "Debiti.Altri_debiti"
        } else {
            "Debiti"
        };
        return Some(format!("{}.{}", base, sub));
    }

    if any(&[
        "attivo",
        "crediti",
        "immobilizzazioni",
        "disponibilita",
        "ratei attivi",
        "imposte anticipate",
        "ratei risconti attivi",
    ]) {
        let base = "Stato_patrimoniale.Attivo";
        let sub = if all(&["immobilizzazioni", "immateriali"]) {
            Some("Immobilizzazioni.Immobilizzazioni_Immateriali")
        } else if all(&["immobilizzazioni", "materiali"]) {
            Some("Immobilizzazioni.Immobilizzazioni_Materiali")
        } else if all(&["immobilizzazioni"]) {
            Some("Immobilizzazioni")
        } else if all(&["disponibilita", "liquide"]) || any(&["cassa", "depositi bancari"]) {
            Some("Attivo_circolante.Disponibilita_liquide")
        } else if all(&["crediti", "tributari"]) {
            Some("Attivo_circolante.Crediti.Crediti_tributari")
        } else if all(&["crediti", "verso", "clienti"]) {
            Some("Attivo_circolante.Crediti.Verso_clienti")
        } else if all(&["crediti", "verso", "altri"]) {
            Some("Attivo_circolante.Crediti.Verso_altri")
        } else if all(&["crediti", "imprese", "controllate"]) {
            Some("Attivo_circolante.Crediti.Verso_imprese_controllate")
        } else if all(&["crediti", "imprese", "collegate"]) {
            Some("Attivo_circolante.Crediti.Verso_imprese_collegate")
        } else if all(&["imposte", "anticipate"]) {
            Some("Attivo_circolante.Crediti")
        } else if any(&["ratei", "risconti"]) {
            Some("Ratei_e_risconti")
        } else if all(&["attivo", "circolante"]) {
            Some("Attivo_circolante")
        } else {
            None
        };
        return Some(match sub {
            Some(s) => format!("{}.{}", base, s),
            None => base.to_string(),
        });
    }

    if all(&["totale", "attivo"]) {
        return Some("Stato_patrimoniale.Attivo".to_string());
    }
    if all(&["totale", "passivo"]) {
        return Some("Stato_patrimoniale.Passivo".to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_split_and_tokenize() {
        assert_eq!(
            split_camel_case("TotaleProventiOneriFinanziari"),
            "Totale Proventi Oneri Finanziari"
        );
        assert_eq!(
            tokenize_camel_case("TotaleProventiOneriFinanziari"),
            tokens(&["Totale", "Proventi", "Oneri", "Finanziari"])
        );
        assert_eq!(tokenize_camel_case("lowercase"), tokens(&["lowercase"]));
    }

    #[test]
    fn test_normalize_label_tokens() {
        let normalized = normalize_label_tokens(&tokens(&["Debiti", "Debiti", "Verso", "Banche"]));
        assert_eq!(normalized, tokens(&["Debiti", "Verso", "Banche"]));

        let anchored = normalize_label_tokens(&tokens(&["Crediti", "Totale", "Crediti"]));
        assert_eq!(anchored, tokens(&["Totale", "Crediti"]));
    }

    #[test]
    fn test_prettify_label() {
        let label = prettify_label_from_tokens(&tokenize_camel_case("TotaleProventiOneriFinanziari"));
        assert!(label.to_lowercase().contains("proventi e oneri finanziari"));
        assert!(label.starts_with('T'));

        let utile = prettify_label_from_tokens(&tokenize_camel_case("UtilePerditaEsercizio"));
        assert_eq!(utile, "Utile (perdita) dell esercizio");
    }

    #[test]
    fn test_infer_section_path() {
        assert_eq!(infer_section_path("Totale valore della produzione"), None);
        assert_eq!(
            infer_section_path("Totale costi della produzione").as_deref(),
            Some("Conto_economico.Costi_di_produzione")
        );
        assert_eq!(
            infer_section_path("Debiti verso banche").as_deref(),
            Some("Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche")
        );
        assert_eq!(
            infer_section_path("Debiti tributari").as_deref(),
            Some("Stato_patrimoniale.Passivo.Debiti.Debiti_tributari")
        );
        assert_eq!(
            infer_section_path("Totale attivo").as_deref(),
            Some("Stato_patrimoniale.Attivo")
        );
        assert_eq!(
            infer_section_path("Totale passivo").as_deref(),
            Some("Stato_patrimoniale.Passivo")
        );
        assert_eq!(infer_section_path("Voce sconosciuta"), None);
    }

    #[test]
    fn test_clean_name() {
        let cleaned = clean_name("III) Totale proventi e oneri finanziari:");
        assert!(cleaned.contains("Totale_proventi"));

        assert_eq!(clean_name("7) Per servizi"), "servizi");
        assert_eq!(clean_name("Per il personale: a) salari e stipendi"), "salari_stipendi");
        assert_eq!(
            clean_name("Differenza tra valore e costi della produzione (A - B)"),
            "Differenza_valore_costi_produzione"
        );
        assert_eq!(clean_name("Utile (perdita) dell'esercizio"), "Utile_(perdita)_dellesercizio");
    }

    #[test]
    fn test_find_best_match() {
        let keys = [
            "Totale_attivo",
            "Totale_proventi_e_oneri_finanziari",
            "Totale_costi_della_produzione",
        ];
        let cleaned = clean_name("III) Totale proventi e oneri finanziari:");
        assert_eq!(
            find_best_match(&cleaned, &keys),
            Some("Totale_proventi_e_oneri_finanziari")
        );
        assert_eq!(find_best_match("zzzz qqqq wwww", &keys), None);
    }

    #[test]
    fn test_find_best_match_income_statement_keys() {
        let keys = [
            "Ricavi_delle_vendite_e_delle_prestazioni",
            "Altri_ricavi_e_proventi",
            "Totale_valore_della_produzione",
            "Per_materie_prime,_sussidiarie_di_consumo_merci",
            "Per_servizi",
            "Per_godimento_di_terzi",
            "Per_personale",
            "Ammortamento_e_svalutazioni",
            "Oneri_diversi_di_gestione",
            "Totale_costi_della_produzione",
        ];
        assert_eq!(find_best_match("servizi", &keys), Some("Per_servizi"));
        assert_eq!(find_best_match("godimento_beni_terzi", &keys), Some("Per_godimento_di_terzi"));
        assert_eq!(
            find_best_match("ricavi_vendite_prestazioni", &keys),
            Some("Ricavi_delle_vendite_e_delle_prestazioni")
        );
    }

    #[test]
    fn test_similarity_ignores_dropped_words() {
        assert!(similarity("servizi", "per servizi") > 0.75);
        assert!(similarity("servizi", "oneri sociali") < 0.5);
        assert_eq!(similarity("altri costi", "altri costi"), 1.0);
    }
}
