use bilancio_extraction::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

const TOTALE_DISPONIBILITA: &str =
    "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Totale_disponibilita_liquide";
const ALTRI_COSTI: &str = "Conto_economico.Costi_di_produzione.Altri_costi";
const PROVENTI_ALTRI: &str =
    "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Altri";
const INTERESSI_ALTRI: &str = "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Altri";

fn template() -> Value {
    json!({
        "Stato_patrimoniale": {
            "Attivo": {
                "Attivo_circolante": {
                    "Crediti": {
                        "Verso_imprese_controllate": {
                            "esigibili_entro_l_esercizio_successivo": 0.0,
                            "Totale_crediti_verso_imprese_controllate": 0.0
                        },
                        "Crediti_tributari": {
                            "esigibili_entro_l_esercizio_successivo": 0.0,
                            "Totale_crediti_tributari": 0.0
                        }
                    },
                    "Disponibilita_liquide": {
                        "Depositi_bancari_e_postali": 0.0,
                        "Totale_disponibilita_liquide": 0.0
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

fn xbrl_instance(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance" xmlns:itcc-ci="http://www.infocamere.it/itnn/fr/itcc/ci/2018-11-04">
<xbrli:context id="c2023">
  <xbrli:entity/>
  <xbrli:period><xbrli:instant>2023-12-31</xbrli:instant></xbrli:period>
</xbrli:context>
<xbrli:context id="c2022">
  <xbrli:entity/>
  <xbrli:period><xbrli:instant>2022-12-31</xbrli:instant></xbrli:period>
</xbrli:context>
<xbrli:context id="d2023">
  <xbrli:entity/>
  <xbrli:period><xbrli:startDate>2023-01-01</xbrli:startDate><xbrli:endDate>2023-12-31</xbrli:endDate></xbrli:period>
</xbrli:context>
{}
</xbrli:xbrl>"#,
        body
    )
}

fn liquidity_instance() -> String {
    xbrl_instance(
        r#"<itcc-ci:TotaleDisponibilitaLiquide contextRef="c2023" decimals="0">12345</itcc-ci:TotaleDisponibilitaLiquide>
<itcc-ci:TotaleDisponibilitaLiquide contextRef="c2022" decimals="0">10000</itcc-ci:TotaleDisponibilitaLiquide>"#,
    )
}

fn number(tree: &Value, path: &str) -> f64 {
    template::get_number(tree, path).unwrap()
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn upload_request(file_path: PathBuf, year: i32, month: Option<u32>, mode: &str) -> UploadRequest {
    UploadRequest {
        company_id: 7,
        year,
        month,
        balance_type: "Consuntivo".to_string(),
        mode: mode.to_string(),
        note: None,
        overwrite: false,
        file_path,
    }
}

fn service() -> BalanceUploadService<InMemoryBalanceRepository> {
    BalanceUploadService::new(InMemoryBalanceRepository::new(), BilancioPipeline::new(template()))
}

#[test]
fn test_xbrl_instant_fact_renders_with_heading() {
    let xml = xbrl_instance(r#"<itcc-ci:TotaleAttivo contextRef="c2023" decimals="0">1000</itcc-ci:TotaleAttivo>"#);
    let text = xbrl_text_from_str(&xml).unwrap();
    assert!(text.contains("Totale attivo 1.000"));
    assert!(text.starts_with("STATO PATRIMONIALE"));
}

#[test]
fn test_xbrl_absolute_fact_drops_sign() {
    let xml = xbrl_instance(
        r#"<itcc-ci:TotaleProventiOneriFinanziari contextRef="d2023" decimals="0">-50</itcc-ci:TotaleProventiOneriFinanziari>"#,
    );
    let text = xbrl_text_from_str(&xml).unwrap();
    assert!(text.contains("Totale proventi e oneri finanziari 50"));
    assert!(!text.contains("-50"));
}

#[test]
fn test_xbrl_blocked_fact_never_emitted() {
    let xml = xbrl_instance(
        r#"<itcc-ci:DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliEntroEsercizioSuccessivo contextRef="c2023" decimals="0">424242</itcc-ci:DebitiDebitiVersoIstitutiPrevidenzaSicurezzaSocialeEsigibiliEntroEsercizioSuccessivo>
<itcc-ci:TotaleAttivo contextRef="c2023" decimals="0">1000</itcc-ci:TotaleAttivo>"#,
    );
    let text = xbrl_text_from_str(&xml).unwrap();
    assert!(!text.contains("424.242"));
    assert!(text.contains("Totale attivo 1.000"));
}

#[test]
fn test_dangling_dash_line_is_harmless() {
    let mut tree = template();
    update_bilancio_json(&mut tree, "Altri costi\n-", false, FileType::Pdf);
    assert_eq!(number(&tree, ALTRI_COSTI), 0.0);
}

#[test]
fn test_dash_column_means_zero_current_year() {
    let mut tree = template();
    update_bilancio_json(&mut tree, "CONTO ECONOMICO\nAltri costi   -   745", false, FileType::Pdf);
    assert_eq!(number(&tree, ALTRI_COSTI), 0.0);
}

#[test]
fn test_update_never_adds_keys() {
    let mut tree = template();
    let text = "STATO PATRIMONIALE\nATTIVO\nAvviamento 5.000 4.000\nTotale disponibilita liquide 8.000 6.000\nCONTO ECONOMICO\nAltri costi 745 600";
    update_bilancio_json(&mut tree, text, false, FileType::Pdf);

    let before: Vec<String> = extract_keys(&template()).into_iter().map(|(_, path)| path).collect();
    let after: Vec<String> = extract_keys(&tree).into_iter().map(|(_, path)| path).collect();
    assert_eq!(before, after);
    assert_eq!(number(&tree, TOTALE_DISPONIBILITA), 8000.0);
}

fn income_statement_template() -> Value {
    json!({
        "Conto_economico": {
            "Valore_della_produzione": {
                "Ricavi_delle_vendite_e_delle_prestazioni": 0.0,
                "Altri_ricavi_e_proventi": 0.0,
                "Totale_valore_della_produzione": 0.0
            },
            "Costi_di_produzione": {
                "Per_materie_prime,_sussidiarie_di_consumo_merci": 0.0,
                "Per_servizi": 0.0,
                "Per_godimento_di_terzi": 0.0,
                "Per_personale": {
                    "Salari_e_stipendi": 0.0,
                    "Oneri_sociali": 0.0,
                    "Totale_costi_per_il_personale": 0.0
                },
                "Oneri_diversi_di_gestione": 0.0,
                "Totale_costi_della_produzione": 0.0
            }
        }
    })
}

#[test]
fn test_pdf_income_statement_cost_rows() {
    let pages = [
        "Bilancio di esercizio al 31/12/2023",
        "CONTO ECONOMICO\n\
         A) VALORE DELLA PRODUZIONE\n\
         1) Ricavi delle vendite e delle prestazioni 200.000 180.000\n\
         B) COSTI DELLA PRODUZIONE\n\
         6) per materie prime, sussidiarie, di consumo e di merci 10.000 9.000\n\
         7) per servizi 40.000 35.000\n\
         8) per godimento di beni di terzi 5.000 4.000\n\
         14) oneri diversi di gestione 2.000 1.500",
        "Nota integrativa\n7) per servizi 99.999 88.888",
    ];
    let text = filter_statement_pages(&pages);
    let (balance, _) = BilancioPipeline::new(income_statement_template()).fill_from_text(&text, FileType::Pdf);

    let ce = "Conto_economico";
    assert_eq!(
        number(&balance, &format!("{}.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni", ce)),
        200_000.0
    );
    assert_eq!(
        number(&balance, &format!("{}.Costi_di_produzione.Per_materie_prime,_sussidiarie_di_consumo_merci", ce)),
        10_000.0
    );
    assert_eq!(number(&balance, &format!("{}.Costi_di_produzione.Per_servizi", ce)), 40_000.0);
    assert_eq!(number(&balance, &format!("{}.Costi_di_produzione.Per_godimento_di_terzi", ce)), 5_000.0);
    assert_eq!(number(&balance, &format!("{}.Costi_di_produzione.Oneri_diversi_di_gestione", ce)), 2_000.0);
    assert_eq!(
        number(&balance, &format!("{}.Costi_di_produzione.Per_personale.Salari_e_stipendi", ce)),
        0.0
    );
}

#[test]
fn test_reconciliation_swaps_altri_and_is_stable() {
    let mut tree = template();
    template::set_existing_leaf(&mut tree, PROVENTI_ALTRI, 50_000.0);
    template::set_existing_leaf(&mut tree, INTERESSI_ALTRI, 10.0);

    assert!(fix_altri_swap(&mut tree, true));
    assert_eq!(number(&tree, PROVENTI_ALTRI), 10.0);
    assert_eq!(number(&tree, INTERESSI_ALTRI), 50_000.0);

    let settled = tree.clone();
    fix_altri_swap(&mut tree, true);
    assert_eq!(tree, settled);
}

#[test]
fn test_crediti_fix_twice_equals_once() {
    let mut tree = template();
    let controllate = "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_controllate.esigibili_entro_l_esercizio_successivo";
    let tributari = "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari";
    template::set_existing_leaf(&mut tree, controllate, 4200.0);
    template::set_existing_leaf(&mut tree, &format!("{}.Totale_crediti_tributari", tributari), 4200.0);

    assert_eq!(fix_crediti_mismatches(&mut tree), 1);
    assert_eq!(
        number(&tree, &format!("{}.esigibili_entro_l_esercizio_successivo", tributari)),
        4200.0
    );

    let once = tree.clone();
    assert_eq!(fix_crediti_mismatches(&mut tree), 0);
    assert_eq!(tree, once);
}

#[test]
fn test_xbrl_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_file(dir.path(), "template.json", &serde_json::to_string_pretty(&template()).unwrap());
    let xbrl_path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());

    let balance = extract_balance_from_xbrl(&xbrl_path, &template_path).unwrap();
    assert_eq!(number(&balance, TOTALE_DISPONIBILITA), 12_345.0);
    assert_eq!(number(&balance, ALTRI_COSTI), 0.0);

    assert_eq!(
        extract_period_from_file(&xbrl_path),
        ReportingPeriod::new(Some(2023), Some(12))
    );
}

#[test]
fn test_missing_template_yields_empty_balance() {
    let dir = tempfile::tempdir().unwrap();
    let xbrl_path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let balance = extract_balance_from_xbrl(&xbrl_path, dir.path().join("missing.json")).unwrap();
    assert_eq!(balance, json!({}));
}

#[test]
fn test_malformed_xbrl_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let template_path = write_file(dir.path(), "template.json", &template().to_string());
    let xbrl_path = write_file(dir.path(), "broken.xbrl", "<xbrl><unclosed></xbrl>");
    let err = extract_balance_from_xbrl(&xbrl_path, &template_path).unwrap_err();
    assert!(matches!(err, BilancioError::XbrlParse(_)));
}

#[test]
fn test_upload_stores_extracted_balance() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let mut service = service();

    let record = service.upload(&upload_request(path, 2023, Some(12), "xbrl"))?;
    assert_eq!(record.id, 1);
    assert_eq!(record.file, "Consuntivo 2023 dicembre");
    assert_eq!(record.mode, "xbrl");
    assert_eq!(number(&record.balance, TOTALE_DISPONIBILITA), 12_345.0);
    assert_eq!(service.repository().records().len(), 1);
    Ok(())
}

#[test]
fn test_upload_rejects_period_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let mut service = service();

    let err = service.upload(&upload_request(path, 2022, Some(12), "xbrl")).unwrap_err();
    assert!(matches!(err, BilancioError::PeriodMismatch(_)));
    assert!(err.to_string().contains("XBRL reports 2023"));
    assert!(service.repository().records().is_empty());
}

#[test]
fn test_upload_duplicate_and_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let mut service = service();
    let mut request = upload_request(path, 2023, Some(12), "xbrl");

    service.upload(&request).unwrap();
    let err = service.upload(&request).unwrap_err();
    assert!(matches!(
        err,
        BilancioError::DuplicateBalance { company_id: 7, year: 2023, .. }
    ));

    request.overwrite = true;
    let replaced = service.upload(&request).unwrap();
    assert_eq!(replaced.id, 2);
    let records = service.repository().records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 2);
}

#[test]
fn test_soft_deleted_balance_is_not_a_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let mut service = service();
    let request = upload_request(path, 2023, Some(12), "xbrl");

    let first = service.upload(&request).unwrap();
    assert!(service.repository_mut().soft_delete(first.id));

    let second = service.upload(&request).unwrap();
    assert_eq!(second.id, 2);
    assert_eq!(service.repository().records().len(), 2);
}

#[test]
fn test_upload_validation_errors() {
    let dir = tempfile::tempdir().unwrap();
    let xbrl = write_file(dir.path(), "bilancio.xbrl", &liquidity_instance());
    let docx = write_file(dir.path(), "bilancio.docx", "not a balance");
    let mut service = service();

    let err = service.upload(&upload_request(xbrl.clone(), 2023, Some(12), "pdf")).unwrap_err();
    assert!(matches!(err, BilancioError::ModeMismatch { .. }));

    let err = service.upload(&upload_request(docx, 2023, Some(12), "manual")).unwrap_err();
    assert!(matches!(err, BilancioError::UnsupportedFile(_)));

    let err = service.upload(&upload_request(xbrl.clone(), 2023, Some(13), "xbrl")).unwrap_err();
    assert!(matches!(err, BilancioError::InvalidPeriod(_)));

    let err = service.upload(&upload_request(xbrl, 2023, Some(12), "csv")).unwrap_err();
    assert!(matches!(err, BilancioError::InvalidMode(_)));

    assert!(service.repository().records().is_empty());
}

#[test]
fn test_config_schema_generation() {
    let schema_json = ExtractionConfig::schema_as_json().unwrap();
    assert!(schema_json.contains("fuzzy_cutoff"));
    assert!(schema_json.contains("altri_magnitude_threshold"));
}

#[test]
fn test_package_metadata_has_no_placeholder_author() {
    assert!(!env!("CARGO_PKG_AUTHORS").contains("example.com"));
    assert_eq!(env!("CARGO_PKG_NAME"), "bilancio-extraction");
}
