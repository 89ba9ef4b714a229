//! Fixed-layout extraction from Excel bilancio exports.
//!
//! Two layouts are supported: the full civil-code statement and the
//! abbreviated one. Both keep current-year amounts in column K at fixed rows;
//! the tables below map each row to its dotted template path.

use crate::error::Result;
use crate::schema::ExcelFormat;
use crate::template::GENERAL_INFO_KEY;
use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Duration, NaiveDate};
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;

/// Column K, zero-based.
const VALUE_COLUMN: u32 = 10;
/// Sheets longer than this are assumed to use the full layout.
const FULL_LAYOUT_MIN_ROWS: u32 = 120;
const SIGNATURE_ROW: u32 = 4;
const HEADER_ROWS: u32 = 5;

const ITALIAN_MONTHS: [(&str, u32); 12] = [
    ("gennaio", 1),
    ("febbraio", 2),
    ("marzo", 3),
    ("aprile", 4),
    ("maggio", 5),
    ("giugno", 6),
    ("luglio", 7),
    ("agosto", 8),
    ("settembre", 9),
    ("ottobre", 10),
    ("novembre", 11),
    ("dicembre", 12),
];

lazy_static! {
    static ref NUMERIC_DATE_RE: Regex = Regex::new(r"\b(\d{1,2})[/.-](\d{1,2})[/.-](\d{4})\b").unwrap();
    static ref CENTURY_YEAR_RE: Regex = Regex::new(r"\b(?:19|20)\d{2}\b").unwrap();
    static ref DAY_RE: Regex = Regex::new(r"\b\d{1,2}\b").unwrap();
    static ref FOUR_DIGITS_RE: Regex = Regex::new(r"\b(\d{4})\b").unwrap();
}

pub const FULL_LAYOUT: &[(u32, &str)] = &[
    (4, "Stato_patrimoniale.Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti.Parte_richiamata"),
    (5, "Stato_patrimoniale.Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti.Parte_da_richiamare"),
    (6, "Stato_patrimoniale.Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti.Totale_crediti_verso_soci_per_versamenti_ancora_dovuti"),
    (9, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Costi_impianto_e_di_ampliamento"),
    (10, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Costi_di_sviluppo"),
    (11, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Diritti_di_brevetto_industriale_e_diritti_di_utilizzazione_opere_dell_ingegno"),
    (12, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Concessioni,_licenze,_marchi_e_diritti_simili"),
    (13, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Avviamento"),
    (14, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Immobilizzazioni_in_corso_e_acconti"),
    (15, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Altre"),
    (16, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali.Totale_immobilizzazioni_immateriali"),
    (18, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Terreni_e_fabbricati"),
    (19, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Impianti_e_macchinari"),
    (20, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Attrezzature_industriali_e_commerciali"),
    (21, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Altri_beni"),
    (22, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Immobilizzazioni_in_corso_e_acconti"),
    (23, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali.Totale_immobilizzazioni_materiali"),
    (26, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Imprese_controllate"),
    (27, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Imprese_collegate"),
    (28, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Imprese_controllanti"),
    (29, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Imprese_sottoposte_al_controllo_delle_controllanti"),
    (30, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Altre_imprese"),
    (31, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Partecipazioni.Totale_partecipazioni"),
    (34, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllate.esigibili_entro_l_esercizio_successivo"),
    (35, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllate.esigibili_oltre_l_esercizio_successivo"),
    (36, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllate.Totale_crediti_verso_imprese_controllate"),
    (38, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_collegate.esigibili_entro_l_esercizio_successivo"),
    (39, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_collegate.esigibili_oltre_l_esercizio_successivo"),
    (40, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_collegate.Totale_crediti_verso_imprese_collegate"),
    (42, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllanti.esigibili_entro_l_esercizio_successivo"),
    (43, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllanti.esigibili_oltre_l_esercizio_successivo"),
    (44, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Verso_imprese_controllanti.Totale_crediti_verso_imprese_controllanti"),
    (46, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Imprese_sottoposte_al_controllo_delle_controllanti.esigibili_entro_l_esercizio_successivo"),
    (47, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Imprese_sottoposte_al_controllo_delle_controllanti.esigibili_oltre_l_esercizio_successivo"),
    (48, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Imprese_sottoposte_al_controllo_delle_controllanti.Totale_crediti_verso_imprese_sottoposte_al_controllo_delle_controllanti"),
    (50, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Altre_imprese.esigibili_entro_l_esercizio_successivo"),
    (51, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Altre_imprese.esigibili_oltre_l_esercizio_successivo"),
    (52, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Altre_imprese.Totale_crediti_verso_altre_imprese"),
    (53, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Crediti.Totale_crediti"),
    (54, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Altri_titoli"),
    (55, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.Strumenti_finanziari_derivati_attivi"),
    (56, "Stato_patrimoniale.Attivo.Immobilizzazioni.Totale_immobilizzazioni"),
    (59, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Materie_prime_sussidiarie_e_consumo"),
    (60, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Prodotti_in_corso_di_lavorazione_e_semilavorati"),
    (61, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Lavori_in_corso_su_ordinazione"),
    (62, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Prodotti_finiti_e_merci"),
    (63, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Accont"),
    (64, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze.Totale_rimanenze"),
    (67, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_clienti.esigibili_entro_l_esercizio_successivo"),
    (68, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_clienti.esigibili_oltre_l_esercizio_successivo"),
    (69, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_clienti.Totale_crediti_verso_clienti"),
    (71, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_controllate.esigibili_entro_l_esercizio_successivo"),
    (72, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_controllate.esigibili_oltre_l_esercizio_successivo"),
    (73, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_controllate.Totale_crediti_verso_imprese_controllate"),
    (75, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_collegate.esigibili_entro_l_esercizio_successivo"),
    (76, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_collegate.esigibili_oltre_l_esercizio_successivo"),
    (77, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_collegate.Totale_crediti_verso_imprese_collegate"),
    (79, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_Controllanti.esigibili_entro_l_esercizio_successivo"),
    (80, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_Controllanti.esigibili_oltre_l_esercizio_successivo"),
    (81, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_Controllanti.Totale_crediti_verso_controllanti"),
    (83, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_sottoposte_al_controllo_delle_controllanti.esigibili_entro_l_esercizio_successivo"),
    (84, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_sottoposte_al_controllo_delle_controllanti.esigibili_oltre_l_esercizio_successivo"),
    (85, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_imprese_sottoposte_al_controllo_delle_controllanti.Totale_crediti_verso_imprese_sottoposte_al_controllo_delle_controllanti"),
    (87, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari.esigibili_entro_l_esercizio_successivo"),
    (88, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari.esigibili_oltre_l_esercizio_successivo"),
    (89, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Crediti_tributari.Totale_crediti_tributari"),
    (90, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Imposte_anticipate"),
    (92, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_altri.esigibili_entro_l_esercizio_successivo"),
    (93, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_altri.esigibili_oltre_l_esercizio_successivo"),
    (94, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Verso_altri.Totale_crediti_verso_altri"),
    (95, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti.Totale_crediti"),
    (97, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Partecipazioni_in_imprese_controllate"),
    (98, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Partecipazioni_in_imprese_collegate"),
    (99, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Partecipazioni_in_imprese_controllanti"),
    (100, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Partecipazioni_in_imprese_sottoposte_al_controllo_delle_controllanti"),
    (101, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Altre_partecipazioni"),
    (102, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Strumenti_finanziari_derivati_attivi"),
    (103, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Altri_titoli"),
    (104, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni.Totale_attivita_finanziarie"),
    (106, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Depositi_bancari_e_postali:"),
    (107, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Assegni"),
    (108, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Denaro_e_valori_in_cassa"),
    (109, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide.Totale_disponibilita_liquide"),
    (109, "Stato_patrimoniale.Attivo.Attivo_circolante.Totale_attivo_circolante"),
    (111, "Stato_patrimoniale.Attivo.Ratei_e_risconti.Ratei_attivi:"),
    (112, "Stato_patrimoniale.Attivo.Ratei_e_risconti.Ratei_inattivi:"),
    (113, "Stato_patrimoniale.Attivo.Totale_attivo"),
    (122, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_straordinaria"),
    (123, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_da_deroghe_ex_articolo_2423_codice_civile"),
    (124, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_azioni_(quote)_della_societÃ _controllante"),
    (125, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_da_rivalutazione_delle_partecipazioni"),
    (126, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Versamenti_in_conto_aumento_di_capitale"),
    (127, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Versamenti_in_conto_futuro_aumento_di_capitale"),
    (128, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Versamenti_in_conto_capitale"),
    (129, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Versamenti_a_copertura_perdite"),
    (130, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_da_riduzione_capitale_sociale"),
    (131, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_avanzo_di_fusione"),
    (132, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_per_utili_su_cambi_non_realizzati"),
    (133, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Riserva_da_conguaglio_utili_in_corso"),
    (134, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Varie_altre_riserve"),
    (135, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente.Totale_altre_riserve"),
    (116, "Stato_patrimoniale.Passivo.Patrimonio_netto.Capitale"),
    (117, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_da_sovrapprezzo_azioni"),
    (118, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_da_rivalutazioni"),
    (119, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_legali"),
    (120, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_statutarie"),
    (136, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_per_operazioni_di_copertura_dei_flussi_finanziari_attesi"),
    (137, "Stato_patrimoniale.Passivo.Patrimonio_netto.Utili_(perdite)_portati_a_nuovo"),
    (138, "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dellesercizio"),
    (139, "Stato_patrimoniale.Passivo.Patrimonio_netto.Perdita_ripristinata_nellesercizio"),
    (140, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserva_negativa_per_azioni_proprie_in_portafoglio"),
    (141, "Stato_patrimoniale.Passivo.Patrimonio_netto.Totale_patrimonio_netto"),
    (143, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri.Per_trattamento_di_quiescenza"),
    (144, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri.Per_imposte_anche_differite"),
    (145, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri.Strumenti_finanziari_derivati_passivi"),
    (146, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri.Altri"),
    (147, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri.Totale_fondi_per_rischi_e_oneri"),
    (148, "Stato_patrimoniale.Passivo.Trattamento_di_fine_rapporto_di_lavoro_subordinato"),
    (151, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni.esigibili_entro_l_esercizio_successivo"),
    (152, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni.esigibili_oltre_l_esercizio_successivo"),
    (153, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni.Totale_obbligazioni"),
    (155, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni_convertibili.esigibili_entro_l_esercizio_successivo"),
    (156, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni_convertibili.esigibili_oltre_l_esercizio_successivo"),
    (157, "Stato_patrimoniale.Passivo.Debiti.Obbligazioni_convertibili.Totale_obbligazioni_convertibili"),
    (159, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_soci_per_finanziamenti.esigibili_entro_l_esercizio_successivo"),
    (160, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_soci_per_finanziamenti.esigibili_oltre_l_esercizio_successivo"),
    (161, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_soci_per_finanziamenti.Totale_debiti_verso_soci_per_finanziamenti"),
    (163, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche.esigibili_entro_l_esercizio_successivo"),
    (164, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche.esigibili_oltre_l_esercizio_successivo"),
    (165, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_banche.Totale_debiti_verso_banche"),
    (167, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_altri_finanziatori.esigibili_entro_l_esercizio_successivo"),
    (168, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_altri_finanziatori.esigibili_oltre_l_esercizio_successivo"),
    (169, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_altri_finanziatori.Totale_debiti_verso_altri_finanziatori"),
    (171, "Stato_patrimoniale.Passivo.Debiti.Acconti.esigibili_entro_l_esercizio_successivo"),
    (172, "Stato_patrimoniale.Passivo.Debiti.Acconti.esigibili_oltre_l_esercizio_successivo"),
    (173, "Stato_patrimoniale.Passivo.Debiti.Acconti.Totale_acconti"),
    (175, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_fornitori.esigibili_entro_l_esercizio_successivo"),
    (176, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_fornitori.esigibili_oltre_l_esercizio_successivo"),
    (177, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_fornitori.Totale_debiti_verso_fornitori"),
    (179, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_rappresentati_da_titoli_di_credito.esigibili_entro_l_esercizio_successivo"),
    (180, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_rappresentati_da_titoli_di_credito.esigibili_oltre_l_esercizio_successivo"),
    (181, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_rappresentati_da_titoli_di_credito.Totale_debiti_verso_rappresentati_da_titoli_di_credito"),
    (183, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_controllate.esigibili_entro_l_esercizio_successivo"),
    (184, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_controllate.esigibili_oltre_l_esercizio_successivo"),
    (185, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_controllate.Totale_debiti_verso_imprese_controllate"),
    (187, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_collegate.esigibili_entro_l_esercizio_successivo"),
    (188, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_collegate.esigibili_oltre_l_esercizio_successivo"),
    (189, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_collegate.Totale_debiti_verso_imprese_collegate"),
    (191, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_controllanti.esigibili_entro_l_esercizio_successivo"),
    (192, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_controllanti.esigibili_oltre_l_esercizio_successivo"),
    (193, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_controllanti.Totale_debiti_verso_controllanti"),
    (195, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_sottoposte_al_controllo_di_controllanti.esigibili_entro_l_esercizio_successivo"),
    (196, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_sottoposte_al_controllo_di_controllanti.esigibili_oltre_l_esercizio_successivo"),
    (197, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_imprese_sottoposte_al_controllo_di_controllanti.Totale_debiti_verso_imprese_sottoposte_al_controllo_delle_controllanti"),
    (199, "Stato_patrimoniale.Passivo.Debiti.Debiti_tributari.esigibili_entro_l_esercizio_successivo"),
    (200, "Stato_patrimoniale.Passivo.Debiti.Debiti_tributari.esigibili_oltre_l_esercizio_successivo"),
    (201, "Stato_patrimoniale.Passivo.Debiti.Debiti_tributari.Totale_debiti_tributari"),
    (203, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.esigibili_entro_l_esercizio_successivo"),
    (204, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.esigibili_oltre_l_esercizio_successivo"),
    (205, "Stato_patrimoniale.Passivo.Debiti.Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale.Totale_debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale"),
    (207, "Stato_patrimoniale.Passivo.Debiti.Altri_debiti.esigibili_entro_l_esercizio_successivo"),
    (208, "Stato_patrimoniale.Passivo.Debiti.Altri_debiti.esigibili_oltre_l_esercizio_successivo"),
    (209, "Stato_patrimoniale.Passivo.Debiti.Altri_debiti.Totale_altri_debiti"),
    (210, "Stato_patrimoniale.Passivo.Debiti.Totale_debiti"),
    (212, "Stato_patrimoniale.Passivo.Ratei_e_risconti.Ratei_passivi"),
    (213, "Stato_patrimoniale.Passivo.Ratei_e_risconti.Risconti_passivi"),
    (214, "Stato_patrimoniale.Passivo.Totale_passivo"),
    (222, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Contributi_in_conto_esercizio"),
    (223, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Altri"),
    (224, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Totale_altri_ricavi_e_proventi"),
    (217, "Conto_economico.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni"),
    (218, "Conto_economico.Valore_della_produzione.Variazione_delle_lavorazioni_in_corso_di_esecuzione"),
    (219, "Conto_economico.Valore_della_produzione.Variazione_dei_lavori_in_corso_di_esecuzione"),
    (220, "Conto_economico.Valore_della_produzione.Incrementi_di_immobilizzazioni_per_lavori_interni"),
    (225, "Conto_economico.Valore_della_produzione.Totale_valore_della_produzione"),
    (231, "Conto_economico.Costi_di_produzione.Per_personale.Salari_e_stipendi"),
    (232, "Conto_economico.Costi_di_produzione.Per_personale.Oneri_sociali"),
    (233, "Conto_economico.Costi_di_produzione.Per_personale.Trattamento_di_fine_rapporto"),
    (234, "Conto_economico.Costi_di_produzione.Per_personale.Trattamento_di_quiescenza_e_simili"),
    (235, "Conto_economico.Costi_di_produzione.Per_personale.Altri_costi"),
    (236, "Conto_economico.Costi_di_produzione.Per_personale.Totale_costi_per_il_personale"),
    (238, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_immateriale"),
    (239, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_materiali"),
    (240, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Altre_svalutazioni_delle_immobilizzaioni"),
    (241, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Svalutazioni_dei_crediti_compresi_nell_attivo_circolante"),
    (242, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Totale_ammortamenti_e_svalutazioni"),
    (227, "Conto_economico.Costi_di_produzione.Per_materie_prime,_sussidiarie_di_consumo_merci"),
    (228, "Conto_economico.Costi_di_produzione.Per_servizi"),
    (229, "Conto_economico.Costi_di_produzione.Per_godimento_di_terzi"),
    (243, "Conto_economico.Costi_di_produzione.Variazione_delle_rimanenze_di_materie_prime_sussidiarie_consumo"),
    (244, "Conto_economico.Costi_di_produzione.Accantonamento_per_rischi"),
    (245, "Conto_economico.Costi_di_produzione.Altri_accantonamenti"),
    (246, "Conto_economico.Costi_di_produzione.Oneri_diversi_di_gestione"),
    (247, "Conto_economico.Costi_di_produzione.Totale_costi_della_produzione"),
    (248, "Conto_economico.Differenza_valore_produzione_costi_produzione"),
    (251, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Da_imprese_controllate"),
    (252, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Da_imprese_collegate"),
    (253, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Da_imprese_controllanti"),
    (254, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (255, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Altre_imprese"),
    (256, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Totale_proventi_da_partecipazioni"),
    (259, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_imprese_controllate"),
    (260, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_imprese_collegate"),
    (261, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_imprese_controllanti"),
    (262, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (263, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Da_altri"),
    (264, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Totale_proventi_finanziari_da_crediti_iscritti_nelle_immobilizzazioni"),
    (268, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Da_imprese_controllate"),
    (269, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Da_imprese_collegate"),
    (270, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Da_imprese_controllanti"),
    (271, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (272, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Altri"),
    (273, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Totale_proventi_diversi_dai_precedenti_immobilizzazioni"),
    (265, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_titoli_iscritti_nelle_immobilizzazioni_diversi_dalle_partecipazioni"),
    (266, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nell_attivo_circolante_diversi_dalle_partecipazioni"),
    (274, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Totale_altri_proventi_finanziari"),
    (276, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Da_imprese_controllate"),
    (277, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Da_imprese_collegate"),
    (278, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Da_imprese_controllanti"),
    (279, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (280, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Altri"),
    (281, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_e_oneri_finanziari.Totale_interessi_e_altri_oneri_finanziari"),
    (282, "Conto_economico.Proventi_e_oneri_finanziari.Utili_e_perdite_su_cambi"),
    (283, "Conto_economico.Proventi_e_oneri_finanziari.Totale_proventi_e_oneri_finanziari"),
    (286, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Rivalutazioni.Di_partecipazioni"),
    (287, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Rivalutazioni.Di_immobilizzazioni_finanziarie_che_non_costituiscono_partecipazioni"),
    (288, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Rivalutazioni.Di_titoli_iscritti_nell_attivo_circolante_che_non_costituiscono_partecipazioni"),
    (289, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Rivalutazioni.Strumenti_finanziari_derivati"),
    (292, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Svalutazioni.Di_partecipazioni"),
    (293, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Svalutazioni.Di_immobilizzazioni_finanziarie_che_non_costituiscono_partecipazioni"),
    (294, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Svalutazioni.Di_titoli_iscritti_nell_attivo_circolante_che_non_costituiscono_partecipazioni"),
    (295, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Svalutazioni.Strumenti_finanziari_derivati"),
    (297, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie.Totale_rettifiche_di_valore_di_attivita'_finanziarie"),
    (299, "Conto_economico.Proventi_e_oneri_straordinari.Proventi_straordinari"),
    (300, "Conto_economico.Proventi_e_oneri_straordinari.Oneri_straordinari"),
    (301, "Conto_economico.Proventi_e_oneri_straordinari.Totale_delle_partite_straordinarie"),
    (304, "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Imposte_correnti"),
    (305, "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Imposte_relative_esercizi_precedenti"),
    (306, "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Imposte_differite_anticipate"),
    (307, "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Proventi_da_adesioni_al_regime_di_copnsolidato_fiscale"),
    (308, "Conto_economico.Risultato_prima_delle_imposte.Imposte_sul_reddito_di_esercizio_correnti_differite_anticipate.Totale_delle_imposte_sul_reddito_di_esercizio_correnti,_differite_e_anticipate"),
    (309, "Conto_economico.Risultato_prima_delle_imposte.Utile_(perdita)_dell'esercizio"),
];

pub const ABBREVIATED_LAYOUT: &[(u32, &str)] = &[
    (4, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Immateriali"),
    (5, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Materiali"),
    (7, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.dell_esercizio_corrente"),
    (8, "Stato_patrimoniale.Attivo.Immobilizzazioni.Immobilizzazioni_Finanziarie.oltre_l_esercizio_corrente"),
    (10, "Stato_patrimoniale.Attivo.Attivo_circolante.Rimanenze"),
    (11, "Stato_patrimoniale.Attivo.Attivo_circolante.Crediti"),
    (12, "Stato_patrimoniale.Attivo.Attivo_circolante.Attivita_finanziarie_che_non_costituiscono_immobilizzazioni"),
    (13, "Stato_patrimoniale.Attivo.Attivo_circolante.Disponibilita_liquide"),
    (14, "Stato_patrimoniale.Attivo.Totale_attivo"),
    (17, "Stato_patrimoniale.Passivo.Patrimonio_netto.Capitale"),
    (18, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_da_sovrapprezzo_azioni"),
    (19, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_da_rivalutazioni"),
    (20, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_legali"),
    (21, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_statutarie"),
    (22, "Stato_patrimoniale.Passivo.Patrimonio_netto.Altre_riserve_distintamente_indicate"),
    (23, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserve_per_operazioni_di_copertura_dei_flussi_finanziari_attesi"),
    (24, "Stato_patrimoniale.Passivo.Patrimonio_netto.Utili_(perdite)_portati_a_nuovo"),
    (25, "Stato_patrimoniale.Passivo.Patrimonio_netto.Utile_(perdita)_dell_esercizio"),
    (26, "Stato_patrimoniale.Passivo.Patrimonio_netto.Riserva_negativa_per_azioni_proprie_in_portafoglio"),
    (27, "Stato_patrimoniale.Passivo.Patrimonio_netto.Totale_patrimonio_netto"),
    (28, "Stato_patrimoniale.Passivo.Fondi_per_rischi_e_oneri"),
    (29, "Stato_patrimoniale.Passivo.Trattamento_di_fine_rapporto_di_lavoro_subordinato"),
    (31, "Stato_patrimoniale.Passivo.Debiti.dell_esercizio_corrente"),
    (32, "Stato_patrimoniale.Passivo.Debiti.oltre_l_esercizio_corrente"),
    (33, "Stato_patrimoniale.Passivo.Ratei_e_risconti"),
    (34, "Stato_patrimoniale.Passivo.Totale_passivo"),
    (37, "Conto_economico.Valore_della_produzione.Ricavi_delle_vendite_e_delle_prestazioni"),
    (38, "Conto_economico.Valore_della_produzione.Variazione_delle_rimanenze_di_prodotti_in_corso_di_lavorazione_semilav"),
    (39, "Conto_economico.Valore_della_produzione.Variazione_dei_lavori_in_corso_su_ordinazione"),
    (40, "Conto_economico.Valore_della_produzione.Incrementi_di_immobilizzazioni_per_lavori_interni"),
    (42, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.contributi_in_conto_esercizio"),
    (43, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.altri"),
    (44, "Conto_economico.Valore_della_produzione.Altri_ricavi_e_proventi.Totale_altri_ricavi_e_proventi"),
    (45, "Conto_economico.Valore_della_produzione.Totale_valore_della_produzione"),
    (47, "Conto_economico.Costi_di_produzione.Per_materie_prime_sussidiarie_di_consumo_merci"),
    (48, "Conto_economico.Costi_di_produzione.Per_servizi"),
    (49, "Conto_economico.Costi_di_produzione.Per_godimento_di_beni_terzi"),
    (51, "Conto_economico.Costi_di_produzione.Per_personale.Salari_e_stipendi"),
    (52, "Conto_economico.Costi_di_produzione.Per_personale.Oneri_sociali"),
    (53, "Conto_economico.Costi_di_produzione.Per_personale.Trattamento_di_fine_rapporto"),
    (54, "Conto_economico.Costi_di_produzione.Per_personale.Trattamento_di_quiescenza_e_simili"),
    (55, "Conto_economico.Costi_di_produzione.Per_personale.Altri_costi"),
    (56, "Conto_economico.Costi_di_produzione.Per_personale.Totale_costi_per_il_personale"),
    (58, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_immateriali"),
    (59, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Ammortamento_delle_immobilizzazioni_materiali"),
    (60, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Altre_svalutazioni_delle_immobilizzazioni"),
    (61, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Svalutazioni_dei_crediti_compresi_nell_attivo_circolante_e_disp_liq"),
    (62, "Conto_economico.Costi_di_produzione.Ammortamento_e_svalutazioni.Totale_ammortamenti_e_svalutazioni"),
    (63, "Conto_economico.Costi_di_produzione.Variazione_delle_rimanenze_di_materie_prime_sussidiarie_di_consumo"),
    (64, "Conto_economico.Costi_di_produzione.Accantonamento_per_rischi"),
    (65, "Conto_economico.Costi_di_produzione.Altri_accantonamenti"),
    (66, "Conto_economico.Costi_di_produzione.Oneri_diversi_di_gestione"),
    (67, "Conto_economico.Costi_di_produzione.Totale_costi_della_produzione"),
    (68, "Conto_economico.Differenza_A_B"),
    (71, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.da_imprese_controllate"),
    (72, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.da_imprese_collegate"),
    (73, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.da_imprese_controllanti"),
    (74, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (75, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.altri"),
    (76, "Conto_economico.Proventi_e_oneri_finanziari.Proventi_da_partecipazioni.Totale_proventi_da_partecipazioni"),
    (79, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.da_imprese_controllate"),
    (80, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.da_imprese_collegate"),
    (81, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.da_imprese_controllanti"),
    (82, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (83, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.altri"),
    (84, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_crediti_iscritti_nelle_immobilizzazioni.Totale_proventi_finanziari_da_crediti_iscritti_nelle_immobilizzazioni"),
    (85, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_titoli_iscritti_nelle_immobilizzazioni_diversi_dalle_partecipazioni"),
    (86, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Da_titoli_iscritti_nell_attivo_circolante_diversi_dalle_partecipazioni"),
    (88, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.da_imprese_controllate"),
    (89, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.da_imprese_collegate"),
    (90, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.da_imprese_controllanti"),
    (91, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.da_imprese_sottoposte_al_controllo_delle_controllanti"),
    (92, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.altri"),
    (93, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Proventi_diversi_dai_precedenti.Totale_proventi_diversi_dai_precedenti"),
    (94, "Conto_economico.Proventi_e_oneri_finanziari.Altri_proventi_finanziari.Totale_altri_proventi_finanziari"),
    (96, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.verso_imprese_controllate"),
    (97, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.verso_imprese_collegate"),
    (98, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.verso_imprese_controllanti"),
    (99, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.verso_imprese_sottoposte_al_controllo_delel_controllanti"),
    (100, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.altri"),
    (101, "Conto_economico.Proventi_e_oneri_finanziari.Interessi_ed_oneri_finanziari.Totale_interessi_e_altri_oneri_finanziari"),
    (102, "Conto_economico.Proventi_e_oneri_finanziari.Utili_e_perdite_su_cambi"),
    (103, "Conto_economico.Proventi_e_oneri_finanziari.Totale_proventi_e_oneri_finanziari"),
    (106, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Rivalutazioni.di_partecipazioni"),
    (107, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Rivalutazioni.di_immobilizzazioni_finanziarie_che_non_costituiscono_partecipazioni"),
    (108, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Rivalutazioni.di_titoli_iscritti_nell_attivo_circolante_che_non_costituiscono_partecipazioni"),
    (109, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Rivalutazioni.di_strumenti_finanziari_derivati"),
    (110, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Rivalutazioni.Totale_rivalutazioni"),
    (112, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Svalutazioni.di_partecipazioni"),
    (113, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Svalutazioni.di_immobilizzazioni_finanziarie_che_non_costituiscono_partecipazioni"),
    (114, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Svalutazioni.di_titoli_iscritti_nell_attivo_circolante_che_non_costituiscono_partecipazioni"),
    (115, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Svalutazioni.di_strumenti_finanziari_derivati"),
    (116, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Svalutazioni.Totale_svalutazioni"),
    (117, "Conto_economico.Rettifiche_di_valore_di_attivita_passivita_e_finanziarie.Totale_rettifiche_di_valore_di_attivita_finanziarie"),
    (119, "Conto_economico.Proventi_e_oneri_straordinari.Proventi_con_separata_indicazione_delle_plusvalenze_da_alienazioni"),
    (120, "Conto_economico.Proventi_e_oneri_straordinari.Oneri_con_separata_indicazione_delle_minusvalenze_da_alienazioni"),
    (121, "Conto_economico.Proventi_e_oneri_straordinari.Totale_delle_partite_straordinarie"),
    (122, "Conto_economico.Risultato_prima_delle_imposte"),
    (124, "Conto_economico.Imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate.imposte_correnti"),
    (125, "Conto_economico.Imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate.imposte_relative_a_esercizi_precedenti"),
    (126, "Conto_economico.Imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate.imposte_differite_e_anticipate"),
    (127, "Conto_economico.Imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate.proventi_oneri_da_adesione_al_regime_di_consolidato_fiscale"),
    (128, "Conto_economico.Imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate.Totale_delle_imposte_sul_reddito_di_esercizio_correnti_differite_e_anticipate"),
    (129, "Conto_economico.Utile_(perdita)_dell_esercizio"),
];

fn first_sheet<P: AsRef<Path>>(path: P) -> Result<Option<Range<Data>>> {
    let mut workbook = open_workbook_auto(path.as_ref())?;
    match workbook.worksheet_range_at(0) {
        Some(range) => Ok(Some(range?)),
        None => Ok(None),
    }
}

/// Renders a cell the way a spreadsheet shows it as text.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Int(0) => None,
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) if *f == 0.0 => None,
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::Bool(false) => None,
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64()).map(|d| format!("{} 00:00:00", d.format("%Y-%m-%d"))),
        Data::Error(e) => Some(format!("{:?}", e)),
    }
}

fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

/// Numeric value of a column-K cell. Blank or unreadable cells count as zero.
fn cell_number(cell: Option<&Data>) -> f64 {
    match cell {
        Some(Data::Float(f)) => *f,
        Some(Data::Int(i)) => *i as f64,
        Some(Data::String(s)) => {
            let normalized = s.trim().replace('.', "").replace(',', ".");
            if normalized.is_empty() {
                return 0.0;
            }
            normalized.parse::<f64>().unwrap_or(0.0)
        }
        Some(Data::Bool(b)) => f64::from(u8::from(*b)),
        _ => 0.0,
    }
}

/// Lower-cased text of the given 1-based rows, cells separated by spaces.
fn rows_text(range: &Range<Data>, first_row: u32, last_row: u32) -> String {
    let (start, end) = match (range.start(), range.end()) {
        (Some(start), Some(end)) => (start, end),
        _ => return String::new(),
    };
    let mut parts = Vec::new();
    for row in (first_row - 1)..last_row {
        for col in start.1..=end.1 {
            if let Some(text) = range.get_value((row, col)).and_then(cell_text) {
                parts.push(text.to_lowercase());
            }
        }
    }
    parts.join(" ")
}

fn classify_layout(signature_text: &str, row_count: u32) -> ExcelFormat {
    if signature_text.contains("crediti verso soci") || signature_text.contains("parte richiamata") {
        return ExcelFormat::Full;
    }
    if signature_text.contains("immobilizzazioni") {
        return ExcelFormat::Abbreviated;
    }
    if row_count > FULL_LAYOUT_MIN_ROWS {
        ExcelFormat::Full
    } else {
        ExcelFormat::Abbreviated
    }
}

/// Classifies a workbook by its row-4 signature, falling back on sheet length.
pub fn detect_excel_format<P: AsRef<Path>>(path: P) -> ExcelFormat {
    let path = path.as_ref();
    let range = match first_sheet(path) {
        Ok(Some(range)) if !range.is_empty() => range,
        Ok(_) => {
            warn!("xlsx {}: first sheet is empty", path.display());
            return ExcelFormat::Unknown;
        }
        Err(e) => {
            warn!("xlsx {}: {}", path.display(), e);
            return ExcelFormat::Unknown;
        }
    };

    let row_count = range.end().map(|(row, _)| row + 1).unwrap_or(0);
    let format = classify_layout(&rows_text(&range, SIGNATURE_ROW, SIGNATURE_ROW), row_count);
    debug!("xlsx {}: {} rows, detected {:?} layout", path.display(), row_count, format);
    format
}

fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut keys: Vec<&str> = path.split('.').collect();
    let leaf = match keys.pop() {
        Some(leaf) => leaf,
        None => return,
    };

    let mut node = root;
    for key in keys {
        let child = node
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        node = match child {
            Value::Object(map) => map,
            _ => {
                warn!("xlsx layout: {} crosses a leaf at {}", path, key);
                return;
            }
        };
    }
    node.insert(leaf.to_string(), value);
}

/// Builds the bilancio tree for a layout, reading each row through `read`.
fn build_tree<F: Fn(u32) -> f64>(layout: &[(u32, &str)], read: F) -> Value {
    let mut root = Map::new();
    let mut general = Map::new();
    general.insert("id_bilancio".to_string(), Value::from("1"));
    root.insert(GENERAL_INFO_KEY.to_string(), Value::Object(general));

    for (row, path) in layout {
        insert_path(&mut root, path, Value::from(read(*row)));
    }
    Value::Object(root)
}

fn extract_with_layout<P: AsRef<Path>>(path: P, layout: &[(u32, &str)], name: &str) -> Result<Value> {
    let path = path.as_ref();
    let range = first_sheet(path)?.unwrap_or_default();
    let tree = build_tree(layout, |row| cell_number(range.get_value((row - 1, VALUE_COLUMN))));
    info!("xlsx {}: {} layout, {} cells read", path.display(), name, layout.len());
    Ok(tree)
}

pub fn extract_bilancio_from_xlsx<P: AsRef<Path>>(path: P) -> Result<Value> {
    extract_with_layout(path, FULL_LAYOUT, "full")
}

pub fn extract_bilancio_abbreviato_from_xlsx<P: AsRef<Path>>(path: P) -> Result<Value> {
    extract_with_layout(path, ABBREVIATED_LAYOUT, "abbreviated")
}

/// Finds the closing date of the statement in header text.
///
/// Returns `YYYY-MM-DD` for numeric or month-name dates, otherwise the first
/// four-digit number.
fn balance_date_from_header(text: &str) -> Option<String> {
    if let Some(caps) = NUMERIC_DATE_RE.captures(text) {
        let day = caps[1].parse::<u32>().ok();
        let month = caps[2].parse::<u32>().ok();
        let year = caps[3].parse::<i32>().ok();
        if let (Some(day), Some(month), Some(year)) = (day, month, year) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
                return Some(date.format("%Y-%m-%d").to_string());
            }
        }
    }

    if let Some(year) = CENTURY_YEAR_RE.find(text) {
        if let Some((_, month)) = ITALIAN_MONTHS.iter().find(|(name, _)| text.contains(name)) {
            let day = DAY_RE
                .find(text)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .unwrap_or(1);
            return Some(format!("{}-{:02}-{:02}", year.as_str(), month, day));
        }
    }

    FOUR_DIGITS_RE.captures(text).map(|caps| caps[1].to_string())
}

/// Reads the statement date from the first five rows of the first sheet.
pub fn extract_balance_year<P: AsRef<Path>>(path: P) -> Option<String> {
    let path = path.as_ref();
    let range = match first_sheet(path) {
        Ok(Some(range)) => range,
        Ok(None) => return None,
        Err(e) => {
            warn!("xlsx {}: cannot read header rows: {}", path.display(), e);
            return None;
        }
    };
    let header = rows_text(&range, 1, HEADER_ROWS);
    balance_date_from_header(&header)
}

/// Lower-cased text of the first `rows` rows, used by period detection.
pub fn header_text<P: AsRef<Path>>(path: P, rows: u32) -> Result<String> {
    Ok(first_sheet(path)?
        .map(|range| rows_text(&range, 1, rows))
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{get_number, get_path};
    use std::collections::HashSet;

    #[test]
    fn test_layout_signature() {
        assert_eq!(classify_layout("a) crediti verso soci per versamenti", 40), ExcelFormat::Full);
        assert_eq!(classify_layout("parte richiamata", 40), ExcelFormat::Full);
        assert_eq!(classify_layout("b) immobilizzazioni", 300), ExcelFormat::Abbreviated);
        assert_eq!(classify_layout("", 121), ExcelFormat::Full);
        assert_eq!(classify_layout("", 120), ExcelFormat::Abbreviated);
    }

    #[test]
    fn test_cell_number() {
        assert_eq!(cell_number(None), 0.0);
        assert_eq!(cell_number(Some(&Data::Empty)), 0.0);
        assert_eq!(cell_number(Some(&Data::Float(12.5))), 12.5);
        assert_eq!(cell_number(Some(&Data::Int(7))), 7.0);
        assert_eq!(cell_number(Some(&Data::String("1.234,50".to_string()))), 1234.5);
        assert_eq!(cell_number(Some(&Data::String("n/d".to_string()))), 0.0);
        assert_eq!(cell_number(Some(&Data::String(String::new()))), 0.0);
    }

    #[test]
    fn test_cell_text_skips_falsy_cells() {
        assert_eq!(cell_text(&Data::Empty), None);
        assert_eq!(cell_text(&Data::Float(0.0)), None);
        assert_eq!(cell_text(&Data::Float(2023.0)), Some("2023".to_string()));
        assert_eq!(cell_text(&Data::String("Bilancio".to_string())), Some("Bilancio".to_string()));
    }

    #[test]
    fn test_build_tree_full_layout() {
        let tree = build_tree(FULL_LAYOUT, |row| f64::from(row));
        let keys: Vec<&String> = tree.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], GENERAL_INFO_KEY);
        assert_eq!(get_path(&tree, "informazioni_generali.id_bilancio"), Some(&Value::from("1")));
        assert_eq!(
            get_number(
                &tree,
                "Stato_patrimoniale.Attivo.Crediti_verso_soci_per_versamenti_ancora_dovuti.Parte_richiamata"
            ),
            Some(4.0)
        );
    }

    #[test]
    fn test_layout_paths_are_unique() {
        for layout in [FULL_LAYOUT, ABBREVIATED_LAYOUT] {
            let mut seen = HashSet::new();
            for (_, path) in layout {
                assert!(seen.insert(*path), "duplicate path {}", path);
            }
        }
    }

    #[test]
    fn test_abbreviated_tree_ends_with_result() {
        let tree = build_tree(ABBREVIATED_LAYOUT, |_| 0.0);
        assert_eq!(get_number(&tree, "Conto_economico.Utile_(perdita)_dell_esercizio"), Some(0.0));
    }

    #[test]
    fn test_balance_date_from_header() {
        assert_eq!(balance_date_from_header("bilancio al 31/12/2023"), Some("2023-12-31".to_string()));
        assert_eq!(balance_date_from_header("chiuso il 30.06.2022"), Some("2022-06-30".to_string()));
        assert_eq!(balance_date_from_header("al 31 dicembre 2023"), Some("2023-12-31".to_string()));
        assert_eq!(balance_date_from_header("esercizio dicembre 2021"), Some("2021-12-01".to_string()));
        assert_eq!(balance_date_from_header("bilancio 2024"), Some("2024".to_string()));
        assert_eq!(balance_date_from_header("nessuna data"), None);
    }

    #[test]
    fn test_invalid_numeric_date_falls_through() {
        assert_eq!(balance_date_from_header("al 45/13/2023"), Some("2023".to_string()));
    }
}
