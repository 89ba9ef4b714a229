use log::debug;

/// Which "Altri" bucket of the financial section was introduced last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinancialSubsection {
    ProventiDiversi,
    Interessi,
}

/// State machine over heading lines that keeps the current section path.
///
/// Once a `CONTO ECONOMICO` heading is seen the tracker stays in the income
/// statement: later `STATO PATRIMONIALE` or `PASSIVO` headings do not move it
/// back to the balance sheet.
#[derive(Debug, Default, Clone)]
pub struct SectionTracker {
    stack: Vec<String>,
    in_conto_economico: bool,
    last_financial_subsection: Option<FinancialSubsection>,
}

const CREDITI_BRANCHES: &[(&[&str], &str, &str)] = &[
    (&["VERSO CLIENTI"], "1)", "Verso_clienti"),
    (&["VERSO IMPRESE CONTROLLATE"], "2)", "Verso_imprese_controllate"),
    (&["VERSO IMPRESE COLLEGATE"], "3)", "Verso_imprese_collegate"),
    (&["VERSO CONTROLLANTI"], "4)", "Verso_Controllanti"),
];

impl SectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(&self) -> String {
        self.stack.join(".")
    }

    pub fn last_financial_subsection(&self) -> Option<FinancialSubsection> {
        self.last_financial_subsection
    }

    pub fn in_conto_economico(&self) -> bool {
        self.in_conto_economico
    }

    fn set(&mut self, parts: &[&str]) {
        self.stack = parts.iter().map(|p| p.to_string()).collect();
    }

    fn contains(&self, part: &str) -> bool {
        self.stack.iter().any(|p| p == part)
    }

    fn is_under(&self, side: &str) -> bool {
        self.stack.len() >= 2 && self.stack[1] == side
    }

    /// Replaces everything after the first `keep` levels with `tail`.
    fn truncate_push(&mut self, keep: usize, tail: &[&str]) {
        self.stack.truncate(keep);
        self.stack.extend(tail.iter().map(|t| t.to_string()));
    }

    /// Replaces whatever follows `anchor` with `leaf`.
    fn replace_after(&mut self, anchor: &str, leaf: &str) {
        if let Some(idx) = self.stack.iter().position(|p| p == anchor) {
            self.truncate_push(idx + 1, &[leaf]);
        }
    }

    /// Feeds one line and returns the resulting section path.
    pub fn update_section(&mut self, line: &str) -> String {
        let upper = line.trim().to_uppercase();
        let before = self.context();

        if upper.contains("CONTO ECONOMICO") {
            self.set(&["Conto_economico"]);
            self.in_conto_economico = true;
        } else if self.in_conto_economico {
            self.update_income_statement(&upper);
        } else {
            self.update_balance_sheet(line, &upper);
        }

        let after = self.context();
        if after != before {
            debug!("section: {} -> {}", before, after);
        }
        after
    }

    fn update_income_statement(&mut self, upper: &str) {
        let has = |kw: &str| upper.contains(kw);

        if has("VALORE DELLA PRODUZIONE") || has("VALORE PRODUZIONE") {
            self.set(&["Conto_economico", "Valore_della_produzione"]);
        } else if has("COSTI DELLA PRODUZIONE")
            || has("COSTI DI PRODUZIONE")
            || has("COSTO DELLA PRODUZIONE")
            || has("B) COSTI")
        {
            self.set(&["Conto_economico", "Costi_di_produzione"]);
        } else if has("PROVENTI E ONERI FINANZIARI") {
            self.set(&["Conto_economico", "Proventi_e_oneri_finanziari"]);
            self.last_financial_subsection = None;
        }

        let proventi_diversi = has("PROVENTI DIVERSI DAI PRECEDENTI")
            || (has("PROVENTI DIVERSI") && has("PRECEDENTI"))
            || (has("DIVERSI") && has("PRECEDENTI") && has("PROVENTI"))
            || (upper.starts_with("16)") && (has("DIVERSI") || has("PRECEDENTI")))
            || (has("16") && has("DIVERSI"));
        let interessi = has("INTERESSI E ALTRI ONERI FINANZIARI")
            || (has("INTERESSI") && has("ONERI") && has("FINANZIARI"))
            || has("INTERESSI E ONERI")
            || (upper.starts_with("17)") && (has("INTERESSI") || has("ONERI")))
            || (upper.starts_with("C)") && has("INTERESSI"))
            || (has("17") && has("INTERESSI") && has("ONERI"));
        let altri_proventi = has("ALTRI PROVENTI FINANZIARI")
            || (has("ALTRI") && has("PROVENTI") && has("FINANZIARI") && !has("DIVERSI"));

        if proventi_diversi {
            self.set(&[
                "Conto_economico",
                "Proventi_e_oneri_finanziari",
                "Proventi_diversi_dalle_partecipazioni",
            ]);
            self.last_financial_subsection = Some(FinancialSubsection::ProventiDiversi);
        } else if interessi {
            self.set(&[
                "Conto_economico",
                "Proventi_e_oneri_finanziari",
                "Interessi_e_oneri_finanziari",
            ]);
            self.last_financial_subsection = Some(FinancialSubsection::Interessi);
        } else if altri_proventi {
            // parent of the proventi diversi heading; wait for it
        } else if has("RETTIFICHE DI VALORE") || (has("D)") && has("RETTIFICHE")) {
            self.set(&[
                "Conto_economico",
                "Rettifiche_di_valore_di_attivita_passivita_e_finanzianziarie ",
            ]);
        } else if has("RISULTATO PRIMA DELLE IMPOSTE") {
            self.set(&["Conto_economico", "Risultato_prima_delle_imposte"]);
        }
    }

    fn update_balance_sheet(&mut self, line: &str, upper: &str) {
        let has = |kw: &str| upper.contains(kw);

        if has("STATO PATRIMONIALE") || (upper.starts_with("ATTIVO") && !has("CIRCOLANTE")) {
            self.set(&["Stato_patrimoniale", "Attivo"]);
            self.in_conto_economico = false;
            return;
        }
        if has("PASSIVO") && !has("RATEI") && !has("RETTIFICHE") {
            self.set(&["Stato_patrimoniale", "Passivo"]);
            self.in_conto_economico = false;
            return;
        }

        let attivo = self.is_under("Attivo");
        if has("CREDITI VERSO SOCI") {
            if attivo {
                self.truncate_push(2, &["Crediti_verso_soci_per_versamenti_ancora_dovuti"]);
            }
        } else if has("IMMOBILIZZAZIONI") && !has("IMMATERIALI") && !has("MATERIALI") && !has("FINANZIARIE") {
            if attivo {
                self.truncate_push(2, &["Immobilizzazioni"]);
            }
        } else if has("IMMOBILIZZAZIONI IMMATERIALI") {
            if attivo {
                self.truncate_push(2, &["Immobilizzazioni", "Immobilizzazioni_Immateriali"]);
            }
        } else if has("IMMOBILIZZAZIONI MATERIALI") {
            if attivo {
                self.truncate_push(2, &["Immobilizzazioni", "Immobilizzazioni_Materiali"]);
            }
        } else if has("IMMOBILIZZAZIONI FINANZIARIE") {
            if attivo {
                self.truncate_push(2, &["Immobilizzazioni", "Immobilizzazioni_Finanziarie"]);
            }
        } else if has("ATTIVO CIRCOLANTE") {
            if attivo {
                self.truncate_push(2, &["Attivo_circolante"]);
            }
        } else if upper.starts_with("RIMANENZE") || (upper.starts_with('I') && has("RIMANENZE")) {
            if self.contains("Attivo_circolante") {
                self.truncate_push(3, &["Rimanenze"]);
            }
        } else if (has("CREDITI") && (upper.starts_with("II") || upper.starts_with("CREDITI")))
            || has("II) CREDITI")
        {
            if self.contains("Attivo_circolante") {
                self.truncate_push(3, &["Crediti"]);
            } else if self.contains("Immobilizzazioni_Finanziarie") {
                self.truncate_push(4, &["Crediti"]);
            }
        }

        if self.contains("Crediti") {
            self.update_crediti(line, upper);
        } else if has("DISPONIBILITA") && has("LIQUIDE") {
            if self.contains("Attivo_circolante") {
                self.truncate_push(3, &["Disponibilita_liquide"]);
            }
        } else if has("PATRIMONIO NETTO") {
            if self.is_under("Passivo") {
                self.truncate_push(2, &["Patrimonio_netto"]);
            }
        } else if has("FONDI PER RISCHI E ONERI") || has("FONDI RISCHI E ONERI") {
            if self.is_under("Passivo") {
                self.truncate_push(2, &["Fondi_per_rischi_e_oneri"]);
            }
        } else if has("TRATTAMENTO DI FINE RAPPORTO") || has("TRATTAMENTO FINE RAPPORTO") {
            if self.is_under("Passivo") {
                self.truncate_push(2, &["Trattamento_di_fine_rapporto_di_lavoro_subordinato"]);
            }
        } else if (upper.starts_with("D)") || upper.starts_with("DEBITI")) && has("DEBITI") {
            if self.is_under("Passivo") {
                self.truncate_push(2, &["Debiti"]);
            }
        }

        if self.contains("Debiti") {
            self.update_debiti(line, upper);
        }
    }

    fn update_crediti(&mut self, line: &str, upper: &str) {
        let has = |kw: &str| upper.contains(kw);

        for (keywords, number, leaf) in CREDITI_BRANCHES {
            if keywords.iter().any(|k| has(k)) || (line.contains(number) && has("VERSO")) {
                self.replace_after("Crediti", leaf);
                return;
            }
        }
        if has("TRIBUTARI") && (has("5-BIS") || has("CREDITI TRIBUTARI")) {
            self.replace_after("Crediti", "Crediti_tributari");
        } else if has("VERSO ALTRI") || has("5-QUATER") {
            self.replace_after("Crediti", "Verso_altri");
        }
    }

    fn update_debiti(&mut self, line: &str, upper: &str) {
        let has = |kw: &str| upper.contains(kw);
        let raw_has = |kw: &str| line.contains(kw);

        let leaf = if has("OBBLIGAZIONI CONVERTIBILI") {
            Some("Obbligazioni_convertibili")
        } else if has("OBBLIGAZIONI") && (raw_has("1)") || upper.starts_with("OBBLIGAZIONI")) {
            Some("Obbligazioni")
        } else if has("DEBITI VERSO SOCI PER FINANZIAMENTI") || (raw_has("2)") && has("SOCI")) {
            Some("Debiti_verso_soci_per_finanziamenti")
        } else if has("DEBITI VERSO BANCHE") || (raw_has("4)") && has("BANCHE")) {
            Some("Debiti_verso_banche")
        } else if has("DEBITI VERSO ALTRI FINANZIATORI") || (raw_has("5)") && has("FINANZIATORI")) {
            Some("Debiti_verso_altri_finanziatori")
        } else if upper == "ACCONTI" || (upper.starts_with("6)") && has("ACCONTI")) {
            Some("Acconti")
        } else if has("DEBITI VERSO FORNITORI") || (raw_has("7)") && has("FORNITORI")) {
            Some("Debiti_verso_fornitori")
        } else if has("DEBITI RAPPRESENTATI DA TITOLI") || (raw_has("9)") && has("TITOLI")) {
            Some("Debiti_verso_rappresentati_da_titoli_di_credito")
        } else if has("DEBITI VERSO IMPRESE CONTROLLATE") || (raw_has("10)") && has("CONTROLLATE")) {
            Some("Debiti_verso_imprese_controllate")
        } else if has("DEBITI VERSO IMPRESE COLLEGATE") || (raw_has("11)") && has("COLLEGATE")) {
            Some("Debiti_verso_imprese_collegate")
        } else if has("DEBITI VERSO CONTROLLANTI") || (has("11-BIS)") && has("CONTROLLANTI")) {
            Some("Debiti_verso_controllanti")
        } else if has("DEBITI TRIBUTARI") || (raw_has("12)") && has("TRIBUTARI")) {
            Some("Debiti_tributari")
        } else if has("DEBITI VERSO ISTITUTI DI PREVIDENZA") || (raw_has("13)") && has("PREVIDENZA")) {
            Some("Debiti_verso_istituti_di_previdenza_e_di_sicurezza_sociale")
        } else if has("ALTRI DEBITI") || (raw_has("14)") && has("ALTRI")) {
            Some("Altri_debiti")
        } else {
            None
        };

        if let Some(leaf) = leaf {
            self.replace_after("Debiti", leaf);
        }
    }
}
