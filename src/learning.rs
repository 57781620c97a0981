use std::collections::HashMap;

use crate::{
    corrections::{CorrectionSet, Instruction},
    report::{ReportColumns, clean_npi},
    workbook::SheetGrid,
};

/// NPI -> corrected code, learned from simple corrections and applied to every row
/// sharing that NPI.
pub type LearnedCodes = HashMap<String, String>;

/// Ticket and NPI of one original report row, before any processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketNpi {
    pub ticket: String,
    pub npi: Option<String>,
}

/// Collects `(ticket, NPI)` pairs across all report sheets.
///
/// Returns `None` when no sheet carries both a `SIN` and an `NPI` column.
pub fn ticket_npis(sheets: &[SheetGrid]) -> Option<Vec<TicketNpi>> {
    let mut pairs = Vec::new();
    let mut usable = false;

    for sheet in sheets {
        let Some((header, rows)) = sheet.grid.split_first() else {
            continue;
        };
        let columns = ReportColumns::locate(header);
        let (Some(ticket_col), Some(npi_col)) = (columns.ticket, columns.npi) else {
            continue;
        };
        usable = true;

        for row in rows {
            let Some(ticket) = row.get(ticket_col).map(|t| t.trim()).filter(|t| !t.is_empty()) else {
                continue;
            };
            pairs.push(TicketNpi {
                ticket: ticket.to_string(),
                npi: row.get(npi_col).and_then(|v| clean_npi(v)),
            });
        }
    }

    usable.then_some(pairs)
}

/// Learns a code for every NPI whose ticket received a simple correction with a new code.
///
/// Tickets missing from the report or rows without an NPI are skipped. When several tickets
/// share an NPI the last instruction, in correction order, wins.
pub fn learn_codes(corrections: &CorrectionSet, original_rows: &[TicketNpi]) -> LearnedCodes {
    let mut by_ticket: HashMap<&str, Option<&str>> = HashMap::new();
    for row in original_rows {
        by_ticket
            .entry(row.ticket.as_str())
            .or_insert(row.npi.as_deref());
    }

    let mut learned = LearnedCodes::new();
    for (ticket, instruction) in corrections.iter() {
        let Instruction::SimpleCorrection {
            new_code: Some(code),
            ..
        } = instruction
        else {
            continue;
        };
        let Some(Some(npi)) = by_ticket.get(ticket) else {
            continue;
        };
        if let Some(previous) = learned.insert(npi.to_string(), code.clone()) {
            if &previous != code {
                tracing::debug!("NPI {npi}: learned code {previous} replaced by {code}");
            }
        }
    }
    learned
}
