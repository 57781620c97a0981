use std::{fmt, str::FromStr};

use crate::{
    common::{clean_cell, normalize_identifier},
    constants::{
        OUTPUT_COLUMNS, REPORT_DISPLAY_NAME_COLUMN, REPORT_NPI_COLUMN, REPORT_TICKET_COLUMN,
        REPORT_TYPE_COLUMN,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderType {
    Surgeon,
    Provider,
    Rcm,
    Coder,
    SurgeonOrProvider,
    Other(String),
}

impl ProviderType {
    pub fn parse(raw: &str) -> Option<Self> {
        let value = clean_cell(raw)?;
        let parsed = match value.as_str() {
            "Surgeon" => Self::Surgeon,
            "Provider" => Self::Provider,
            "RCM" => Self::Rcm,
            "Coder" => Self::Coder,
            "Surgeon or Provider" => Self::SurgeonOrProvider,
            _ => Self::Other(value),
        };
        Some(parsed)
    }

    /// Position in the output ordering; types outside the fixed order have no rank.
    pub fn sort_rank(&self) -> Option<u8> {
        match self {
            Self::Surgeon => Some(0),
            Self::Provider => Some(1),
            Self::Rcm => Some(2),
            Self::Coder => Some(3),
            Self::SurgeonOrProvider | Self::Other(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Action {
    ChangeTicket,
    CompleteInfo,
    AwaitingUsap,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChangeTicket => "CHANGE TICKET",
            Self::CompleteInfo => "COMPLETAR INFO",
            Self::AwaitingUsap => "AWAITING USAP",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], " ");
        [Self::ChangeTicket, Self::CompleteInfo, Self::AwaitingUsap]
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                format!("unknown action '{s}' (expected CHANGE TICKET, COMPLETAR INFO or AWAITING USAP)")
            })
    }
}

/// Evidence that decided a row's action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Source {
    UsapCorrection,
    LearnedCorrection,
    Dictionary,
    ApiValidation,
    BotAnalysis,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UsapCorrection => "USAP Correction",
            Self::LearnedCorrection => "Learned Correction",
            Self::Dictionary => "Dictionary",
            Self::ApiValidation => "API Validation",
            Self::BotAnalysis => "Bot Analysis",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four bot columns written for every row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub action: Action,
    pub suggestion: String,
    pub details: String,
    pub source: Source,
}

impl Default for Annotation {
    fn default() -> Self {
        Self {
            action: Action::AwaitingUsap,
            suggestion: String::new(),
            details: String::new(),
            source: Source::BotAnalysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionRow {
    /// Original cell values, one per report column.
    pub cells: Vec<String>,
    pub ticket: Option<String>,
    pub npi: Option<String>,
    pub provider_type: Option<ProviderType>,
    pub display_name: Option<String>,
    pub annotation: Annotation,
}

impl ExceptionRow {
    pub fn new(
        ticket: Option<&str>,
        npi: Option<&str>,
        provider_type: Option<&str>,
        display_name: Option<&str>,
    ) -> Self {
        Self {
            cells: Vec::new(),
            ticket: ticket.and_then(clean_cell),
            npi: npi.and_then(clean_npi),
            provider_type: provider_type.and_then(ProviderType::parse),
            display_name: display_name.and_then(clean_cell),
            annotation: Annotation::default(),
        }
    }

    /// Type hint for dictionary lookups; a missing type matches no dictionary.
    pub fn type_hint(&self) -> ProviderType {
        self.provider_type
            .clone()
            .unwrap_or_else(|| ProviderType::Other(String::new()))
    }
}

pub fn clean_npi(raw: &str) -> Option<String> {
    clean_cell(raw)
        .map(|v| normalize_identifier(&v))
        .filter(|v| !v.is_empty())
}

/// Positions of the well-known columns in a report header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportColumns {
    pub ticket: Option<usize>,
    pub npi: Option<usize>,
    pub provider_type: Option<usize>,
    pub display_name: Option<usize>,
}

impl ReportColumns {
    pub fn locate(headers: &[String]) -> Self {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Self {
            ticket: find(REPORT_TICKET_COLUMN),
            npi: find(REPORT_NPI_COLUMN),
            provider_type: find(REPORT_TYPE_COLUMN),
            display_name: find(REPORT_DISPLAY_NAME_COLUMN),
        }
    }
}

/// One sheet of the CB Failed report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ExceptionRow>,
}

impl ReportSheet {
    /// Builds a sheet from a raw grid whose first row is the header.
    ///
    /// Returns `None` for sheets without data rows.
    pub fn from_grid(name: &str, grid: Vec<Vec<String>>) -> Option<Self> {
        let mut grid = grid.into_iter();
        let columns: Vec<String> = grid.next()?.into_iter().map(|h| h.trim().to_string()).collect();
        let located = ReportColumns::locate(&columns);

        let rows: Vec<ExceptionRow> = grid
            .filter(|cells| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|mut cells| {
                cells.resize(columns.len().max(cells.len()), String::new());
                let get = |idx: Option<usize>| idx.map(|i| cells[i].as_str());
                let mut row = ExceptionRow::new(
                    get(located.ticket),
                    get(located.npi),
                    get(located.provider_type),
                    get(located.display_name),
                );
                row.cells = cells;
                row
            })
            .collect();

        if rows.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            columns,
            rows,
        })
    }

    pub fn has_type_column(&self) -> bool {
        ReportColumns::locate(&self.columns).provider_type.is_some()
    }

    /// Orders rows by provider type (`Surgeon`, `Provider`, `RCM`, `Coder`) and then by
    /// display name. Unranked types and missing names come first; ties keep their order.
    pub fn sort_rows(&mut self) {
        if !self.has_type_column() {
            return;
        }
        self.rows.sort_by(|a, b| {
            let rank = |row: &ExceptionRow| row.provider_type.as_ref().and_then(ProviderType::sort_rank);
            rank(a)
                .cmp(&rank(b))
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
    }

    /// Header and rows as written to the output workbook, bot columns included.
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        let layout = output_layout(&self.columns);

        let header = layout
            .iter()
            .map(|slot| match *slot {
                Slot::Original(idx) => self.columns[idx].clone(),
                Slot::Bot(k) => OUTPUT_COLUMNS[k].0.to_string(),
            })
            .collect();

        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(header);
        for row in &self.rows {
            let bot_values = [
                row.annotation.action.as_str().to_string(),
                row.annotation.suggestion.clone(),
                row.annotation.details.clone(),
                row.annotation.source.as_str().to_string(),
            ];
            grid.push(
                layout
                    .iter()
                    .map(|slot| match *slot {
                        Slot::Original(idx) => row.cells.get(idx).cloned().unwrap_or_default(),
                        Slot::Bot(k) => bot_values[k].clone(),
                    })
                    .collect(),
            );
        }
        grid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Original(usize),
    Bot(usize),
}

/// Existing bot columns are reused in place; missing ones are inserted at their fixed position.
fn output_layout(columns: &[String]) -> Vec<Slot> {
    let mut layout: Vec<Slot> = (0..columns.len()).map(Slot::Original).collect();
    for (k, (name, position)) in OUTPUT_COLUMNS.iter().enumerate() {
        match columns.iter().position(|c| c == name) {
            Some(existing) => {
                if let Some(slot) = layout.iter_mut().find(|s| **s == Slot::Original(existing)) {
                    *slot = Slot::Bot(k);
                }
            }
            None => {
                let at = (*position).min(layout.len());
                layout.insert(at, Slot::Bot(k));
            }
        }
    }
    layout
}
