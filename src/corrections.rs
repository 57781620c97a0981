use anyhow::Result;
use regex::Regex;
use std::{collections::HashMap, path::Path, sync::LazyLock};

use crate::{
    common::{clean_cell, contains_ignore_case, remove_ignore_case},
    workbook::read_workbook,
};

const TICKET_FIELD: &str = "sin";
const COMMENT_FIELD: &str = "comments";
const NPI_FIELD: &str = "npi";
const CODE_FIELD: &str = "cbcode";
const NAME_FIELD: &str = "last - title";

const REDIRECT_MARKER: &str = "chg to";

/// What a correction sheet says should happen to one exception ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Redirect the ticket to another provider.
    ChangeTicket {
        new_name: String,
        new_code: Option<String>,
        new_npi: Option<String>,
    },
    /// Complete or fix the ticket's own code and/or NPI.
    SimpleCorrection {
        new_code: Option<String>,
        new_npi: Option<String>,
    },
    /// Waiting on the client; nothing to apply yet.
    Awaiting,
}

impl Instruction {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::Awaiting)
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::ChangeTicket { .. } => "change_ticket",
            Self::SimpleCorrection { .. } => "simple_correction",
            Self::Awaiting => "awaiting",
        }
    }
}

/// The raw fields a correction row is matched against.
#[derive(Debug, Clone, Copy, Default)]
pub struct CorrectionFields<'a> {
    pub comment: &'a str,
    pub npi: &'a str,
    pub code: &'a str,
}

type Rule = fn(&CorrectionFields<'_>) -> Option<Instruction>;

/// Instruction rules in priority order. The first rule that matches decides the row.
const RULES: &[(&str, Rule)] = &[
    ("npi field redirect marker", redirect_marker_rule),
    ("comment names provider and cb code", provider_with_code_rule),
    ("comment names provider and npi", provider_with_npi_rule),
    ("awaiting or pending", awaiting_rule),
    ("code or npi present", simple_correction_rule),
];

static PROVIDER_WITH_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)correct provider (.*?) with cb code (.*)").expect("valid regex")
});

static PROVIDER_WITH_NPI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)correct provider (.*?) with npi (.*)").expect("valid regex")
});

fn redirect_marker_rule(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    if !contains_ignore_case(fields.npi, REDIRECT_MARKER) {
        return None;
    }
    Some(Instruction::ChangeTicket {
        new_name: remove_ignore_case(fields.npi, REDIRECT_MARKER).trim().to_string(),
        new_code: clean_cell(fields.code),
        new_npi: None,
    })
}

fn provider_with_code_rule(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    let caps = PROVIDER_WITH_CODE.captures(fields.comment)?;
    let code = caps[2].trim().trim_end_matches(')').trim();
    Some(Instruction::ChangeTicket {
        new_name: caps[1].trim().to_string(),
        new_code: clean_cell(code),
        new_npi: None,
    })
}

fn provider_with_npi_rule(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    let caps = PROVIDER_WITH_NPI.captures(fields.comment)?;
    Some(Instruction::ChangeTicket {
        new_name: caps[1].trim().to_string(),
        new_code: None,
        new_npi: clean_cell(&caps[2]),
    })
}

fn awaiting_rule(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    (contains_ignore_case(fields.code, "awaiting") || contains_ignore_case(fields.comment, "pending"))
        .then_some(Instruction::Awaiting)
}

fn simple_correction_rule(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    let new_code = clean_cell(fields.code);
    let new_npi = clean_cell(fields.npi);
    if new_code.is_none() && new_npi.is_none() {
        return None;
    }
    Some(Instruction::SimpleCorrection { new_code, new_npi })
}

/// Derives the instruction for one correction row, if any rule applies.
pub fn derive_instruction(fields: &CorrectionFields<'_>) -> Option<Instruction> {
    RULES.iter().find_map(|(name, rule)| {
        let instruction = rule(fields)?;
        tracing::trace!("correction rule '{name}' matched");
        Some(instruction)
    })
}

/// Instructions keyed by ticket, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionSet {
    entries: Vec<(String, Instruction)>,
    index: HashMap<String, usize>,
}

impl CorrectionSet {
    /// Records an instruction. An `Awaiting` instruction never replaces an existing one;
    /// anything else replaces whatever was there.
    pub fn merge(&mut self, ticket: &str, instruction: Instruction) {
        match self.index.get(ticket) {
            Some(&idx) => {
                if !instruction.is_awaiting() {
                    self.entries[idx].1 = instruction;
                }
            }
            None => {
                self.index.insert(ticket.to_string(), self.entries.len());
                self.entries.push((ticket.to_string(), instruction));
            }
        }
    }

    pub fn merge_all(&mut self, other: CorrectionSet) {
        for (ticket, instruction) in other.entries {
            self.merge(&ticket, instruction);
        }
    }

    pub fn get(&self, ticket: &str) -> Option<&Instruction> {
        self.index.get(ticket).map(|&idx| &self.entries[idx].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Instruction)> {
        self.entries.iter().map(|(t, i)| (t.as_str(), i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Finds the header row: it mentions the ticket column plus an NPI or name column.
fn find_header_row(grid: &[Vec<String>]) -> Option<usize> {
    grid.iter().position(|row| {
        let joined = row.join(" ").to_lowercase();
        joined.contains(TICKET_FIELD) && (joined.contains(NPI_FIELD) || joined.contains(NAME_FIELD))
    })
}

/// Parses one correction sheet. Sheets without a recognisable header yield nothing.
pub fn parse_sheet(grid: &[Vec<String>]) -> CorrectionSet {
    let mut set = CorrectionSet::default();
    let Some(header_idx) = find_header_row(grid) else {
        return set;
    };

    let header: Vec<String> = grid[header_idx]
        .iter()
        .map(|c| c.trim().to_lowercase())
        .collect();
    let column = |name: &str| header.iter().position(|h| h == name);
    let Some(ticket_col) = column(TICKET_FIELD) else {
        return set;
    };
    let comment_col = column(COMMENT_FIELD);
    let npi_col = column(NPI_FIELD);
    let code_col = column(CODE_FIELD);

    for row in &grid[header_idx + 1..] {
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(String::as_str)
                .unwrap_or("")
        };
        let ticket = cell(Some(ticket_col)).trim();
        if ticket.is_empty() {
            continue;
        }

        let fields = CorrectionFields {
            comment: cell(comment_col),
            npi: cell(npi_col),
            code: cell(code_col),
        };
        if let Some(instruction) = derive_instruction(&fields) {
            tracing::debug!("ticket {ticket}: {}", instruction.kind_str());
            set.merge(ticket, instruction);
        }
    }
    set
}

/// Parses every sheet of every correction workbook, in file then row order.
///
/// A workbook that cannot be read contributes nothing; the others still apply.
pub fn load_corrections(paths: &[impl AsRef<Path>]) -> CorrectionSet {
    let mut corrections = CorrectionSet::default();
    for path in paths {
        let path = path.as_ref();
        match parse_workbook(path) {
            Ok(set) => {
                tracing::info!(
                    "{}: {} correction instructions",
                    path.display(),
                    set.len()
                );
                corrections.merge_all(set);
            }
            Err(err) => tracing::warn!("Error processing '{}': {err:#}", path.display()),
        }
    }
    tracing::info!("Found {} correction instructions", corrections.len());
    corrections
}

fn parse_workbook(path: &Path) -> Result<CorrectionSet> {
    let mut set = CorrectionSet::default();
    for sheet in read_workbook(path)? {
        set.merge_all(parse_sheet(&sheet.grid));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(comment: &'a str, npi: &'a str, code: &'a str) -> CorrectionFields<'a> {
        CorrectionFields { comment, npi, code }
    }

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn redirect_marker_in_npi_field_wins() {
        let instruction =
            derive_instruction(&fields("pending review", "CHG TO Smith John", "GE05")).unwrap();
        assert_eq!(
            instruction,
            Instruction::ChangeTicket {
                new_name: "Smith John".into(),
                new_code: Some("GE05".into()),
                new_npi: None,
            }
        );
    }

    #[test]
    fn comment_with_cb_code_strips_trailing_paren() {
        let instruction =
            derive_instruction(&fields("Correct provider Jane Doe with cb code GE02)", "", ""))
                .unwrap();
        assert_eq!(
            instruction,
            Instruction::ChangeTicket {
                new_name: "Jane Doe".into(),
                new_code: Some("GE02".into()),
                new_npi: None,
            }
        );
    }

    #[test]
    fn comment_with_npi() {
        let instruction = derive_instruction(&fields(
            "please CORRECT PROVIDER Ann Lee with NPI 1234567890 ",
            "",
            "",
        ))
        .unwrap();
        assert_eq!(
            instruction,
            Instruction::ChangeTicket {
                new_name: "Ann Lee".into(),
                new_code: None,
                new_npi: Some("1234567890".into()),
            }
        );
    }

    #[test]
    fn awaiting_code_overrides_comment_content() {
        assert_eq!(
            derive_instruction(&fields("anything at all", "", "Awaiting NPI")),
            Some(Instruction::Awaiting)
        );
        assert_eq!(
            derive_instruction(&fields("Pending client", "1234567890", "GE01")),
            Some(Instruction::Awaiting)
        );
    }

    #[test]
    fn simple_correction_uses_present_fields() {
        assert_eq!(
            derive_instruction(&fields("", "nan", "GE01")),
            Some(Instruction::SimpleCorrection {
                new_code: Some("GE01".into()),
                new_npi: None,
            })
        );
        assert_eq!(derive_instruction(&fields("looks fine", " ", "nan")), None);
    }

    #[test]
    fn awaiting_never_overwrites_but_is_overwritten() {
        let mut set = CorrectionSet::default();
        set.merge("S1", Instruction::Awaiting);
        let simple = Instruction::SimpleCorrection {
            new_code: Some("GE01".into()),
            new_npi: None,
        };
        set.merge("S1", simple.clone());
        assert_eq!(set.get("S1"), Some(&simple));
        set.merge("S1", Instruction::Awaiting);
        assert_eq!(set.get("S1"), Some(&simple));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn later_files_overwrite_earlier_ones() {
        let mut first = CorrectionSet::default();
        first.merge("S1", Instruction::Awaiting);
        first.merge("S2", Instruction::SimpleCorrection { new_code: Some("A".into()), new_npi: None });
        let mut second = CorrectionSet::default();
        second.merge("S2", Instruction::SimpleCorrection { new_code: Some("B".into()), new_npi: None });
        second.merge("S1", Instruction::SimpleCorrection { new_code: Some("C".into()), new_npi: None });

        let mut merged = CorrectionSet::default();
        merged.merge_all(first);
        merged.merge_all(second);
        let order: Vec<_> = merged.iter().map(|(t, _)| t).collect();
        assert_eq!(order, ["S1", "S2"]);
        assert_eq!(
            merged.get("S1"),
            Some(&Instruction::SimpleCorrection { new_code: Some("C".into()), new_npi: None })
        );
        assert_eq!(
            merged.get("S2"),
            Some(&Instruction::SimpleCorrection { new_code: Some("B".into()), new_npi: None })
        );
    }

    #[test]
    fn sheet_header_is_detected_below_preamble() {
        let sheet = grid(&[
            &["USAP corrections week 42", "", "", ""],
            &["", "", "", ""],
            &["SIN", "NPI", "CBCode", "Comments"],
            &["S1", "", "GE01", ""],
            &["", "1234567890", "", ""],
            &["S2", "", "Awaiting info", ""],
            &["S3", "", "", "Correct provider Jane Doe with cb code GE02)"],
        ]);
        let set = parse_sheet(&sheet);
        assert_eq!(set.len(), 3);
        assert!(matches!(set.get("S1"), Some(Instruction::SimpleCorrection { .. })));
        assert_eq!(set.get("S2"), Some(&Instruction::Awaiting));
        assert!(matches!(set.get("S3"), Some(Instruction::ChangeTicket { .. })));
    }

    #[test]
    fn header_may_use_name_column_instead_of_npi() {
        let sheet = grid(&[&["SIN", "Last - Title", "CBCode"], &["S9", "Doe", "GE09"]]);
        let set = parse_sheet(&sheet);
        assert_eq!(
            set.get("S9"),
            Some(&Instruction::SimpleCorrection { new_code: Some("GE09".into()), new_npi: None })
        );
    }

    #[test]
    fn sheet_without_header_is_skipped() {
        let sheet = grid(&[&["Ticket", "Provider"], &["S1", "GE01"]]);
        assert!(parse_sheet(&sheet).is_empty());
    }

    #[test]
    fn unreadable_workbook_contributes_nothing() {
        let set = load_corrections(&["/nonexistent/corrections.xlsx"]);
        assert!(set.is_empty());
    }
}
