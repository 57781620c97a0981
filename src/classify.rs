use indicatif::ProgressBar;
use std::collections::BTreeMap;

use crate::{
    common::contains_ignore_case,
    corrections::{CorrectionSet, Instruction},
    dictionary::ReferenceDictionaries,
    learning::LearnedCodes,
    npi::{CachedRegistry, NpiRegistry, RegistryRecord},
    report::{Action, Annotation, ExceptionRow, ProviderType, ReportSheet, Source},
    resolver::{ProviderIdentity, SearchKey, find_provider},
};

const ADD_TO_GE: &str = "add to ge";

/// Read-only evidence shared by every row of a run.
#[derive(Clone, Copy)]
pub struct ReferenceData<'a> {
    pub dictionaries: &'a ReferenceDictionaries,
    pub corrections: &'a CorrectionSet,
    pub learned_codes: &'a LearnedCodes,
}

pub struct Classifier<'a, R> {
    reference: ReferenceData<'a>,
    registry: &'a mut CachedRegistry<R>,
}

impl<'a, R: NpiRegistry> Classifier<'a, R> {
    pub fn new(reference: ReferenceData<'a>, registry: &'a mut CachedRegistry<R>) -> Self {
        Self {
            reference,
            registry,
        }
    }

    /// Decides the bot columns for one row. Sources are tried in priority order:
    /// correction instruction, learned code, dictionary lookup by NPI.
    pub fn classify(&mut self, row: &ExceptionRow) -> Annotation {
        let reference = self.reference;
        let hint = row.type_hint();

        let instruction = row
            .ticket
            .as_deref()
            .and_then(|ticket| reference.corrections.get(ticket));
        if let Some(instruction) = instruction {
            return self.apply_instruction(instruction, row, &hint);
        }

        let Some(npi) = row.npi.as_deref() else {
            return Annotation::default();
        };

        if let Some(code) = reference.learned_codes.get(npi) {
            return Annotation {
                action: Action::CompleteInfo,
                suggestion: format!("Aplicar CBCode aprendido: {code}"),
                details: self.cross_reference(npi, &hint),
                source: Source::LearnedCorrection,
            };
        }

        match find_provider(reference.dictionaries, SearchKey::Npi, npi, &hint) {
            Some(found) => {
                let registry = self.registry.lookup(Some(npi));
                Annotation {
                    action: Action::CompleteInfo,
                    suggestion: format!("CBCode encontrado: {}", found.code.as_deref().unwrap_or("")),
                    details: details(Some(&found), registry.as_ref(), false),
                    source: Source::Dictionary,
                }
            }
            None => Annotation {
                source: Source::ApiValidation,
                ..Annotation::default()
            },
        }
    }

    fn apply_instruction(
        &mut self,
        instruction: &Instruction,
        row: &ExceptionRow,
        hint: &ProviderType,
    ) -> Annotation {
        let mut annotation = Annotation {
            source: Source::UsapCorrection,
            ..Annotation::default()
        };

        match instruction {
            Instruction::ChangeTicket {
                new_name,
                new_code,
                new_npi,
            } => {
                annotation.action = Action::ChangeTicket;
                let code = new_code.as_deref().unwrap_or("");
                if contains_ignore_case(code, ADD_TO_GE) {
                    annotation.suggestion = format!("Cambiar por: {}", new_name.to_uppercase());
                    annotation.details = format!(
                        "El nuevo proveedor (NPI: {}) necesita ser añadido (ADD TO GE).",
                        new_npi.as_deref().unwrap_or("N/A")
                    );
                    return annotation;
                }

                let found = find_provider(
                    self.reference.dictionaries,
                    SearchKey::Code,
                    code,
                    &ProviderType::SurgeonOrProvider,
                );
                let lookup_npi = match &found {
                    Some(found) => found.npi.as_deref(),
                    None => new_npi.as_deref(),
                };
                let registry = self.registry.lookup(lookup_npi);
                let name = found
                    .as_ref()
                    .map(|f| f.full_name.as_str())
                    .unwrap_or(new_name.as_str());
                annotation.suggestion = format!("Cambiar por: {}", name.to_uppercase());
                annotation.details = details(found.as_ref(), registry.as_ref(), true);
            }
            Instruction::SimpleCorrection { new_code, new_npi } => {
                let npi = new_npi.as_deref().or(row.npi.as_deref()).unwrap_or("");
                let code = new_code.as_deref().unwrap_or("");
                if contains_ignore_case(code, ADD_TO_GE) {
                    annotation.details = format!("Instrucción 'ADD TO GE' para NPI {npi}.");
                    return annotation;
                }

                annotation.action = Action::CompleteInfo;
                annotation.suggestion = format!("Agregar/Corregir NPI: {npi}, CBCode: {code}");
                annotation.details = self.cross_reference(npi, hint);
            }
            Instruction::Awaiting => {}
        }
        annotation
    }

    /// Dictionary and registry findings for an NPI, formatted for the details column.
    fn cross_reference(&mut self, npi: &str, hint: &ProviderType) -> String {
        let found = find_provider(self.reference.dictionaries, SearchKey::Npi, npi, hint);
        let registry = self.registry.lookup(Some(npi));
        details(found.as_ref(), registry.as_ref(), false)
    }

    /// Annotates and sorts every row of a sheet.
    pub fn annotate_sheet(&mut self, sheet: &mut ReportSheet, progress: Option<&ProgressBar>) {
        for row in &mut sheet.rows {
            row.annotation = self.classify(row);
            tracing::debug!(
                "ticket {}: {} ({})",
                row.ticket.as_deref().unwrap_or("-"),
                row.annotation.action,
                row.annotation.source
            );
            if let Some(progress) = progress {
                progress.inc(1);
            }
        }
        sheet.sort_rows();
    }
}

fn details(
    found: Option<&ProviderIdentity>,
    registry: Option<&RegistryRecord>,
    with_npi: bool,
) -> String {
    let mut lines = Vec::with_capacity(2);
    if let Some(found) = found {
        let code = found.code.as_deref().unwrap_or("");
        lines.push(if with_npi {
            format!(
                "Info Dicc: {} (NPI: {}, CB: {})",
                found.full_name,
                found.npi.as_deref().unwrap_or(""),
                code
            )
        } else {
            format!("Info Dicc: {} (CB: {})", found.full_name, code)
        });
    }
    if let Some(registry) = registry {
        lines.push(format!("Info API: {}", registry.full_name));
    }
    lines.join("\n")
}

/// Rows per action and per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub actions: BTreeMap<Action, usize>,
    pub sources: BTreeMap<Source, usize>,
}

impl Summary {
    pub fn add_sheet(&mut self, sheet: &ReportSheet) {
        for row in &sheet.rows {
            *self.actions.entry(row.annotation.action).or_default() += 1;
            *self.sources.entry(row.annotation.source).or_default() += 1;
        }
    }

    pub fn of_sheet(sheet: &ReportSheet) -> Self {
        let mut summary = Self::default();
        summary.add_sheet(sheet);
        summary
    }

    pub fn describe(&self) -> String {
        let actions = self
            .actions
            .iter()
            .map(|(action, n)| format!("{action}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        let sources = self
            .sources
            .iter()
            .map(|(source, n)| format!("{source}={n}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("actions: {actions}; sources: {sources}")
    }
}

/// Keeps only rows whose action is listed. An empty list keeps everything.
pub fn retain_actions(sheet: &mut ReportSheet, actions: &[Action]) {
    if actions.is_empty() {
        return;
    }
    sheet
        .rows
        .retain(|row| actions.contains(&row.annotation.action));
}
