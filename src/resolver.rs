use crate::{
    common::normalize_identifier,
    dictionary::{DictionaryKind, DictionaryTable, ReferenceDictionaries},
    report::ProviderType,
};

/// Which dictionary column a lookup value is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKey {
    Npi,
    Code,
}

/// Canonical identity found in a reference dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub kind: DictionaryKind,
    pub npi: Option<String>,
    pub code: Option<String>,
    pub full_name: String,
}

/// Dictionaries consulted for a type hint, in lookup order.
pub fn candidate_kinds(hint: &ProviderType) -> &'static [DictionaryKind] {
    const BOTH: &[DictionaryKind] = &[DictionaryKind::Surgeons, DictionaryKind::Providers];
    const SURGEONS: &[DictionaryKind] = &[DictionaryKind::Surgeons];
    const PROVIDERS: &[DictionaryKind] = &[DictionaryKind::Providers];

    match hint {
        ProviderType::SurgeonOrProvider => BOTH,
        ProviderType::Surgeon => SURGEONS,
        ProviderType::Provider => PROVIDERS,
        ProviderType::Rcm | ProviderType::Coder => &[],
        ProviderType::Other(raw) if raw.contains("Surgeon") => SURGEONS,
        ProviderType::Other(raw) if raw.contains("Provider") => PROVIDERS,
        ProviderType::Other(_) => &[],
    }
}

/// Finds the first dictionary record whose NPI or code column equals `value`, ignoring case.
///
/// Returns `None` when no candidate dictionary is loaded or none holds a match.
pub fn find_provider(
    dictionaries: &ReferenceDictionaries,
    key: SearchKey,
    value: &str,
    hint: &ProviderType,
) -> Option<ProviderIdentity> {
    let value = normalize_identifier(value);
    if value.is_empty() {
        return None;
    }

    candidate_kinds(hint).iter().find_map(|&kind| {
        let table = dictionaries.get(kind)?;
        find_in_table(kind, table, key, &value)
    })
}

fn find_in_table(
    kind: DictionaryKind,
    table: &DictionaryTable,
    key: SearchKey,
    value: &str,
) -> Option<ProviderIdentity> {
    let layout = kind.layout()?;
    let search_column = match key {
        SearchKey::Npi => layout.npi_column,
        SearchKey::Code => layout.code_column,
    };
    let search_idx = table.column_index(search_column)?;
    let needle = value.to_lowercase();

    let row = (0..table.len()).find(|&row| {
        table
            .cell(row, search_idx)
            .is_some_and(|cell| cell.to_lowercase() == needle)
    })?;

    let column = |name: &str| {
        table
            .column_index(name)
            .and_then(|idx| table.cell(row, idx))
            .map(ToOwned::to_owned)
    };

    let full_name = layout
        .name_columns
        .iter()
        .filter_map(|name| column(*name))
        .collect::<Vec<_>>()
        .join(" ");

    Some(ProviderIdentity {
        kind,
        npi: column(layout.npi_column),
        code: column(layout.code_column),
        full_name: full_name.trim().to_string(),
    })
}
