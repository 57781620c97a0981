use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{fmt, fs, path::Path};

use crate::{
    common::clean_cell,
    constants::{CODER_EXPORT_MARKER, DICTIONARY_DELIMITER},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryKind {
    Providers,
    Surgeons,
    Coders,
}

impl DictionaryKind {
    /// Picks the dictionary kind from an export file name; unrelated files yield `None`.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        if file_name.contains("Providers") {
            Some(Self::Providers)
        } else if file_name.contains("Surgeons") {
            Some(Self::Surgeons)
        } else if file_name.contains("Coder") || file_name.contains(CODER_EXPORT_MARKER) {
            Some(Self::Coders)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Providers => "providers",
            Self::Surgeons => "surgeons",
            Self::Coders => "coders",
        }
    }

    /// Column layout used for identity lookups. Coders have none.
    pub fn layout(self) -> Option<&'static TableLayout> {
        match self {
            Self::Surgeons => Some(&SURGEONS_LAYOUT),
            Self::Providers => Some(&PROVIDERS_LAYOUT),
            Self::Coders => None,
        }
    }
}

impl fmt::Display for DictionaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct TableLayout {
    pub npi_column: &'static str,
    pub code_column: &'static str,
    /// Last, first, middle.
    pub name_columns: [&'static str; 3],
}

static SURGEONS_LAYOUT: TableLayout = TableLayout {
    npi_column: "NPI_NUMBER",
    code_column: "NUMBER",
    name_columns: ["Lastname", "Firstname", "MiddleName"],
};

static PROVIDERS_LAYOUT: TableLayout = TableLayout {
    npi_column: "NPI_NUMBER",
    code_column: "ProvMnemonic",
    name_columns: ["LastName", "FirstName", "MiddleName"],
};

/// One loaded reference export: header names plus trimmed, string-typed cells.
#[derive(Debug, Clone, Default)]
pub struct DictionaryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl DictionaryTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column)?.as_deref()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parses a delimited export. Non-UTF-8 content is decoded as Windows-1252.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => std::borrow::Cow::Borrowed(text),
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0,
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(DICTIONARY_DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .context("Failed reading dictionary header row")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("Failed reading dictionary row {}", idx + 2))?;
            rows.push(record.iter().map(clean_cell).collect());
        }
        Ok(Self::new(headers, rows))
    }
}

/// The reference dictionaries loaded for one run, at most one table per kind.
#[derive(Debug, Clone, Default)]
pub struct ReferenceDictionaries {
    providers: Option<DictionaryTable>,
    surgeons: Option<DictionaryTable>,
    coders: Option<DictionaryTable>,
}

impl ReferenceDictionaries {
    /// Installs a table, returning the one it replaced (last loaded wins).
    pub fn insert(&mut self, kind: DictionaryKind, table: DictionaryTable) -> Option<DictionaryTable> {
        self.slot_mut(kind).replace(table)
    }

    pub fn get(&self, kind: DictionaryKind) -> Option<&DictionaryTable> {
        match kind {
            DictionaryKind::Providers => self.providers.as_ref(),
            DictionaryKind::Surgeons => self.surgeons.as_ref(),
            DictionaryKind::Coders => self.coders.as_ref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_none() && self.surgeons.is_none() && self.coders.is_none()
    }

    fn slot_mut(&mut self, kind: DictionaryKind) -> &mut Option<DictionaryTable> {
        match kind {
            DictionaryKind::Providers => &mut self.providers,
            DictionaryKind::Surgeons => &mut self.surgeons,
            DictionaryKind::Coders => &mut self.coders,
        }
    }
}

/// Loads every dictionary whose file name maps to a kind.
///
/// A file that fails to parse is skipped with a warning; the rest still load.
pub fn load_dictionaries(paths: &[impl AsRef<Path>]) -> ReferenceDictionaries {
    let mut dictionaries = ReferenceDictionaries::default();

    for path in paths {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|x| x.to_str())
            .unwrap_or_default();
        let Some(kind) = DictionaryKind::from_file_name(file_name) else {
            tracing::info!("Ignoring '{file_name}': not a recognised dictionary export");
            continue;
        };

        match load_table(path) {
            Ok(table) => {
                tracing::info!(
                    "Loaded '{}' as {} ({} rows)",
                    file_name,
                    kind,
                    table.len()
                );
                if dictionaries.insert(kind, table).is_some() {
                    tracing::warn!("'{file_name}' replaces the previously loaded {kind} dictionary");
                }
            }
            Err(err) => tracing::warn!("Error loading '{file_name}': {err:#}"),
        }
    }

    dictionaries
}

fn load_table(path: &Path) -> Result<DictionaryTable> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed reading dictionary {}", path.display()))?;
    DictionaryTable::from_bytes(&bytes)
        .with_context(|| format!("Failed parsing dictionary {}", path.display()))
}
