use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, Sheets, open_workbook_auto};
use rust_xlsxwriter::Workbook as XlsxWorkbook;
use std::{fs, path::Path};

/// One worksheet as a grid of display strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetGrid {
    pub name: String,
    pub grid: Vec<Vec<String>>,
}

/// Reads every sheet of any calamine-readable workbook, cells flattened to trimmed strings.
pub fn read_workbook(path: &Path) -> Result<Vec<SheetGrid>> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .with_context(|| format!("Failed opening workbook {}", path.display()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());
    for name in sheet_names {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("Failed reading sheet '{}' of {}", name, path.display()))?;
        // calamine ranges start at the first used cell; pad so columns stay aligned with the sheet.
        let lead_cols = range.start().map(|(_, c)| c as usize).unwrap_or(0);
        let grid = range
            .rows()
            .map(|row| {
                std::iter::repeat_n(String::new(), lead_cols)
                    .chain(row.iter().map(cell_to_string))
                    .collect()
            })
            .collect();
        sheets.push(SheetGrid { name, grid });
    }
    Ok(sheets)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        // Identifiers typed as numbers come back as floats; keep them integral.
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => n.to_string(),
        Data::Int(n) => n.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

/// Writes every grid to its own worksheet, all cells as strings.
pub fn write_workbook(path: &Path, sheets: &[SheetGrid]) -> Result<()> {
    if sheets.is_empty() {
        bail!("No sheets to write to {}", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed creating output dir {}", parent.display()))?;
    }

    let mut workbook = XlsxWorkbook::new();
    for sheet in sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .with_context(|| format!("Failed creating sheet '{}'", sheet.name))?;
        for (r, row) in sheet.grid.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                worksheet
                    .write_string(r as u32, c as u16, value)
                    .with_context(|| format!("Failed writing cell ({r}, {c}) of '{}'", sheet.name))?;
            }
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("Failed saving workbook {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_cells_render_without_fraction() {
        assert_eq!(cell_to_string(&Data::Float(1234567890.0)), "1234567890");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::String("  GE01 ".into())), "GE01");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn written_workbook_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let sheets = vec![
            SheetGrid {
                name: "Daily".into(),
                grid: vec![
                    vec!["SIN".into(), "NPI".into()],
                    vec!["S1".into(), "1234567890".into()],
                ],
            },
            SheetGrid {
                name: "Weekend".into(),
                grid: vec![vec!["SIN".into()], vec!["S2".into()]],
            },
        ];
        write_workbook(&path, &sheets).unwrap();

        let read = read_workbook(&path).unwrap();
        assert_eq!(read, sheets);
    }

    #[test]
    fn missing_workbook_is_an_error() {
        assert!(read_workbook(Path::new("/nonexistent/report.xlsx")).is_err());
    }
}
