use std::{collections::HashMap, fs, path::Path};

use cb_failed_assistant::{
    classify::{Classifier, ReferenceData, Summary},
    corrections::{Instruction, load_corrections},
    dictionary::{DictionaryKind, load_dictionaries},
    learning::{learn_codes, ticket_npis},
    npi::{CachedRegistry, OfflineRegistry},
    report::{Action, ReportSheet, Source},
    workbook::{SheetGrid, read_workbook, write_workbook},
};

fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect()
}

fn write_sheets(path: &Path, sheets: &[(&str, &[&[&str]])]) {
    let sheets: Vec<SheetGrid> = sheets
        .iter()
        .map(|(name, rows)| SheetGrid {
            name: name.to_string(),
            grid: grid(rows),
        })
        .collect();
    write_workbook(path, &sheets).unwrap();
}

struct Fixture {
    _dir: tempfile::TempDir,
    dictionaries: Vec<std::path::PathBuf>,
    corrections: Vec<std::path::PathBuf>,
    report: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();

    let surgeons = dir.path().join("GE_Surgeons.txt");
    fs::write(
        &surgeons,
        "NPI_NUMBER|NUMBER|Lastname|Firstname|MiddleName\n1111111111|SURG1|Cutter|Sam|\n",
    )
    .unwrap();
    let providers = dir.path().join("GE_Providers.txt");
    fs::write(
        &providers,
        "NPI_NUMBER|ProvMnemonic|LastName|FirstName|MiddleName\n3333333333|GE01|Doe|Jane|Q\n",
    )
    .unwrap();
    let ignored = dir.path().join("readme.txt");
    fs::write(&ignored, "not a dictionary").unwrap();

    let first_corrections = dir.path().join("usap_week1.xlsx");
    write_sheets(
        &first_corrections,
        &[
            (
                "Week 1",
                &[
                    &["USAP feedback", "", "", ""],
                    &["SIN", "NPI", "CBCode", "Comments"],
                    &["T1", "", "GE50", ""],
                    &["T2", "", "Awaiting NPI", ""],
                    &["T3", "", "", "Correct provider Jane Doe with cb code GE01)"],
                ],
            ),
            ("Notes", &[&["nothing to see here"]]),
        ],
    );
    let second_corrections = dir.path().join("usap_week2.xlsx");
    write_sheets(
        &second_corrections,
        &[(
            "Week 2",
            &[
                &["SIN", "NPI", "CBCode", "Comments"],
                &["T2", "", "GE60", ""],
                &["T1", "", "", "pending with client"],
            ],
        )],
    );
    let broken = dir.path().join("broken.xlsx");
    fs::write(&broken, b"not a workbook").unwrap();

    let report = dir.path().join("CB Failed.xlsx");
    write_sheets(
        &report,
        &[
            (
                "Daily",
                &[
                    &["SIN", "Facility", "Date", "Amount", "Last - Title", "NPI", "Type"],
                    &["T1", "F1", "2026-10-18", "10", "Zulu", "7777777777", "Provider"],
                    &["T9", "F1", "2026-10-18", "10", "Alpha", "7777777777", "Coder"],
                    &["T2", "F1", "2026-10-18", "10", "Mike", "8888888888", "Surgeon"],
                    &["T3", "F2", "2026-10-18", "10", "Bravo", "", "Surgeon"],
                    &["T4", "F2", "2026-10-18", "10", "Echo", "1111111111", "Surgeon or Provider"],
                    &["T5", "F2", "2026-10-18", "10", "", "9999999999", "Provider"],
                    &["T6", "F2", "2026-10-18", "10", "Kilo", "", "RCM"],
                ],
            ),
            ("Empty", &[&["SIN", "NPI", "Type"]]),
        ],
    );

    Fixture {
        dictionaries: vec![surgeons, providers, ignored],
        corrections: vec![first_corrections, broken, second_corrections],
        report,
        _dir: dir,
    }
}

#[test]
fn full_run_annotates_and_orders_rows() {
    let fx = fixture();

    let dictionaries = load_dictionaries(&fx.dictionaries);
    assert!(dictionaries.get(DictionaryKind::Surgeons).is_some());
    assert!(dictionaries.get(DictionaryKind::Providers).is_some());
    assert!(dictionaries.get(DictionaryKind::Coders).is_none());

    let corrections = load_corrections(&fx.corrections);
    assert_eq!(corrections.len(), 3);
    // week 2's "pending" does not replace week 1's code for T1
    assert!(matches!(
        corrections.get("T1"),
        Some(Instruction::SimpleCorrection { .. })
    ));
    // week 2's code replaces week 1's "Awaiting" for T2
    assert_eq!(
        corrections.get("T2"),
        Some(&Instruction::SimpleCorrection {
            new_code: Some("GE60".into()),
            new_npi: None,
        })
    );

    let report_sheets = read_workbook(&fx.report).unwrap();
    let learned = learn_codes(&corrections, &ticket_npis(&report_sheets).unwrap());
    assert_eq!(learned.get("7777777777").map(String::as_str), Some("GE50"));
    assert_eq!(learned.get("8888888888").map(String::as_str), Some("GE60"));

    let mut registry = CachedRegistry::new(OfflineRegistry);
    let mut classifier = Classifier::new(
        ReferenceData {
            dictionaries: &dictionaries,
            corrections: &corrections,
            learned_codes: &learned,
        },
        &mut registry,
    );

    let mut processed = Vec::new();
    for SheetGrid { name, grid } in report_sheets {
        if let Some(mut sheet) = ReportSheet::from_grid(&name, grid) {
            classifier.annotate_sheet(&mut sheet, None);
            processed.push(sheet);
        }
    }
    assert_eq!(processed.len(), 1, "empty sheet is skipped");
    let sheet = &processed[0];

    let by_ticket: HashMap<&str, _> = sheet
        .rows
        .iter()
        .map(|r| (r.ticket.as_deref().unwrap(), &r.annotation))
        .collect();

    assert_eq!(by_ticket["T1"].action, Action::CompleteInfo);
    assert_eq!(by_ticket["T1"].source, Source::UsapCorrection);
    assert_eq!(by_ticket["T9"].source, Source::LearnedCorrection);
    assert_eq!(by_ticket["T9"].suggestion, "Aplicar CBCode aprendido: GE50");
    assert_eq!(by_ticket["T3"].action, Action::ChangeTicket);
    assert_eq!(by_ticket["T3"].suggestion, "Cambiar por: DOE JANE Q");
    assert_eq!(by_ticket["T4"].source, Source::Dictionary);
    assert_eq!(by_ticket["T4"].suggestion, "CBCode encontrado: SURG1");
    assert_eq!(by_ticket["T5"].source, Source::ApiValidation);
    assert_eq!(by_ticket["T5"].action, Action::AwaitingUsap);
    assert_eq!(by_ticket["T6"].source, Source::BotAnalysis);
    assert_eq!(by_ticket["T6"].action, Action::AwaitingUsap);

    let order: Vec<_> = sheet
        .rows
        .iter()
        .map(|r| r.ticket.clone().unwrap())
        .collect();
    assert_eq!(order, ["T4", "T3", "T2", "T5", "T1", "T6", "T9"]);

    let summary = Summary::of_sheet(sheet);
    assert_eq!(summary.actions.values().sum::<usize>(), 7);
}

#[test]
fn processed_workbook_keeps_columns_and_adds_bot_columns() {
    let fx = fixture();
    let dictionaries = load_dictionaries(&fx.dictionaries);
    let corrections = load_corrections(&fx.corrections);
    let report_sheets = read_workbook(&fx.report).unwrap();
    let learned = learn_codes(&corrections, &ticket_npis(&report_sheets).unwrap());

    let mut registry = CachedRegistry::new(OfflineRegistry);
    let mut classifier = Classifier::new(
        ReferenceData {
            dictionaries: &dictionaries,
            corrections: &corrections,
            learned_codes: &learned,
        },
        &mut registry,
    );
    let mut output = Vec::new();
    for SheetGrid { name, grid } in report_sheets {
        if let Some(mut sheet) = ReportSheet::from_grid(&name, grid) {
            classifier.annotate_sheet(&mut sheet, None);
            output.push(SheetGrid {
                grid: sheet.to_grid(),
                name,
            });
        }
    }

    let out_dir = tempfile::tempdir().unwrap();
    let out_path = out_dir.path().join("PROCESADO_test.xlsx");
    write_workbook(&out_path, &output).unwrap();

    let written = read_workbook(&out_path).unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].name, "Daily");
    assert_eq!(
        written[0].grid[0],
        [
            "SIN",
            "Facility",
            "Date",
            "Amount",
            "Last - Title",
            "Bot_Accion",
            "Sugerencias_Bot",
            "Bot_Detalles",
            "Source",
            "NPI",
            "Type"
        ]
    );
    assert_eq!(written[0].grid.len(), 8);
    assert_eq!(written[0].grid[1][0], "T4");
    assert_eq!(written[0].grid[1][5], "COMPLETAR INFO");
    assert_eq!(written[0].grid[1][8], "Dictionary");
    assert_eq!(written[0].grid[1][9], "1111111111");
}

#[test]
fn report_without_npi_column_learns_nothing() {
    let sheets = vec![SheetGrid {
        name: "Daily".into(),
        grid: grid(&[&["SIN", "Type"], &["T1", "Surgeon"]]),
    }];
    assert!(ticket_npis(&sheets).is_none());
}
