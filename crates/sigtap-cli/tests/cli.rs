//! End-to-end tests for the sigtap binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn layout_file(dir: &tempfile::TempDir, name: &str) -> std::path::PathBuf {
    let lines = [
        "03.01.01.004-8 Procedimento: Consulta de profissionais de nível superior",
        "Complexidade: Atenção Básica",
        "Tipo de Financiamento: 01 - Atenção Básica (PAB)",
        "Origem: H.32013035",
        "Modalidade: 01 - Ambulatorial",
        "Instrumento de Registro: 01 - BPA (Consolidado)",
        "Especialidade do Leito: Cirúrgico",
        "Valor Ambulatorial S.A.: 6,30",
        "Valor Ambulatorial Total: 6,30",
        "Valor Hospitalar S.H.: 120,50",
        "Valor Hospitalar S.P.: 78,90",
        "Valor Hospitalar Total: 199,40",
        "Quantidade Máxima: 2",
        "Média Permanência: 1,0",
        "Pontos: 10",
        "CBO: 2231-05",
        "CID: A15.0",
    ];
    let fragments: Vec<serde_json::Value> = lines
        .iter()
        .enumerate()
        .map(|(i, text)| {
            serde_json::json!({
                "text": text,
                "x": 50.0,
                "y": 800.0 - (i as f32) * 20.0,
            })
        })
        .collect();
    let document = serde_json::json!([{ "page_number": 1, "fragments": fragments }]);

    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, "{}", document).unwrap();
    path
}

#[test]
fn process_emits_json_records() {
    let dir = tempfile::tempdir().unwrap();
    let input = layout_file(&dir, "page.json");

    Command::cargo_bin("sigtap")
        .unwrap()
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("03.01.01.004-8"))
        .stdout(predicate::str::contains("CONSULTA DE PROFISSIONAIS"));
}

#[test]
fn process_csv_has_header_row() {
    let dir = tempfile::tempdir().unwrap();
    let input = layout_file(&dir, "page.json");

    Command::cargo_bin("sigtap")
        .unwrap()
        .args(["process", "--format", "csv"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("code,description,complexity"))
        .stdout(predicate::str::contains("deterministic"));
}

#[test]
fn process_missing_input_fails() {
    Command::cargo_bin("sigtap")
        .unwrap()
        .args(["process", "no-such-file.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn batch_writes_summary_csv() {
    let dir = tempfile::tempdir().unwrap();
    layout_file(&dir, "doc1.json");
    layout_file(&dir, "doc2.json");
    let out = dir.path().join("out");

    Command::cargo_bin("sigtap")
        .unwrap()
        .arg("batch")
        .arg(format!("{}/doc*.json", dir.path().display()))
        .args(["--output-dir"])
        .arg(&out)
        .arg("--summary")
        .assert()
        .success();

    let summary = std::fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.contains("doc1.json"));
    assert!(summary.contains("success"));
}
