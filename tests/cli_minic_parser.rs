//! End-to-end scenarios driven through the compiled `minic_parser` binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn source_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp source file");
    write!(file, "{contents}").expect("write temp source file");
    file
}

#[test]
fn accepts_well_formed_program_and_prints_ast() {
    let file = source_file("int func(){ int x; x = 1+2; return x; }");
    Command::cargo_bin("minic_parser")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Decl(x)"))
        .stdout(predicate::str::contains("Assign(x, Add(Const(1), Const(2)))"))
        .stdout(predicate::str::contains("Return(Var(x))"));
}

#[test]
fn rejects_undeclared_variable() {
    let file = source_file("int f(){ y = 1; }");
    Command::cargo_bin("minic_parser")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("UndeclaredVariable: y"));
}

#[test]
fn rejects_redeclaration() {
    let file = source_file("int f(){ int x; int x; }");
    Command::cargo_bin("minic_parser")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Redeclaration: x"));
}

#[test]
fn reports_missing_file_as_failure() {
    Command::cargo_bin("minic_parser")
        .unwrap()
        .arg("/nonexistent/path/to/source.c")
        .assert()
        .failure()
        .code(1);
}
