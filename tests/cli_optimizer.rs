//! End-to-end scenarios driven through the compiled `optimizer` binary over
//! hand-written textual IR.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn ir_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp IR file");
    write!(file, "{contents}").expect("write temp IR file");
    file
}

#[test]
fn folds_constant_add_and_erases_the_instruction() {
    let file = ir_file("@func {\nentry:\n  %v0 = add 2, 3\n  ret %v0\n}\n");
    Command::cargo_bin("optimizer")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ret 5"))
        .stdout(predicate::str::contains("%v0").not());
}

#[test]
fn cse_redirects_redundant_commutative_add() {
    let file = ir_file(
        "@func {\nentry:\n  %v0 = add @x, @y\n  %v1 = add @y, @x\n  %v2 = add %v0, %v1\n  ret %v2\n}\n",
    );
    Command::cargo_bin("optimizer")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("%v1").not());
}

#[test]
fn propagates_store_across_blocks_into_folded_add() {
    let file = ir_file(
        "@func {\nentry:\n  %v0 = alloca\n  store 7, %v0\n  br bb1\nbb1:\n  %v1 = load %v0\n  %v2 = add %v1, 1\n  ret %v2\n}\n",
    );
    Command::cargo_bin("optimizer")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ret 8"));
}

#[test]
fn unparsable_module_fails_with_exit_one() {
    let file = ir_file("this is not valid IR text");
    Command::cargo_bin("optimizer")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("IRLoadFailure"));
}
