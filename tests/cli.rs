use predicates::prelude::*;
use std::{fs, path::Path, process::Command};
use tempfile::TempDir;

fn cmd() -> assert_cmd::Command {
    assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_stencil")))
}

fn write(root: &Path, path: &str, text: &str) {
    let path = root.join(path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }

    fs::write(path, text).unwrap();
}

#[test]
fn cli_writes_units_with_discovered_imports() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "_imports.stencil", "@namespace app\n");
    write(dir.path(), "views/Index.stencil", "<p>@x</p>");

    cmd()
        .current_dir(dir.path())
        .args(["--root", ".", "-o", "out", "views/Index.stencil"])
        .assert()
        .success();

    let unit = fs::read_to_string(dir.path().join("out/app.Index.g.rs")).unwrap();
    assert!(unit.contains("// Compiled by stencil from `views/Index.stencil`. Do not edit."));
    assert!(unit.contains("pub mod app {"));
}

#[test]
fn cli_stdout_and_root_namespace() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "pages/About.stencil", "about");

    cmd()
        .current_dir(dir.path())
        .args(["-r", ".", "-n", "site", "-a", "public", "-o", "-", "pages/About.stencil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pub mod site {\n    pub mod pages {\n"))
        .stdout(predicate::str::contains("pub struct About {"));
}

#[test]
fn cli_reports_diagnostics_and_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "Bad.stencil", "@model Foo\n<p>hi</p>");

    cmd()
        .current_dir(dir.path())
        .args(["-o", "out", "Bad.stencil"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[STC1001]"))
        .stderr(predicate::str::contains("Compilation failed with 1 error"));

    // La unidad se escribe de todas formas
    assert!(dir.path().join("out/templates.Bad.g.rs").is_file());
}

#[test]
fn cli_edition_floor() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "A.stencil", "a");

    cmd()
        .current_dir(dir.path())
        .args(["--edition", "2015", "-o", "out", "A.stencil"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[STC0001]"));

    assert!(!dir.path().join("out/templates.A.g.rs").exists());
}

#[test]
fn cli_missing_template() {
    let dir = TempDir::new().unwrap();

    cmd()
        .current_dir(dir.path())
        .args(["-o", "out", "Missing.stencil"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read template"));
}

#[test]
fn cli_base_units_enable_forwarding() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "bases.rs",
        "pub struct Panel<M> { m: M }\nimpl<M> Panel<M> {\n    #[template_constructor]\n    pub fn open(model: M) -> Self { unimplemented!() }\n}\n",
    );
    write(dir.path(), "Side.stencil", "@inherits Panel<bool>\n");

    cmd()
        .current_dir(dir.path())
        .args(["--no-embedded-runtime", "-b", "bases.rs", "-o", "-", "Side.stencil"])
        .assert()
        .success()
        .stdout(predicate::str::contains("// forwarded template constructors"))
        .stdout(predicate::str::contains("pub(crate) fn open(model: bool) -> Self {"));
}
