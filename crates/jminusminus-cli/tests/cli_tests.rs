use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const HELLO: &str = r#"
public class Hello {
    public static void main(String[] args) {
        int sum = 0;
        for (int i = 1; i <= 4; i++) sum += i;
        System.out.println("sum = " + sum);
    }
}
"#;

fn write_source(dir: &TempDir, name: &str, source: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

fn jmm() -> Command {
    let mut cmd = Command::cargo_bin("jmm").unwrap();
    cmd.env_remove("RUST_LOG").arg("--no-color");
    cmd
}

#[test]
fn test_run_prints_program_output() {
    let dir = TempDir::new().unwrap();
    let path = write_source(&dir, "Hello.java", HELLO);
    jmm()
        .arg("run")
        .arg(&path)
        .assert()
        .success()
        .stdout("sum = 10\n");
}

#[test]
fn test_tokens_lists_images() {
    let dir = TempDir::new().unwrap();
    let path = write_source(&dir, "T.java", "int x = 017;\n");
    jmm()
        .arg("tokens")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("x"))
        .stdout(predicate::str::contains("017"));
}

#[test]
fn test_ast_dump_names_class() {
    let dir = TempDir::new().unwrap();
    let path = write_source(&dir, "Hello.java", HELLO);
    jmm()
        .arg("ast")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello"));
}

#[test]
fn test_build_prints_listing() {
    let dir = TempDir::new().unwrap();
    let path = write_source(&dir, "Hello.java", HELLO);
    jmm()
        .arg("build")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("class Hello"))
        .stdout(predicate::str::contains("method main([Ljava/lang/String;)V"));
}

#[test]
fn test_build_reports_errors_with_location() {
    let dir = TempDir::new().unwrap();
    let source = "public class Bad {\n    void f() {\n        int x = true;\n    }\n}\n";
    let path = write_source(&dir, "Bad.java", source);
    jmm()
        .arg("build")
        .arg(&path)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Bad.java:3:"));
}

#[test]
fn test_build_json_diagnostics() {
    let dir = TempDir::new().unwrap();
    let source = "public class Bad {\n    void f() { undefined = 1; }\n}\n";
    let path = write_source(&dir, "Bad.java", source);
    let output = jmm().arg("build").arg("--json").arg(&path).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = value.as_array().unwrap();
    assert!(!entries.is_empty());
    assert_eq!(entries[0]["line"], 2);
}

#[test]
fn test_config_file_enables_warnings_as_errors() {
    let dir = TempDir::new().unwrap();
    let source = "public class W { ; public static void main(String[] args) { } }\n";
    let path = write_source(&dir, "W.java", source);
    let config = write_source(&dir, "jmm.toml", "warnings_as_errors = true\n");

    jmm().arg("build").arg(&path).assert().success();
    jmm()
        .arg("--config")
        .arg(&config)
        .arg("build")
        .arg(&path)
        .assert()
        .code(1);
}

#[test]
fn test_run_reports_uncaught_exception() {
    let dir = TempDir::new().unwrap();
    let source = r#"
public class Boom {
    public static void main(String[] args) throws IllegalStateException {
        System.out.println("start");
        throw new IllegalStateException("broken");
    }
}
"#;
    let path = write_source(&dir, "Boom.java", source);
    jmm()
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stdout("start\n")
        .stderr(predicate::str::contains("java.lang.IllegalStateException: broken"));
}

#[test]
fn test_missing_file_fails() {
    jmm()
        .arg("build")
        .arg("does/not/exist.java")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("exist.java"));
}
