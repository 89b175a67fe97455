use std::{fs, path::Path};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use tyco::{load, ErrorKind, ParserOptions, TycoParser};

fn write(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn nested_includes_resolve_relative_to_the_including_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tyco", "#include \"conf/base.tyco\"\nUser(\"u1\"): { name: \"Ada\" }\n");
    write(dir.path(), "conf/base.tyco", "#include \"shared/env.tyco\"\nstruct User { *id: str, name: str, env: str = \"{env}\" }\n");
    write(dir.path(), "conf/shared/env.tyco", "env: \"prod\"\n");

    let doc = load(dir.path().join("main.tyco")).unwrap();
    assert_eq!(
        doc.as_json(),
        json!({"env": "prod", "User": [{"id": "u1", "name": "Ada", "env": "prod"}]})
    );
}

#[test]
fn trailing_comments_after_include_paths() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tyco", "#include \"shared.tyco\" # common settings\nb: 2\n");
    write(dir.path(), "shared.tyco", "a: 1\n");

    let doc = load(dir.path().join("main.tyco")).unwrap();
    assert_eq!(doc.as_json(), json!({"a": 1, "b": 2}));
}

#[test]
fn each_file_is_included_once() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.tyco", "#include \"b.tyco\"\na: 1\n");
    write(dir.path(), "b.tyco", "#include \"a.tyco\"\nb: 2\n");

    let doc = load(dir.path().join("a.tyco")).unwrap();
    assert_eq!(doc.as_json(), json!({"b": 2, "a": 1}));
}

#[test]
fn includes_can_be_switched_off() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tyco", "#include \"other.tyco\"\n");
    write(dir.path(), "other.tyco", "x: 1\n");

    let options: ParserOptions = serde_json::from_str(r#"{"allow_includes": false}"#).unwrap();
    let err = TycoParser::with_options(options)
        .parse_file(dir.path().join("main.tyco"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
}

#[test]
fn missing_include_reports_the_directive() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tyco", "a: 1\n#include \"absent.tyco\"\n");

    let err = load(dir.path().join("main.tyco")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(err.span().map(|span| span.line), Some(2));
}

#[test]
fn errors_in_included_files_name_that_file() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.tyco", "#include \"broken.tyco\"\n");
    write(dir.path(), "broken.tyco", "ok: 1\nbad: \"unterminated\n");

    let err = load(dir.path().join("main.tyco")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    let span = err.span().unwrap();
    assert_eq!(span.line, 2);
    assert!(
        span.path
            .as_ref()
            .is_some_and(|path| path.ends_with("broken.tyco")),
        "{span:?}"
    );
}

#[test]
fn missing_root_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load(dir.path().join("nope.tyco")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}
