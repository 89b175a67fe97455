use pretty_assertions::assert_eq;
use serde_json::json;
use tyco::{loads, Document, ErrorKind, ParserOptions, SourceSpan, TycoParser, Value};

fn error_kind(source: &str) -> ErrorKind {
    match loads(source) {
        Ok(doc) => panic!("expected an error, got {}", doc.to_json_string()),
        Err(err) => err.kind(),
    }
}

#[test]
fn references_inline_the_target_instance() {
    let doc = loads(
        r#"
        struct Person { *id: str, name: str }
        struct Team { *name: str, owner: Person }
        Team("core"): { owner: Person("p1") }
        Person("p1"): { name: "Ada" }
        "#,
    )
    .unwrap();
    let json = doc.as_json();
    assert_eq!(json["Team"][0]["owner"], json!({"id": "p1", "name": "Ada"}));
    assert_eq!(json["Person"], json!([{"id": "p1", "name": "Ada"}]));

    let owner = doc.instances("Team")[0]
        .get_attribute("owner")
        .and_then(Value::as_reference)
        .unwrap();
    let target = doc.dereference(owner).unwrap();
    assert_eq!(target.get_attribute("name").and_then(Value::as_str), Some("Ada"));
    assert_eq!(doc.find("Person", "p1"), Some(target));
}

#[test]
fn greeting_expands_from_globals() {
    let doc = loads("name: \"World\"\ngreeting: \"Hello, {name}\"").unwrap();
    assert_eq!(doc.as_json(), json!({"name": "World", "greeting": "Hello, World"}));
}

#[test]
fn radix_integers() {
    let doc = loads("a: 0x1A\nb: 0o12\nc: 0b101").unwrap();
    assert_eq!(doc.as_json(), json!({"a": 26, "b": 10, "c": 5}));
    assert_eq!(doc.global("a").and_then(Value::as_i64), Some(26));
}

#[test]
fn keyed_structs_aggregate_in_declaration_order() {
    let doc = loads(
        r#"
        struct Point { x: int, y: int }
        struct Shape { *id: int, origin: Point, label: str = "shape {id}" }
        Shape(3): { origin: Point(0, 0) }
        Shape(1): { origin: { x: 1, y: 2 }, label: "plain text" }
        Shape(2): { origin: Point { x: 5, y: 5 } }
        "#,
    )
    .unwrap();
    let json = doc.as_json();
    let object = json.as_object().unwrap();
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["Shape"]);
    let ids: Vec<_> = json["Shape"]
        .as_array()
        .unwrap()
        .iter()
        .map(|shape| shape["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![3, 1, 2]);
    assert_eq!(json["Shape"][0]["label"], json!("shape 3"));
    assert_eq!(json["Shape"][1]["label"], json!("plain text"));
    assert_eq!(json["Shape"][1]["origin"], json!({"x": 1, "y": 2}));
    assert!(doc.struct_def("Point").is_some_and(|def| !def.has_primary_key()));
}

#[test]
fn output_is_deterministic() {
    let source = r#"
        struct Node { *id: str, ?next: Node, tags: str[] = [] }
        Node("a"): { next: Node("b"), tags: ["x", "y"] }
        Node("b"): { next: Node("a") }
        start: Node("a")
    "#;
    let first = loads(source).unwrap().to_json_string();
    let second = loads(source).unwrap().to_json_string();
    assert_eq!(first, second);
}

#[test]
fn instance_reference_cycles_serialize_keys() {
    let doc = loads(
        r#"
        struct Node { *id: str, ?next: Node }
        Node("a"): { next: Node("b") }
        Node("b"): { next: Node("a") }
        "#,
    )
    .unwrap();
    assert_eq!(
        doc.as_json()["Node"][0],
        json!({"id": "a", "next": {"id": "b", "next": "a"}})
    );
}

#[test]
fn missing_required_field() {
    assert_eq!(
        error_kind("struct P { *id: str, name: str }\nP(\"p1\"): {}"),
        ErrorKind::MissingRequiredField
    );
}

#[test]
fn unresolved_references() {
    assert_eq!(
        error_kind("struct P { *id: str }\nowner: P(\"nope\")"),
        ErrorKind::UnresolvedReference
    );
    assert_eq!(
        error_kind("struct P { *id: str }\nstruct Q { *id: str, p: P = P(\"ghost\") }"),
        ErrorKind::UnresolvedReference
    );
}

#[test]
fn duplicate_primary_keys() {
    assert_eq!(
        error_kind("struct P { *id: int }\nP(1): {}\nP(0x1): {}"),
        ErrorKind::DuplicatePrimaryKey
    );
}

#[test]
fn template_cycles_are_rejected() {
    assert_eq!(error_kind("a: \"{b}\"\nb: \"{a}\""), ErrorKind::TemplateCycle);
    assert_eq!(error_kind("s: \"x{s}\""), ErrorKind::TemplateCycle);
    assert_eq!(
        error_kind("struct C { *id: str, a: str = \"{b}\", b: str = \"{a}\" }\nC(\"c\"): {}"),
        ErrorKind::TemplateCycle
    );
}

#[test]
fn template_depth_is_bounded_by_options() {
    let source = "a: \"{b}\"\nb: \"{c}\"\nc: \"end\"";
    let doc = loads(source).unwrap();
    assert_eq!(doc.global("a").and_then(Value::as_str), Some("end"));

    let options = ParserOptions::default().with_max_template_depth(0);
    let err = TycoParser::with_options(options).parse_str(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TemplateCycle);
}

#[test]
fn undefined_template_variables() {
    assert_eq!(error_kind("msg: \"{missing}\""), ErrorKind::UndefinedTemplateVariable);
    assert_eq!(
        error_kind("struct P { *id: str, x: str = \"{id.nope}\" }\nP(\"p\"): {}"),
        ErrorKind::UndefinedTemplateVariable
    );
}

#[test]
fn strings_without_placeholders_are_untouched() {
    let doc = loads("a: \"{ spaced }\"\nb: \"{}\"\nc: 'x {a}'").unwrap();
    assert_eq!(doc.as_json(), json!({"a": "{ spaced }", "b": "{}", "c": "x {a}"}));
}

#[test]
fn type_errors() {
    assert_eq!(error_kind("int n: \"five\""), ErrorKind::Type);
    assert_eq!(error_kind("int n: 1.5"), ErrorKind::Type);
    assert_eq!(error_kind("date d: 2023-02-29"), ErrorKind::Type);
    assert_eq!(error_kind("time t: 24:00:00"), ErrorKind::Type);
    assert_eq!(error_kind("bool b: null"), ErrorKind::Type);
    assert_eq!(
        error_kind("struct P { *id: str }\nstruct Q { *id: str, p: P }\nQ(\"q\"): { p: Q(\"q\") }"),
        ErrorKind::Type
    );
}

#[test]
fn parse_errors() {
    assert_eq!(error_kind("struct A { *a: str, *b: str }"), ErrorKind::Parse);
    assert_eq!(error_kind("struct A { *a: str }\nA(\"x\"): { nope: 1 }"), ErrorKind::Parse);
    assert_eq!(error_kind("value: [1 2]"), ErrorKind::Parse);
    assert_eq!(error_kind("struct A { x: int }\nA: 1"), ErrorKind::Parse);
}

#[test]
fn lex_errors_carry_positions() {
    let err = loads("ok: 1\nbad: @").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    assert_eq!(err.span(), Some(&SourceSpan::new(2, 6)));

    let err = loads("x: 1e999\nfloat y: 1e400").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    assert_eq!(err.span(), Some(&SourceSpan::new(1, 4)));

    let err = loads("s: \"never closed").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lex);
    assert_eq!(err.span().map(|s| (s.line, s.column)), Some((1, 4)));
}

#[test]
fn nested_inferred_arrays() {
    assert_eq!(error_kind("x: [[1, 2], [\"a\"]]"), ErrorKind::Type);
    let doc = loads("x: [[1, 2], [2.5]]").unwrap();
    assert_eq!(doc.as_json(), json!({"x": [[1.0, 2.0], [2.5]]}));
}

#[test]
fn large_floats_keep_a_fraction_in_templates() {
    let doc = loads("big: 1e16\nmsg: \"{big}\"").unwrap();
    assert_eq!(doc.global("msg").and_then(Value::as_str), Some("10000000000000000.0"));
}

#[test]
fn documents_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Document>();
}
