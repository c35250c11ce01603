//! End-to-end rule compilation and evaluation.

use std::borrow::Cow;
use std::sync::Arc;

use zentinel_seclang::bodyprocessors::BodyProcessor;
use zentinel_seclang::engine::Phase;
use zentinel_seclang::operators::OperatorOptions;
use zentinel_seclang::variables::TransactionVariables;
use zentinel_seclang::{Error, Parser, Registry, Waf};

#[test]
fn test_secaction_deny_defaults_to_403() {
    let waf = Waf::from_string(r#"SecAction "id:1,deny,log,phase:1""#).unwrap();
    let mut tx = waf.new_transaction();
    tx.process_request_headers().unwrap();

    let interruption = tx.interruption().expect("interrupted");
    assert_eq!(interruption.status, 403);
    assert_eq!(interruption.rule_id, 1);
    assert_eq!(interruption.action, "deny");
    assert_eq!(interruption.phase, Some(Phase::RequestHeaders));
}

#[test]
fn test_chain_builds_one_top_level_rule() {
    let waf = Waf::from_string(
        r#"
        SecAction "id:1,deny,log,phase:1,chain"
        SecRule ARGS "@rx ." "chain"
        SecRule REQUEST_HEADERS ""
        "#,
    )
    .unwrap();
    assert_eq!(waf.rule_count(), 1);
    let head = &waf.rules().rules()[0];
    let child = head.chain.as_deref().expect("first link");
    assert!(child.chain.is_some());
    assert!(child.chain.as_deref().unwrap().chain.is_none());
}

#[test]
fn test_chained_deny_reports_head_id() {
    let waf = Waf::from_string(
        r#"
        SecRule REQUEST_METHOD "@streq POST" "id:300,phase:1,chain"
            SecRule ARGS:cmd "@contains rm -rf" "deny"
        "#,
    )
    .unwrap();

    let mut tx = waf.new_transaction();
    tx.process_uri("/run?cmd=rm%20-rf%20/", "POST", "HTTP/1.1");
    tx.process_request_headers().unwrap();
    let interruption = tx.interruption().expect("chain matched");
    assert_eq!(interruption.rule_id, 300);
    assert_eq!(interruption.status, 403);

    let mut tx = waf.new_transaction();
    tx.process_uri("/run?cmd=rm%20-rf%20/", "GET", "HTTP/1.1");
    tx.process_request_headers().unwrap();
    assert!(tx.interruption().is_none());
}

#[test]
fn test_capture_keeps_nine_slots() {
    let waf = Waf::from_string(
        r#"SecRule ARGS:x "@rx (a)(b)(c)(d)(e)(f)(g)(h)(i)(j)" "id:1,phase:1,capture,pass""#,
    )
    .unwrap();
    let mut tx = waf.new_transaction();
    tx.add_get_argument("x", "abcdefghij");
    tx.process_request_headers().unwrap();

    assert_eq!(tx.capture(0), Some("abcdefghij"));
    assert_eq!(tx.capture(1), Some("a"));
    assert_eq!(tx.capture(8), Some("h"));
    assert_eq!(tx.capture(9), None);
}

#[test]
fn test_binary_rx_matches_raw_bytes() {
    let registry = Registry::new();
    let op = registry
        .operators
        .get("rx", &OperatorOptions::new(r"\xFF\x00"))
        .unwrap();

    let waf = Waf::from_string("").unwrap();
    let mut tx = waf.new_transaction();
    assert!(op.evaluate_bytes(&mut tx, b"abc\xFF\x00def"));
    assert!(!op.evaluate_bytes(&mut tx, b"abcdef"));
}

#[test]
fn test_binary_rx_fires_on_request_body() {
    let waf = Waf::from_string(
        r#"
        SecRequestBodyAccess On
        SecRule REQUEST_BODY "@rx \xFF" "id:1,phase:2,deny"
        "#,
    )
    .unwrap();

    let mut tx = waf.new_transaction();
    tx.process_request_headers().unwrap();
    tx.write_request_body(b"ab\xFFcd").unwrap();
    tx.process_request_body().unwrap();
    assert_eq!(tx.interruption().map(|i| i.rule_id), Some(1));

    let mut tx = waf.new_transaction();
    tx.process_request_headers().unwrap();
    tx.write_request_body("ab\u{fffd}cd".as_bytes()).unwrap();
    tx.process_request_body().unwrap();
    assert!(tx.interruption().is_none());
}

#[test]
fn test_binary_rx_fires_on_decoded_arguments() {
    let waf = Waf::from_string(
        r#"
        SecRule ARGS:a "@rx \xFF" "id:1,phase:1,deny"
        SecRule ARGS:p "@rx ^\xFE$" "id:2,phase:1,deny,status:406,t:urlDecode"
        "#,
    )
    .unwrap();

    let mut tx = waf.new_transaction();
    tx.process_uri("/?a=%FF", "GET", "HTTP/1.1");
    tx.process_request_headers().unwrap();
    assert_eq!(tx.interruption().map(|i| i.rule_id), Some(1));
    assert_eq!(tx.matched_rules()[0].matched[0].bytes(), b"\xFF");

    let mut tx = waf.new_transaction();
    tx.add_get_argument("p", "%FE");
    tx.process_request_headers().unwrap();
    assert_eq!(tx.interruption().map(|i| i.status), Some(406));
}

#[test]
fn test_text_operators_see_lossy_body() {
    let waf = Waf::from_string(
        r#"
        SecRequestBodyAccess On
        SecRule REQUEST_BODY "@contains cd" "id:1,phase:2,deny,t:lowercase"
        "#,
    )
    .unwrap();
    let mut tx = waf.new_transaction();
    tx.write_request_body(b"AB\xFFCD").unwrap();
    tx.process_request_body().unwrap();
    assert!(tx.interruption().is_some());
}

#[test]
fn test_same_length_borrowed_transformation_result_is_used() {
    fn mask(_: &str) -> Cow<'_, str> {
        Cow::Borrowed("xyz")
    }

    let mut registry = Registry::new();
    registry.transformations.register("mask", mask);
    let mut parser = Parser::with_registry(Arc::new(registry));
    parser
        .parse_str(r#"SecRule ARGS:q "@streq xyz" "id:1,phase:1,deny,t:lowercase,t:mask""#)
        .unwrap();
    let waf = parser.build().unwrap();

    let mut tx = waf.new_transaction();
    tx.process_uri("/?q=ABC", "GET", "HTTP/1.1");
    tx.process_request_headers().unwrap();
    assert!(tx.interruption().is_some());
}

struct JsonMarker;

impl BodyProcessor for JsonMarker {
    fn process(&self, body: &[u8], variables: &mut TransactionVariables) -> zentinel_seclang::Result<()> {
        variables.add_post_argument("json", &String::from_utf8_lossy(body));
        Ok(())
    }

    fn content_types(&self) -> &[&str] {
        &["application/json"]
    }
}

#[test]
fn test_custom_body_processor_selected_by_content_type() {
    let mut registry = Registry::new();
    registry
        .body_processors
        .register("json", Arc::new(JsonMarker));
    let mut parser = Parser::with_registry(Arc::new(registry));
    parser
        .parse_str(
            r#"
            SecRequestBodyAccess On
            SecRule ARGS_POST:json "@contains admin" "id:1,phase:2,deny"
            "#,
        )
        .unwrap();
    let waf = parser.build().unwrap();

    let mut tx = waf.new_transaction();
    tx.add_request_header("Content-Type", "application/json; charset=utf-8");
    tx.process_request_headers().unwrap();
    tx.write_request_body(br#"{"user":"admin"}"#).unwrap();
    tx.process_request_body().unwrap();
    assert_eq!(tx.interruption().map(|i| i.rule_id), Some(1));
}

#[test]
fn test_logging_phase_runs_after_interruption() {
    let waf = Waf::from_string(
        r#"
        SecAction "id:1,phase:1,deny,status:418"
        SecAction "id:2,phase:2,setvar:tx.body=1"
        SecAction "id:3,phase:5,setvar:tx.logged=1"
        "#,
    )
    .unwrap();
    let mut tx = waf.new_transaction();
    tx.process_request_headers().unwrap();
    tx.process_request_body().unwrap();
    tx.process_logging().unwrap();

    assert_eq!(tx.interruption().map(|i| i.status), Some(418));
    let ids: Vec<u64> = tx.matched_rules().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 3]);

    tx.close();
    assert!(matches!(
        tx.process_response_headers(200, "HTTP/1.1"),
        Err(Error::TransactionClosed { .. })
    ));
}

#[test]
fn test_custom_registry_is_isolated() {
    let mut registry = Registry::new();
    registry
        .transformations
        .register("rot13", |s: &str| {
            Cow::Owned(
                s.chars()
                    .map(|c| match c {
                        'a'..='m' => (c as u8 + 13) as char,
                        'n'..='z' => (c as u8 - 13) as char,
                        _ => c,
                    })
                    .collect(),
            )
        });

    let rules = r#"SecRule ARGS:q "@streq attack" "id:1,phase:1,t:rot13,deny""#;
    let mut parser = Parser::with_registry(Arc::new(registry));
    parser.parse_str(rules).unwrap();
    let waf = parser.build().unwrap();

    let mut tx = waf.new_transaction();
    tx.add_get_argument("q", "nggnpx");
    tx.process_request_headers().unwrap();
    assert!(tx.interruption().is_some());

    assert!(matches!(
        Waf::from_string(rules).unwrap_err().root_cause(),
        Error::UnknownTransformation { .. }
    ));
}

#[test]
fn test_audit_log_json() {
    let waf = Waf::from_string(
        r#"
        SecAuditEngine RelevantOnly
        SecComponentSignature "shop rules/1.0"
        SecRule REQUEST_HEADERS:User-Agent "@contains nikto" "id:50,phase:1,deny,msg:'scanner %{matched_var}',tag:scanner"
        "#,
    )
    .unwrap();
    let mut tx = waf.new_transaction_with_id("tx-1");
    tx.process_connection("192.0.2.10", 40000, "192.0.2.1", 443);
    tx.process_uri("/", "GET", "HTTP/1.1");
    tx.add_request_header("User-Agent", "nikto/2.5");
    tx.process_request_headers().unwrap();
    tx.process_logging().unwrap();

    let json = serde_json::to_value(tx.audit_log()).unwrap();
    assert_eq!(json["transaction_id"], "tx-1");
    assert_eq!(json["client_ip"], "192.0.2.10");
    assert_eq!(json["producer"]["components"][0], "shop rules/1.0");
    assert_eq!(json["messages"][0]["id"], 50);
    assert_eq!(json["messages"][0]["message"], "scanner nikto/2.5");
    assert_eq!(json["interruption"]["status"], 403);
}
