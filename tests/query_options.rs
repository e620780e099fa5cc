//! Scalar query options and query string handling

mod common;

use common::{SERVICE_ROOT, parse_uri, parser, people_model};
use octofhir_odata_uri::parser::parse_count;
use octofhir_odata_uri::{ODataError, ODataUriParser, ParserSettings};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[rstest]
#[case(Some("true"), Some(true))]
#[case(Some("  true  "), Some(true))]
#[case(Some("false"), Some(false))]
#[case(None, None)]
fn count_values(#[case] input: Option<&str>, #[case] expected: Option<bool>) {
    assert_eq!(parse_count(input).expect("valid count"), expected);
}

#[rstest]
#[case("")]
#[case("True")]
#[case("yes")]
fn count_rejects(#[case] input: &str) {
    let error = parse_count(Some(input)).expect_err("invalid count");
    let ODataError::InvalidQueryOption { option, reason, .. } = error else {
        panic!("expected an invalid query option error");
    };
    assert_eq!(option, "$count");
    if input.is_empty() {
        assert!(reason.contains("empty"));
    }
}

#[rstest]
#[case("People?$top=0&$skip=10", Some(0), Some(10))]
#[case("People?$top=%2025%20", Some(25), None)]
#[case("People", None, None)]
fn paging(#[case] request: &str, #[case] top: Option<i64>, #[case] skip: Option<i64>) {
    let uri = parse_uri(request).expect("parses");
    assert_eq!((uri.top, uri.skip), (top, skip));
}

#[rstest]
#[case("People?$top=-1")]
#[case("People?$skip=1.5")]
#[case("People?$top=")]
#[case("People?$top=1&$top=2")]
#[case("People?$unknown=1")]
fn invalid_options(#[case] request: &str) {
    assert!(parse_uri(request).is_err(), "{request}");
}

#[test]
fn pass_through_options() {
    let uri = parse_uri("People?$skiptoken=page2&$deltatoken=d1&$format=json&trace=on")
        .expect("parses");
    assert_eq!(uri.skip_token.as_deref(), Some("page2"));
    assert_eq!(uri.delta_token.as_deref(), Some("d1"));
    assert_eq!(uri.format.as_deref(), Some("json"));
    assert_eq!(uri.custom_query_options, vec![("trace".to_string(), "on".to_string())]);
}

#[test]
fn option_names_without_dollar() {
    let model = people_model();
    let request = "People?top=3&filter=Age%20gt%201";
    let uri = ODataUriParser::new(&model, ParserSettings::lenient(), Some(SERVICE_ROOT), request)
        .and_then(|mut parser| parser.parse_uri())
        .expect("parses");
    assert_eq!(uri.top, Some(3));
    assert!(uri.filter.is_some());

    let strict = parse_uri(request).expect("parses");
    assert_eq!(strict.top, None);
    assert_eq!(strict.custom_query_options.len(), 2);
}

#[test]
fn id_option() {
    let model = people_model();
    let parser = parser(&model, "People(1)/Friends/$ref?$id=People(2)");
    let id = parser.parse_id().expect("resolves").expect("present");
    assert_eq!(id.to_string(), "EntitySet(People)/Key(ID=2)");

    let parser = common::parser(&model, "People(1)/Friends/$ref?$id=../elsewhere/People(2)");
    assert!(parser.parse_id().is_err());
}

#[test]
fn id_is_part_of_the_full_parse() {
    let uri = parse_uri("People(1)/Friends/$ref?$id=People(2)").expect("parses");
    assert_eq!(
        uri.id.map(|id| id.to_string()).as_deref(),
        Some("EntitySet(People)/Key(ID=2)")
    );
    assert_eq!(parse_uri("People(1)").expect("parses").id, None);
    assert!(parse_uri("People(1)/Friends/$ref?$id=Nowhere(2)").is_err());
}

#[test]
fn absolute_and_relative_requests_agree() {
    let relative = parse_uri("People(1)?$select=Name").expect("relative");
    let absolute = parse_uri(&format!("{SERVICE_ROOT}People(1)?$select=Name")).expect("absolute");
    assert_eq!(relative, absolute);
}
