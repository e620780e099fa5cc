//! Filter, orderby, select/expand and search binding through the request parser

mod common;

use common::{encode, filter, parser, parser_with, people_model};
use octofhir_odata_uri::config::DEFAULT_MAX_DEPTH;
use octofhir_odata_uri::model::EdmPrimitiveKind;
use octofhir_odata_uri::semantic::SelectItem;
use octofhir_odata_uri::{ODataError, ParserSettings, SemanticNode};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn filter_node(request: &str) -> Result<SemanticNode, ODataError> {
    let model = people_model();
    let mut parser = parser(&model, request);
    Ok(parser.parse_filter()?.expect("filter present").expression)
}

fn right_enum_value(node: &SemanticNode) -> Option<i64> {
    match node {
        SemanticNode::BinaryOperator { right, .. } => match right.as_ref() {
            SemanticNode::EnumValue { value, .. } => Some(value.value),
            _ => None,
        },
        _ => None,
    }
}

#[rstest]
#[case("Colors has NS.ColorFlags'Red,Green'")]
#[case("Colors has NS.ColorFlags'Green,Red'")]
#[case("Colors eq NS.ColorFlags'3'")]
fn flag_enum_members_combine(#[case] expression: &str) {
    let node = filter_node(&format!("People?$filter={}", encode(expression))).expect("binds");
    assert_eq!(right_enum_value(&node), Some(3));
}

#[test]
fn enum_literal_rules() {
    let unknown_value = filter_node(&format!("People?$filter={}", encode("Size eq NS.Size'7'")))
        .expect("numeric values outside the members are kept");
    assert_eq!(right_enum_value(&unknown_value), Some(7));

    assert!(matches!(
        filter("Size eq NS.Size'Small,Large'"),
        Err(ODataError::InvalidEnumLiteral { .. })
    ));
    assert!(matches!(
        filter("Size eq NS.Size'Huge'"),
        Err(ODataError::InvalidEnumLiteral { .. })
    ));
    assert!(filter("Size eq NS.Shape'Small'").is_err());
}

#[test]
fn round_picks_static_overload_and_defers_on_open_properties() {
    let node = filter_node("People?$filter=round(Score)%20eq%201").expect("binds");
    let SemanticNode::BinaryOperator { left, .. } = &node else {
        panic!("expected a comparison");
    };
    assert_eq!(
        left.type_ref().and_then(|t| t.as_primitive()),
        Some(EdmPrimitiveKind::Double)
    );

    let node = filter_node("Bags?$filter=round(Weight)%20eq%201").expect("binds");
    let SemanticNode::BinaryOperator { left, type_ref, .. } = &node else {
        panic!("expected a comparison");
    };
    assert!(matches!(
        left.as_ref(),
        SemanticNode::SingleValueFunctionCall { type_ref, .. } if type_ref.is_untyped()
    ));
    assert!(type_ref.is_boolean());
}

#[rstest]
#[case("Age gt 30 and Name eq 'x'", "(($it/Age gt 30) and ($it/Name eq 'x'))")]
#[case("Score gt Age", "($it/Score gt convert($it/Age,Edm.Double))")]
#[case("Friends/any(f: f/Age gt 30)", "$it/Friends/any(f:(f/Age gt 30))")]
#[case("Emails/all(e: endswith(e, '.org'))", "$it/Emails/all(e:endswith(e,'.org'))")]
#[case("Home/City in ('Oslo', 'Bergen')", "($it/Home/City in ('Oslo','Bergen'))")]
#[case("Friends/$count gt 2", "($it/Friends/$count gt 2L)")]
#[case("isof(NS.Employee)", "isof($it,'NS.Employee')")]
#[case("Age eq 1.5", "(convert($it/Age,Edm.Decimal) eq 1.5M)")]
#[case("Age add 1.5 gt 2", "((convert($it/Age,Edm.Decimal) add 1.5M) gt 2M)")]
#[case("Score eq 1.5", "($it/Score eq 1.5D)")]
fn filters_render(#[case] expression: &str, #[case] expected: &str) {
    assert_eq!(filter(expression).expect("binds"), expected);
}

#[rstest]
#[case("Nickname eq 'x'")]
#[case("Name add 1 eq 2")]
#[case("Age")]
#[case("length(Age) eq 1")]
#[case("Friends/Age eq 1")]
fn filters_rejected(#[case] expression: &str) {
    assert!(filter(expression).is_err(), "{expression}");
}

#[test]
fn binding_twice_gives_equal_trees() {
    let request = "People?$filter=contains(Name,'a')%20or%20Age%20lt%2010&$orderby=Name%20desc,Age";
    let model = people_model();
    let mut first = parser(&model, request);
    let mut second = parser(&model, request);
    assert_eq!(first.parse_uri().expect("parses"), second.parse_uri().expect("parses"));
}

fn nested_negation(depth: usize) -> String {
    let inner = depth - 1;
    format!("{}true{}", "not(".repeat(inner), ")".repeat(inner))
}

#[rstest]
#[case(5)]
#[case(32)]
fn filter_depth_limit(#[case] max_depth: usize) {
    let model = people_model();
    let settings = ParserSettings::default().with_max_depth(max_depth);
    let request = |depth: usize| format!("People?$filter={}", encode(&nested_negation(depth)));

    let mut at_limit = parser_with(&model, &request(max_depth), settings.clone());
    assert!(at_limit.parse_filter().is_ok());

    let mut over_limit = parser_with(&model, &request(max_depth + 1), settings);
    assert_eq!(
        over_limit.parse_filter(),
        Err(ODataError::RecursionDepthExceeded { max: max_depth })
    );
}

#[rstest]
#[case("not(not(Age gt 1))", 3)]
#[case("round(round(Score)) gt 1", 3)]
#[case("Friends/any(f: f/Age gt 1 and (f/Name eq 'x'))", 3)]
fn binding_accepts_what_the_parser_accepts(#[case] expression: &str, #[case] max_depth: usize) {
    let model = people_model();
    let request = format!("People?$filter={}", encode(expression));
    let settings = ParserSettings::default().with_max_depth(max_depth);
    let mut at_limit = parser_with(&model, &request, settings);
    assert!(at_limit.parse_filter().is_ok());

    let settings = ParserSettings::default().with_max_depth(max_depth - 1);
    let mut over_limit = parser_with(&model, &request, settings);
    assert_eq!(
        over_limit.parse_filter(),
        Err(ODataError::RecursionDepthExceeded { max: max_depth - 1 })
    );
}

#[test]
fn flat_operator_chains_cost_no_depth() {
    let terms = vec!["Age eq 1"; 900].join(" and ");
    assert!(filter(&terms).is_ok());
    let sums = format!("Age{} gt 1", " add 1".repeat(900));
    assert!(filter(&sums).is_ok());
    let negations = format!("{}true", "not ".repeat(900));
    assert_eq!(filter(&negations).map(|text| text.len() > 900), Ok(true));
}

#[test]
fn default_depth_limit_fits_a_small_stack() {
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let depth = DEFAULT_MAX_DEPTH - 1;
            let negations = format!("{}Age gt 1{}", "not(".repeat(depth), ")".repeat(depth));
            assert!(filter(&negations).is_ok());
            assert_eq!(
                filter(&format!("not({negations})")),
                Err(ODataError::RecursionDepthExceeded {
                    max: DEFAULT_MAX_DEPTH
                })
            );
            let rounds = format!("{}Score{} gt 1", "round(".repeat(depth), ")".repeat(depth));
            assert!(filter(&rounds).is_ok());
        })
        .expect("thread spawns");
    assert!(worker.join().is_ok());
}

#[test]
fn multibyte_spatial_literal_is_an_error() {
    assert!(filter("Location eq geography'Sé€'").is_err());
    assert!(filter("Location eq geography'Sé€ POINT(1 2)'").is_err());
}

#[test]
fn expand_depth_limit() {
    let model = people_model();
    let nested = |depth: usize| {
        let mut text = "Friends".to_string();
        for _ in 1..depth {
            text = format!("Friends($expand={text})");
        }
        text
    };
    let settings = ParserSettings::default().with_max_depth(4);
    let mut at_limit = parser_with(&model, &format!("People?$expand={}", nested(4)), settings.clone());
    assert!(at_limit.parse_select_and_expand().is_ok());
    let mut over_limit = parser_with(&model, &format!("People?$expand={}", nested(5)), settings);
    assert!(matches!(
        over_limit.parse_select_and_expand(),
        Err(ODataError::RecursionDepthExceeded { max: 4 })
    ));
}

#[test]
fn select_and_expand_bind_against_path_target() {
    let model = people_model();
    let mut parser = parser(
        &model,
        "Dogs(1)/MyPeople?$select=Name,Home/City&$expand=Friends($filter=Age%20gt%203;$top=2;$levels=max)",
    );
    let clause = parser
        .parse_select_and_expand()
        .expect("binds")
        .expect("present");
    assert!(!clause.all_selected);
    assert_eq!(clause.selected().count(), 2);
    let Some(SelectItem::ExpandedNavigation {
        navigation_source,
        options,
        ..
    }) = clause.expanded().next()
    else {
        panic!("expected an expanded navigation");
    };
    assert_eq!(navigation_source.as_ref().map(|s| s.name()), Some("People".to_string()));
    assert_eq!(options.top, Some(2));
    assert!(options.filter.is_some());
    assert!(options.levels.is_some_and(|levels| levels.is_max));
}

#[test]
fn orderby_and_search() {
    let model = people_model();
    let mut parser = parser(
        &model,
        "People?$orderby=Home/City,Age%20desc&$search=blue%20OR%20NOT%20%22light%20red%22",
    );
    let order_by = parser.parse_order_by().expect("binds").expect("present");
    assert_eq!(order_by.items.len(), 2);
    assert!(parser.parse_order_by().is_ok());
    let search = parser.parse_search().expect("parses").expect("present");
    assert_eq!(search.expression.to_string(), "(\"blue\" or (not \"light red\"))");

    let mut bad = common::parser(&model, "People?$orderby=Friends");
    assert!(bad.parse_order_by().is_err());
}

#[test]
fn parameter_aliases_bind_once() {
    let model = people_model();
    let mut parser = parser(
        &model,
        "People?$filter=Age%20gt%20@a%20and%20Age%20lt%20@b&@a=@b&@b=40",
    );
    let uri = parser.parse_uri().expect("parses");
    assert_eq!(
        uri.filter.map(|f| f.expression.to_string()),
        Some("(($it/Age gt 40) and ($it/Age lt 40))".to_string())
    );
    assert_eq!(uri.parameter_aliases.len(), 2);

    let mut cyclic = common::parser(&model, "People?$filter=Age%20gt%20@a&@a=@a");
    assert!(matches!(
        cyclic.parse_filter(),
        Err(ODataError::ParameterAliasCycle { .. })
    ));

    let missing = filter("Name eq @nothing").expect("missing alias is null");
    assert_eq!(missing, "($it/Name eq null)");
}
