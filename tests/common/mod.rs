//! Shared fixture for the integration tests

#![allow(dead_code)]

use octofhir_odata_uri::{
    InMemoryModel, ModelDocument, ODataUri, ODataUriParser, ParserSettings, Result,
};

pub const SERVICE_ROOT: &str = "https://example.com/odata/";

const PEOPLE_MODEL: &str = include_str!("../fixtures/people.json");

/// People, dogs, orders and an open bag type in namespace `NS`
pub fn people_model() -> InMemoryModel {
    ModelDocument::from_json(PEOPLE_MODEL)
        .and_then(ModelDocument::into_model)
        .expect("fixture model loads")
}

pub fn parser<'m>(model: &'m InMemoryModel, request: &str) -> ODataUriParser<'m> {
    parser_with(model, request, ParserSettings::default())
}

pub fn parser_with<'m>(
    model: &'m InMemoryModel,
    request: &str,
    settings: ParserSettings,
) -> ODataUriParser<'m> {
    ODataUriParser::new(model, settings, Some(SERVICE_ROOT), request).expect("request splits")
}

/// Full parse of `request`; errors from splitting the query string are returned too
pub fn parse_uri(request: &str) -> Result<ODataUri> {
    let model = people_model();
    ODataUriParser::new(&model, ParserSettings::default(), Some(SERVICE_ROOT), request)
        .and_then(|mut parser| parser.parse_uri())
}

/// Rendered filter expression of `People?$filter=<filter>`
pub fn filter(filter: &str) -> Result<String> {
    let model = people_model();
    let mut parser = parser(&model, &format!("People?$filter={}", encode(filter)));
    Ok(parser
        .parse_filter()?
        .map(|clause| clause.expression.to_string())
        .unwrap_or_default())
}

/// Percent-encode the characters a query value cannot carry literally
pub fn encode(text: &str) -> String {
    text.replace('%', "%25")
        .replace(' ', "%20")
        .replace('&', "%26")
        .replace('#', "%23")
        .replace('+', "%2B")
}
