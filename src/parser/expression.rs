// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Precedence-climbing parser for filter and orderby expressions
//!
//! Precedence, loosest first: `or`, `and`, equality (`eq`, `ne`), relational
//! (`gt`, `ge`, `lt`, `le`), additive (`add`, `sub`), multiplicative (`mul`, `div`,
//! `divby`, `mod`), unary (`-`, `not`), then primary expressions where `has` and `in`
//! bind tightest.
//!
//! Every parenthesized group, argument and lambda body counts against the nesting
//! limit, as does the expression itself.

use super::lexer::Lexer;
use super::token::{Token, TokenKind};
use crate::ast::{
    BinaryOperator, LambdaToken, NamedValue, OrderByToken, OrderDirection, QueryToken,
    UnaryOperator,
};
use crate::error::{ODataError, Result};
use crate::literal::primitive::convert_primitive;
use crate::literal::{natural_numeric, unquote};
use crate::model::{EdmPrimitiveKind, ODataValue};

/// Operator precedence levels (higher = tighter binding)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Or = 1,
    And = 2,
    Equality = 3,
    Relational = 4,
    Additive = 5,
    Multiplicative = 6,
    Unary = 7,
}

impl Precedence {
    pub const fn of(op: BinaryOperator) -> Self {
        match op {
            BinaryOperator::Or => Self::Or,
            BinaryOperator::And => Self::And,
            BinaryOperator::Equal | BinaryOperator::NotEqual => Self::Equality,
            BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanOrEqual
            | BinaryOperator::LessThan
            | BinaryOperator::LessThanOrEqual => Self::Relational,
            BinaryOperator::Add | BinaryOperator::Subtract => Self::Additive,
            BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::DivideBy
            | BinaryOperator::Modulo => Self::Multiplicative,
            // Parsed as a postfix of primary expressions
            BinaryOperator::Has => Self::Unary,
        }
    }

    /// The next higher level, for left-associative operators
    pub const fn next_level(self) -> Self {
        match self {
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Relational,
            Self::Relational => Self::Additive,
            Self::Additive => Self::Multiplicative,
            Self::Multiplicative | Self::Unary => Self::Unary,
        }
    }
}

/// Parse a `$filter` expression
pub fn parse_filter(text: &str, max_depth: usize) -> Result<QueryToken> {
    log::trace!("parsing filter '{text}'");
    let mut parser = ExpressionParser::new(text, max_depth)?;
    let expression = parser.parse_expression()?;
    parser.expect_end()?;
    Ok(expression)
}

/// Parse a standalone expression, e.g. the value of a parameter alias
pub fn parse_expression(text: &str, max_depth: usize) -> Result<QueryToken> {
    parse_filter(text, max_depth)
}

/// Parse a `$orderby` list
pub fn parse_order_by(text: &str, max_depth: usize) -> Result<Vec<OrderByToken>> {
    log::trace!("parsing orderby '{text}'");
    let mut parser = ExpressionParser::new(text, max_depth)?;
    let mut items = Vec::new();
    loop {
        let expression = parser.parse_expression()?;
        let token = parser.lexer.current();
        let direction = if token.is_identifier("desc") {
            parser.advance()?;
            OrderDirection::Descending
        } else {
            if token.is_identifier("asc") {
                parser.advance()?;
            }
            OrderDirection::Ascending
        };
        items.push(OrderByToken {
            expression,
            direction,
        });
        if parser.lexer.current().kind == TokenKind::Comma {
            parser.advance()?;
        } else {
            break;
        }
    }
    parser.expect_end()?;
    Ok(items)
}

/// Parser state for one expression string
pub struct ExpressionParser<'a> {
    lexer: Lexer<'a>,
    depth: usize,
    max_depth: usize,
    /// Lambda variables in scope, innermost last
    range_variables: Vec<String>,
}

impl<'a> ExpressionParser<'a> {
    pub fn new(text: &'a str, max_depth: usize) -> Result<Self> {
        Ok(Self {
            lexer: Lexer::start(text, max_depth)?,
            depth: 0,
            max_depth,
            range_variables: Vec::new(),
        })
    }

    fn advance(&mut self) -> Result<Token<'a>> {
        self.lexer.next_token()
    }

    fn error(&self, token: Token<'_>, message: impl Into<String>) -> ODataError {
        ODataError::syntax(self.lexer.text(), token.position, message)
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        let token = self.lexer.current();
        if token.kind != kind {
            return Err(self.error(token, format!("{what} expected, found {token}")));
        }
        self.advance()?;
        Ok(())
    }

    pub fn expect_end(&self) -> Result<()> {
        let token = self.lexer.current();
        if token.kind == TokenKind::End {
            Ok(())
        } else {
            Err(self.error(token, format!("unexpected {token}")))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ODataError::RecursionDepthExceeded {
                max: self.max_depth,
            });
        }
        Ok(())
    }

    /// Parse one full expression at the current position
    pub fn parse_expression(&mut self) -> Result<QueryToken> {
        self.enter()?;
        let result = self.parse_with_precedence(Precedence::Or);
        self.depth -= 1;
        result
    }

    fn parse_with_precedence(&mut self, min: Precedence) -> Result<QueryToken> {
        let mut left = self.parse_unary()?;
        loop {
            let Some(op) = self
                .lexer
                .current()
                .identifier()
                .and_then(BinaryOperator::from_keyword)
                .filter(|op| *op != BinaryOperator::Has)
            else {
                break;
            };
            let precedence = Precedence::of(op);
            if precedence < min {
                break;
            }
            self.advance()?;
            let right = self.parse_with_precedence(precedence.next_level())?;
            left = QueryToken::binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<QueryToken> {
        let mut operators = Vec::new();
        loop {
            let token = self.lexer.current();
            if token.kind == TokenKind::Minus {
                operators.push(UnaryOperator::Negate);
            } else if token.is_identifier("not") && !self.lexer.next_char_is('/') {
                operators.push(UnaryOperator::Not);
            } else {
                break;
            }
            self.advance()?;
        }
        let mut operand = self.parse_postfix()?;
        for op in operators.into_iter().rev() {
            operand = QueryToken::unary(op, operand);
        }
        Ok(operand)
    }

    /// Primary expression followed by any number of `has` and `in` operators
    fn parse_postfix(&mut self) -> Result<QueryToken> {
        let mut left = self.parse_primary()?;
        loop {
            let token = self.lexer.current();
            if token.is_identifier("has") {
                self.advance()?;
                let right = self.parse_primary()?;
                left = QueryToken::binary(BinaryOperator::Has, left, right);
            } else if token.is_identifier("in") {
                self.advance()?;
                let right = self.parse_in_operand()?;
                left = QueryToken::In {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    /// `(a,b,c)` always reads as a collection here, even with one item
    fn parse_in_operand(&mut self) -> Result<QueryToken> {
        if self.lexer.current().kind != TokenKind::OpenParen {
            return self.parse_primary();
        }
        self.enter()?;
        self.advance()?;
        let mut items = Vec::new();
        if self.lexer.current().kind != TokenKind::CloseParen {
            loop {
                items.push(self.parse_expression()?);
                if self.lexer.current().kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::CloseParen, "')'")?;
        self.depth -= 1;
        Ok(QueryToken::Collection(items))
    }

    fn parse_primary(&mut self) -> Result<QueryToken> {
        let token = self.lexer.current();
        match token.kind {
            kind if kind.is_literal() => {
                let value = literal_value(token)?;
                self.advance()?;
                Ok(QueryToken::literal(value, token.text))
            }
            TokenKind::QuotedLiteral => {
                let quote = token.text.find('\'').unwrap_or(token.text.len());
                let body = unquote(&token.text[quote..])
                    .ok_or_else(|| self.error(token, "malformed quoted literal"))?;
                self.advance()?;
                Ok(QueryToken::CustomLiteral {
                    type_name: token.text[..quote].to_string(),
                    body,
                    text: token.text.to_string(),
                })
            }
            TokenKind::BracketedExpression => {
                let value = serde_json::from_str(token.text)
                    .map_err(|e| self.error(token, format!("invalid JSON literal: {e}")))?;
                self.advance()?;
                Ok(QueryToken::Json {
                    value,
                    text: token.text.to_string(),
                })
            }
            TokenKind::ParameterAlias => {
                self.advance()?;
                let alias = QueryToken::ParameterAlias {
                    name: token.text.to_string(),
                };
                self.parse_member_chain(alias)
            }
            TokenKind::OpenParen => {
                self.advance()?;
                let inner = self.parse_expression()?;
                if self.lexer.current().kind == TokenKind::Comma {
                    return Err(self.error(
                        self.lexer.current(),
                        "a parenthesized list is only valid on the right of 'in'",
                    ));
                }
                self.expect(TokenKind::CloseParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Identifier => self.parse_identifier_expression(),
            _ => Err(self.error(token, format!("expression expected, found {token}"))),
        }
    }

    fn parse_identifier_expression(&mut self) -> Result<QueryToken> {
        let token = self.lexer.current();
        let head = if matches!(token.text, "$it" | "$this")
            || self.range_variables.iter().any(|v| v == token.text)
        {
            self.advance()?;
            QueryToken::RangeVariable {
                name: token.text.to_string(),
            }
        } else {
            self.parse_member(None)?
        };
        self.parse_member_chain(head)
    }

    /// Property, type segment or function call at the current identifier
    fn parse_member(&mut self, source: Option<QueryToken>) -> Result<QueryToken> {
        let name = self.lexer.read_dotted_identifier(false)?;
        if self.lexer.next_char_is('(') {
            self.advance()?;
            let arguments = self.parse_arguments()?;
            return Ok(QueryToken::function(name, arguments, source));
        }
        self.advance()?;
        if name.contains('.') {
            Ok(QueryToken::DottedIdentifier {
                name: name.to_string(),
                source: source.map(Box::new),
            })
        } else {
            Ok(QueryToken::property(name, source))
        }
    }

    /// Each `/` segment nests the source one level, so a chain longer than the depth limit fails
    fn parse_member_chain(&mut self, mut source: QueryToken) -> Result<QueryToken> {
        let mut segments = 0usize;
        while self.lexer.current().kind == TokenKind::Slash {
            segments += 1;
            if segments > self.max_depth {
                return Err(ODataError::RecursionDepthExceeded {
                    max: self.max_depth,
                });
            }
            let segment = self.advance()?;
            if segment.kind != TokenKind::Identifier {
                return Err(self.error(segment, format!("member name expected after '/', found {segment}")));
            }
            source = match segment.text {
                "$count" => {
                    self.advance()?;
                    QueryToken::CountSegment {
                        source: Box::new(source),
                    }
                }
                "any" | "all" if self.lexer.next_char_is('(') => {
                    self.advance()?;
                    let lambda = self.parse_lambda(source)?;
                    if segment.text == "any" {
                        QueryToken::Any(Box::new(lambda))
                    } else {
                        QueryToken::All(Box::new(lambda))
                    }
                }
                _ => self.parse_member(Some(source))?,
            };
        }
        Ok(source)
    }

    fn parse_lambda(&mut self, source: QueryToken) -> Result<LambdaToken> {
        self.expect(TokenKind::OpenParen, "'('")?;
        if self.lexer.current().kind == TokenKind::CloseParen {
            self.advance()?;
            return Ok(LambdaToken {
                source,
                parameter: None,
                body: None,
            });
        }
        let variable = self.lexer.current();
        let Some(name) = variable.identifier() else {
            return Err(self.error(variable, format!("lambda variable expected, found {variable}")));
        };
        if name.starts_with('$') || self.range_variables.iter().any(|v| v == name) {
            return Err(self.error(variable, format!("lambda variable '{name}' is already in scope")));
        }
        self.advance()?;
        self.expect(TokenKind::Colon, "':'")?;
        self.range_variables.push(name.to_string());
        let body = self.parse_expression();
        self.range_variables.pop();
        let body = body?;
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(LambdaToken {
            source,
            parameter: Some(name.to_string()),
            body: Some(body),
        })
    }

    /// Argument list starting at `(`, with optional `name=value` arguments
    fn parse_arguments(&mut self) -> Result<Vec<NamedValue>> {
        self.expect(TokenKind::OpenParen, "'('")?;
        let mut arguments: Vec<NamedValue> = Vec::new();
        if self.lexer.current().kind == TokenKind::CloseParen {
            self.advance()?;
            return Ok(arguments);
        }
        loop {
            let token = self.lexer.current();
            let named = token.kind == TokenKind::Identifier && self.lexer.peek()?.kind == TokenKind::Equal;
            let argument = if named {
                if arguments.iter().any(|a| a.name.as_deref() == Some(token.text)) {
                    return Err(ODataError::DuplicateParameter {
                        name: token.text.to_string(),
                    });
                }
                self.advance()?;
                self.advance()?;
                NamedValue {
                    name: Some(token.text.to_string()),
                    value: self.parse_expression()?,
                }
            } else {
                NamedValue::positional(self.parse_expression()?)
            };
            arguments.push(argument);
            if self.lexer.current().kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::CloseParen, "')'")?;
        Ok(arguments)
    }
}

/// Natural value of a literal token
pub fn literal_value(token: Token<'_>) -> Result<ODataValue> {
    let value = match token.kind {
        TokenKind::NullLiteral => ODataValue::Null,
        TokenKind::IntegerLiteral
        | TokenKind::Int64Literal
        | TokenKind::SingleLiteral
        | TokenKind::DoubleLiteral
        | TokenKind::DecimalLiteral => natural_numeric(token.text)?,
        kind => {
            let primitive = kind.literal_type().unwrap_or(EdmPrimitiveKind::String);
            convert_primitive(token.text, primitive)?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prop(name: &str) -> QueryToken {
        QueryToken::property(name, None)
    }

    fn int(value: i32) -> QueryToken {
        QueryToken::literal(ODataValue::Int32(value), value.to_string())
    }

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Multiplicative > Precedence::Additive);
        assert!(Precedence::Relational > Precedence::Equality);
        assert!(Precedence::Equality > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
    }

    #[test]
    fn test_arithmetic_binds_tighter_than_comparison() {
        let parsed = parse_filter("A add 2 mul 3 eq 7", 100).expect("parses");
        let expected = QueryToken::binary(
            BinaryOperator::Equal,
            QueryToken::binary(
                BinaryOperator::Add,
                prop("A"),
                QueryToken::binary(BinaryOperator::Multiply, int(2), int(3)),
            ),
            int(7),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let parsed = parse_filter("A or B and C", 100).expect("parses");
        let expected = QueryToken::binary(
            BinaryOperator::Or,
            prop("A"),
            QueryToken::binary(BinaryOperator::And, prop("B"), prop("C")),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_left_associative_subtraction() {
        let parsed = parse_filter("A sub 1 sub 2", 100).expect("parses");
        let expected = QueryToken::binary(
            BinaryOperator::Subtract,
            QueryToken::binary(BinaryOperator::Subtract, prop("A"), int(1)),
            int(2),
        );
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_function_call_versus_grouping() {
        let call = parse_filter("contains(Name,'x')", 100).expect("call");
        assert!(matches!(call, QueryToken::FunctionCall(ref f) if f.name == "contains" && f.arguments.len() == 2));
        // A space before the parenthesis makes it a property followed by junk
        assert!(parse_filter("contains (Name,'x')", 100).is_err());
    }

    #[test]
    fn test_paths_and_lambdas() {
        let parsed = parse_filter("Orders/any(o: o/Amount gt 100)", 100).expect("parses");
        let QueryToken::Any(lambda) = parsed else {
            panic!("expected any");
        };
        assert_eq!(lambda.source, prop("Orders"));
        assert_eq!(lambda.parameter.as_deref(), Some("o"));
        assert_eq!(
            lambda.body,
            Some(QueryToken::binary(
                BinaryOperator::GreaterThan,
                QueryToken::property(
                    "Amount",
                    Some(QueryToken::RangeVariable {
                        name: "o".to_string()
                    })
                ),
                int(100),
            ))
        );
        assert!(matches!(
            parse_filter("Orders/any()", 100),
            Ok(QueryToken::Any(l)) if l.body.is_none()
        ));
    }

    #[test]
    fn test_in_and_has() {
        let parsed = parse_filter("Name in ('a','b')", 100).expect("in");
        assert!(matches!(parsed, QueryToken::In { ref right, .. } if matches!(**right, QueryToken::Collection(ref items) if items.len() == 2)));
        let parsed = parse_filter("Color has NS.Color'Red'", 100).expect("has");
        assert!(matches!(
            parsed,
            QueryToken::BinaryOperator { operator: BinaryOperator::Has, .. }
        ));
        let parsed = parse_filter("not Color has NS.Color'Red'", 100).expect("not has");
        assert!(matches!(
            parsed,
            QueryToken::UnaryOperator { operator: UnaryOperator::Not, .. }
        ));
    }

    #[test]
    fn test_named_arguments_and_duplicates() {
        let parsed = parse_filter("NS.Fn(a=1,b=@x) eq 2", 100).expect("named");
        let QueryToken::BinaryOperator { left, .. } = parsed else {
            panic!("expected comparison");
        };
        let QueryToken::FunctionCall(call) = *left else {
            panic!("expected call");
        };
        assert_eq!(call.arguments[0].name.as_deref(), Some("a"));
        assert!(matches!(
            parse_filter("NS.Fn(a=1,a=2)", 100),
            Err(ODataError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn test_depth_limit() {
        let nested = |n: usize| format!("{}true{}", "not(".repeat(n), ")".repeat(n));
        assert!(parse_filter(&nested(9), 10).is_ok());
        assert!(matches!(
            parse_filter(&nested(10), 10),
            Err(ODataError::RecursionDepthExceeded { max: 10 })
        ));
    }

    #[test]
    fn test_member_chain_limit() {
        let chain = |n: usize| format!("Friend{}/Age eq 1", "/Friend".repeat(n - 1));
        assert!(parse_filter(&chain(10), 10).is_ok());
        assert!(matches!(
            parse_filter(&chain(11), 10),
            Err(ODataError::RecursionDepthExceeded { max: 10 })
        ));
    }

    #[test]
    fn test_order_by() {
        let items = parse_order_by("Name desc, Age,Id asc", 100).expect("orderby");
        let directions: Vec<_> = items.iter().map(|i| i.direction).collect();
        assert_eq!(
            directions,
            vec![
                OrderDirection::Descending,
                OrderDirection::Ascending,
                OrderDirection::Ascending
            ]
        );
        assert!(parse_order_by("Name desc desc", 100).is_err());
    }

    #[test]
    fn test_syntax_errors_carry_position() {
        let Err(ODataError::Syntax { position, .. }) = parse_filter("Name eq", 100) else {
            panic!("expected syntax error");
        };
        assert_eq!(position, 7);
        assert!(parse_filter("", 100).is_err());
        assert!(parse_filter("(Name eq 1", 100).is_err());
    }
}
