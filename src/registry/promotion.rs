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

//! Type promotion between primitive kinds
//!
//! Costs are small integers; lower is better. An exact match costs nothing, a `null`
//! argument costs 1 against any nullable parameter, numeric widening costs the distance
//! between ranks, and re-reading an unsuffixed literal in a type widening cannot reach
//! costs [`LITERAL_RETYPE_COST`]. The resolver only picks a retyping candidate when
//! every viable candidate needs at least as many retypes.

use crate::literal::numeric::retype_literal;
use crate::model::EdmPrimitiveKind;

use super::signature::SignatureType;

pub const NULL_COST: u32 = 1;
pub const SPATIAL_ROOT_COST: u32 = 1;
pub const LITERAL_RETYPE_COST: u32 = 10;

/// Static description of an argument offered to a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentType<'a> {
    /// Statically typed primitive expression
    Primitive {
        kind: EdmPrimitiveKind,
        nullable: bool,
    },
    /// Unsuffixed numeric literal, carrying its text for retyping
    NumericLiteral {
        kind: EdmPrimitiveKind,
        text: &'a str,
    },
    /// The `null` literal
    Null,
    /// Open property or untyped value; no static type to match
    Dynamic,
    /// Structured, enum or collection value; never matches a primitive parameter
    NonPrimitive,
}

impl ArgumentType<'_> {
    pub fn kind(&self) -> Option<EdmPrimitiveKind> {
        match self {
            Self::Primitive { kind, .. } | Self::NumericLiteral { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic)
    }
}

fn numeric_rank(kind: EdmPrimitiveKind) -> Option<u32> {
    use EdmPrimitiveKind::*;
    Some(match kind {
        Byte | SByte => 0,
        Int16 => 1,
        Int32 => 2,
        Int64 => 3,
        Single => 4,
        Double => 5,
        Decimal => 6,
        _ => return None,
    })
}

/// Cost of implicitly widening `from` to `to`, or `None` when not allowed
///
/// Integral kinds widen to any wider integral kind and to every floating or decimal
/// kind; `Single` widens to `Double`. Nothing widens out of `Double` or `Decimal`.
pub fn widening_cost(from: EdmPrimitiveKind, to: EdmPrimitiveKind) -> Option<u32> {
    use EdmPrimitiveKind::*;
    if from == to {
        return Some(0);
    }
    if from.is_spatial() {
        return (from.spatial_root() == Some(to)).then_some(SPATIAL_ROOT_COST);
    }
    let (from_rank, to_rank) = (numeric_rank(from)?, numeric_rank(to)?);
    let allowed = match from {
        Byte | SByte | Int16 | Int32 | Int64 => to_rank > from_rank,
        Single => to == Double,
        _ => false,
    };
    allowed.then(|| to_rank - from_rank)
}

/// Cost of passing `argument` where `parameter` is expected
pub fn promotion_cost(argument: &ArgumentType<'_>, parameter: SignatureType) -> Option<u32> {
    match *argument {
        ArgumentType::Primitive { kind, nullable } => {
            if nullable && !parameter.nullable {
                return None;
            }
            widening_cost(kind, parameter.kind)
        }
        ArgumentType::NumericLiteral { kind, text } => widening_cost(kind, parameter.kind)
            .or_else(|| {
                retype_literal(text, parameter.kind).map(|_| LITERAL_RETYPE_COST)
            }),
        ArgumentType::Null => parameter.nullable.then_some(NULL_COST),
        ArgumentType::Dynamic => Some(0),
        ArgumentType::NonPrimitive => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EdmPrimitiveKind::*;
    use rstest::rstest;

    #[rstest]
    #[case(Int32, Int32, Some(0))]
    #[case(Int32, Int64, Some(1))]
    #[case(Int32, Double, Some(3))]
    #[case(Int32, Decimal, Some(4))]
    #[case(Byte, Int16, Some(1))]
    #[case(Single, Double, Some(1))]
    #[case(Byte, SByte, None)]
    #[case(Int64, Int32, None)]
    #[case(Double, Decimal, None)]
    #[case(Decimal, Double, None)]
    #[case(Single, Decimal, None)]
    #[case(String, Int32, None)]
    #[case(GeographyPoint, Geography, Some(1))]
    #[case(GeographyPoint, Geometry, None)]
    fn test_widening(
        #[case] from: EdmPrimitiveKind,
        #[case] to: EdmPrimitiveKind,
        #[case] expected: Option<u32>,
    ) {
        assert_eq!(widening_cost(from, to), expected);
    }

    #[test]
    fn test_literal_retype_only_when_value_fits() {
        let literal = ArgumentType::NumericLiteral {
            kind: Decimal,
            text: "1.5",
        };
        assert_eq!(
            promotion_cost(&literal, SignatureType::nullable(Double)),
            Some(LITERAL_RETYPE_COST)
        );
        assert_eq!(promotion_cost(&literal, SignatureType::nullable(Int32)), None);

        let big = ArgumentType::NumericLiteral {
            kind: Int64,
            text: "5000000000",
        };
        assert_eq!(promotion_cost(&big, SignatureType::nullable(Int32)), None);
    }

    #[test]
    fn test_null_and_nullability() {
        assert_eq!(
            promotion_cost(&ArgumentType::Null, SignatureType::nullable(String)),
            Some(NULL_COST)
        );
        assert_eq!(
            promotion_cost(&ArgumentType::Null, SignatureType::required(String)),
            None
        );
        let nullable_int = ArgumentType::Primitive {
            kind: Int32,
            nullable: true,
        };
        assert_eq!(promotion_cost(&nullable_int, SignatureType::required(Int32)), None);
    }
}
