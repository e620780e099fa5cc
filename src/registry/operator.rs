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

//! Synthesized operator signatures
//!
//! Operators resolve through the same overload machinery as functions, against a table
//! of one signature per operand type pair. `has`, enum comparisons and structured
//! operands are handled by the binder before it gets here.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::model::EdmPrimitiveKind::{self, *};

use super::signature::FunctionSignature;

const NUMERIC: [EdmPrimitiveKind; 5] = [Int32, Int64, Single, Double, Decimal];
const ORDERED: [EdmPrimitiveKind; 6] = [String, Date, DateTimeOffset, TimeOfDay, Duration, Guid];

static BINARY_SIGNATURES: Lazy<FxHashMap<BinaryOperator, Vec<FunctionSignature>>> =
    Lazy::new(|| {
        use BinaryOperator::*;
        let mut table: FxHashMap<BinaryOperator, Vec<FunctionSignature>> = FxHashMap::default();
        let mut add = |op: BinaryOperator, left: EdmPrimitiveKind, right: EdmPrimitiveKind, ret| {
            table
                .entry(op)
                .or_default()
                .push(FunctionSignature::new(op.keyword(), &[left, right], ret));
        };

        for op in [Or, And] {
            add(op, Boolean, Boolean, Boolean);
        }
        for op in [Equal, NotEqual, GreaterThan, GreaterThanOrEqual, LessThan, LessThanOrEqual] {
            for kind in NUMERIC.into_iter().chain(ORDERED) {
                add(op, kind, kind, Boolean);
            }
        }
        for op in [Equal, NotEqual] {
            add(op, Boolean, Boolean, Boolean);
            add(op, Binary, Binary, Boolean);
        }
        for op in [Add, Subtract, Multiply, Divide, Modulo] {
            for kind in NUMERIC {
                add(op, kind, kind, kind);
            }
        }
        for kind in [Single, Double, Decimal] {
            add(DivideBy, kind, kind, kind);
        }
        for op in [Add, Subtract] {
            add(op, DateTimeOffset, Duration, DateTimeOffset);
            add(op, Date, Duration, Date);
            add(op, Duration, Duration, Duration);
        }
        add(Subtract, DateTimeOffset, DateTimeOffset, Duration);
        add(Subtract, Date, Date, Duration);
        table
    });

static UNARY_SIGNATURES: Lazy<FxHashMap<UnaryOperator, Vec<FunctionSignature>>> =
    Lazy::new(|| {
        let mut table: FxHashMap<UnaryOperator, Vec<FunctionSignature>> = FxHashMap::default();
        let negate = UnaryOperator::Negate;
        table.insert(
            negate,
            NUMERIC
                .into_iter()
                .chain([Duration])
                .map(|kind| FunctionSignature::new(negate.keyword(), &[kind], kind))
                .collect(),
        );
        let not = UnaryOperator::Not;
        table.insert(
            not,
            vec![FunctionSignature::new(not.keyword(), &[Boolean], Boolean)],
        );
        table
    });

pub fn binary_signatures(operator: BinaryOperator) -> &'static [FunctionSignature] {
    BINARY_SIGNATURES
        .get(&operator)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

pub fn unary_signatures(operator: UnaryOperator) -> &'static [FunctionSignature] {
    UNARY_SIGNATURES
        .get(&operator)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables() {
        assert_eq!(binary_signatures(BinaryOperator::And).len(), 1);
        assert!(binary_signatures(BinaryOperator::Has).is_empty());
        assert_eq!(binary_signatures(BinaryOperator::DivideBy).len(), 3);
        assert!(
            binary_signatures(BinaryOperator::Subtract)
                .iter()
                .any(|s| s.return_type.kind == Duration && s.parameters[0].kind == Date)
        );
        assert_eq!(unary_signatures(UnaryOperator::Negate).len(), 6);
        assert_eq!(
            unary_signatures(UnaryOperator::Not)[0].to_string(),
            "not(Edm.Boolean) -> Edm.Boolean"
        );
    }
}
