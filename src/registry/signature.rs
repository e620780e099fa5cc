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

//! Function and operator signatures for overload resolution

use smallvec::SmallVec;
use std::fmt;

use crate::model::{EdmPrimitiveKind, EdmTypeRef};

/// Parameter or return type of a built-in signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureType {
    pub kind: EdmPrimitiveKind,
    /// Whether `null` is acceptable in this position
    pub nullable: bool,
}

impl SignatureType {
    pub const fn nullable(kind: EdmPrimitiveKind) -> Self {
        Self {
            kind,
            nullable: true,
        }
    }

    pub const fn required(kind: EdmPrimitiveKind) -> Self {
        Self {
            kind,
            nullable: false,
        }
    }

    pub fn to_type_ref(self) -> EdmTypeRef {
        EdmTypeRef::primitive(self.kind, self.nullable)
    }
}

impl fmt::Display for SignatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// One overload of a function or operator
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub name: &'static str,
    pub parameters: SmallVec<[SignatureType; 3]>,
    pub return_type: SignatureType,
}

impl FunctionSignature {
    /// Signature whose parameters and result all accept `null`
    pub fn new(
        name: &'static str,
        parameters: &[EdmPrimitiveKind],
        return_type: EdmPrimitiveKind,
    ) -> Self {
        Self {
            name,
            parameters: parameters
                .iter()
                .copied()
                .map(SignatureType::nullable)
                .collect(),
            return_type: SignatureType::nullable(return_type),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter(&self, index: usize) -> Option<SignatureType> {
        self.parameters.get(index).copied()
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, parameter) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{parameter}")?;
        }
        write!(f, ") -> {}", self.return_type)
    }
}
