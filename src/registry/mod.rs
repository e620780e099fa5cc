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

//! Built-in function and operator signatures with overload resolution
//!
//! The signature tables are process-wide and immutable; every parse session reads them
//! concurrently without locking.

pub mod builtin;
pub mod operator;
pub mod promotion;
pub mod resolver;
pub mod signature;

pub use builtin::{builtin_function_names, builtin_signatures, is_builtin_function};
pub use operator::{binary_signatures, unary_signatures};
pub use promotion::{ArgumentType, promotion_cost, widening_cost};
pub use resolver::{Resolution, resolve_overload};
pub use signature::{FunctionSignature, SignatureType};
