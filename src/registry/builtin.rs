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

//! Built-in function table
//!
//! Built once on first use and read without synchronization afterwards.

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::model::EdmPrimitiveKind::{self, *};

use super::signature::FunctionSignature;

/// `isof` and `cast` take a type name argument and are bound separately
pub const TYPE_FUNCTIONS: &[&str] = &["isof", "cast"];

static BUILTIN_FUNCTIONS: Lazy<FxHashMap<&'static str, Vec<FunctionSignature>>> =
    Lazy::new(|| {
        let mut table: FxHashMap<&'static str, Vec<FunctionSignature>> = FxHashMap::default();
        let mut add = |name: &'static str, parameters: &[EdmPrimitiveKind], ret: EdmPrimitiveKind| {
            table
                .entry(name)
                .or_default()
                .push(FunctionSignature::new(name, parameters, ret));
        };

        // String
        add("contains", &[String, String], Boolean);
        add("startswith", &[String, String], Boolean);
        add("endswith", &[String, String], Boolean);
        add("length", &[String], Int32);
        add("indexof", &[String, String], Int32);
        add("substring", &[String, Int32], String);
        add("substring", &[String, Int32, Int32], String);
        add("tolower", &[String], String);
        add("toupper", &[String], String);
        add("trim", &[String], String);
        add("concat", &[String, String], String);
        add("matchesPattern", &[String, String], Boolean);

        // Date and time
        for name in ["year", "month", "day"] {
            add(name, &[DateTimeOffset], Int32);
            add(name, &[Date], Int32);
        }
        for name in ["hour", "minute", "second"] {
            add(name, &[DateTimeOffset], Int32);
            add(name, &[TimeOfDay], Int32);
        }
        add("fractionalseconds", &[DateTimeOffset], Decimal);
        add("fractionalseconds", &[TimeOfDay], Decimal);
        add("date", &[DateTimeOffset], Date);
        add("time", &[DateTimeOffset], TimeOfDay);
        add("totaloffsetminutes", &[DateTimeOffset], Int32);
        add("totalseconds", &[Duration], Decimal);
        add("now", &[], DateTimeOffset);
        add("maxdatetime", &[], DateTimeOffset);
        add("mindatetime", &[], DateTimeOffset);

        // Math
        for name in ["round", "floor", "ceiling"] {
            add(name, &[Double], Double);
            add(name, &[Decimal], Decimal);
        }

        // Geo
        add("geo.distance", &[GeographyPoint, GeographyPoint], Double);
        add("geo.distance", &[GeometryPoint, GeometryPoint], Double);
        add("geo.length", &[GeographyLineString], Double);
        add("geo.length", &[GeometryLineString], Double);
        add("geo.intersects", &[GeographyPoint, GeographyPolygon], Boolean);
        add("geo.intersects", &[GeometryPoint, GeometryPolygon], Boolean);

        log::debug!("Registered {} built-in function names", table.len());
        table
    });

/// Overloads registered under a built-in function name
pub fn builtin_signatures(name: &str) -> Option<&'static [FunctionSignature]> {
    BUILTIN_FUNCTIONS.get(name).map(Vec::as_slice)
}

pub fn is_builtin_function(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains_key(name) || TYPE_FUNCTIONS.contains(&name)
}

/// Every built-in function name, sorted
pub fn builtin_function_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BUILTIN_FUNCTIONS.keys().copied().collect();
    names.extend_from_slice(TYPE_FUNCTIONS);
    names.sort_unstable();
    names
}
