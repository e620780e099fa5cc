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

//! Content-id references inside batch requests

use crate::model::{EdmTypeRef, NavigationSource};

/// What an earlier request in the same batch produced
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReference {
    pub type_ref: EdmTypeRef,
    pub navigation_source: Option<NavigationSource>,
}

/// Host hook that resolves a leading `$<content-id>` segment
///
/// Closures taking the content id (without the `$`) implement it directly.
pub trait BatchReferenceCallback: Send + Sync {
    fn resolve(&self, content_id: &str) -> Option<BatchReference>;
}

impl<F> BatchReferenceCallback for F
where
    F: Fn(&str) -> Option<BatchReference> + Send + Sync,
{
    fn resolve(&self, content_id: &str) -> Option<BatchReference> {
        self(content_id)
    }
}
