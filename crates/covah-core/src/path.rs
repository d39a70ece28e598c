// Copyright 2025 eraflo
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

//! Hierarchical scene-prim identifiers.

use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Error returned when a string is not a valid absolute prim path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid prim path '{0}': expected '/' or '/name(/name)*'")]
pub struct InvalidPrimPath(pub String);

/// An absolute, hierarchical identifier for a scene prim (`/World/Mesh_0`).
///
/// Paths order element by element, so a parent always sorts directly before
/// its descendants. This is the canonical order in which the render index
/// iterates prims.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrimPath(Arc<str>);

impl PrimPath {
    /// Parses an absolute path.
    pub fn new(text: impl AsRef<str>) -> Result<Self, InvalidPrimPath> {
        let text = text.as_ref();
        if text == "/" {
            return Ok(Self::absolute_root());
        }
        let valid = text.starts_with('/')
            && text[1..]
                .split('/')
                .all(|element| !element.is_empty() && !element.contains(char::is_whitespace));
        if valid {
            Ok(Self(Arc::from(text)))
        } else {
            Err(InvalidPrimPath(text.to_string()))
        }
    }

    /// The absolute root path `/`.
    pub fn absolute_root() -> Self {
        Self(Arc::from("/"))
    }

    /// Returns `true` for the absolute root.
    pub fn is_absolute_root(&self) -> bool {
        &*self.0 == "/"
    }

    /// Returns the path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates over the path elements, root excluded.
    pub fn elements(&self) -> impl Iterator<Item = &str> + '_ {
        self.0[1..].split('/').filter(|e| !e.is_empty())
    }

    /// Returns the last path element, or an empty string for the root.
    pub fn name(&self) -> &str {
        self.elements().last().unwrap_or("")
    }

    /// Returns the parent path. The root is its own parent.
    pub fn parent(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self::absolute_root(),
            Some(idx) => Self(Arc::from(&self.0[..idx])),
        }
    }

    /// Appends a child element.
    pub fn append_child(&self, name: &str) -> Result<Self, InvalidPrimPath> {
        if self.is_absolute_root() {
            Self::new(format!("/{name}"))
        } else {
            Self::new(format!("{}/{name}", self.0))
        }
    }

    /// Returns `true` if `prefix` is this path or one of its ancestors.
    pub fn has_prefix(&self, prefix: &PrimPath) -> bool {
        if prefix.is_absolute_root() {
            return true;
        }
        let mut own = self.elements();
        prefix.elements().all(|element| own.next() == Some(element))
    }

    /// Returns the path as a token, which is how computations are named.
    pub fn to_token(&self) -> Token {
        Token::new(&*self.0)
    }
}

impl Ord for PrimPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.elements().cmp(other.elements())
    }
}

impl PartialOrd for PrimPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrimPath({})", &*self.0)
    }
}

impl fmt::Display for PrimPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PrimPath {
    type Error = InvalidPrimPath;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(text)
    }
}

impl From<PrimPath> for String {
    fn from(path: PrimPath) -> Self {
        path.0.to_string()
    }
}
