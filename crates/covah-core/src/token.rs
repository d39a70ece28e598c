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

//! Immutable, cheaply clonable identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// An immutable identifier used for attribute names, buffer roles, plugin ids
/// and render-setting keys.
///
/// Cloning a `Token` only bumps a reference count, so tokens can be stored
/// freely in maps, buffer specs, and computation descriptors.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Token(Arc<str>);

impl Token {
    /// Creates a new token from any string-like value.
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(Arc::from(text.as_ref()))
    }

    /// Returns the empty token.
    pub fn empty() -> Self {
        Self(Arc::from(""))
    }

    /// Returns `true` if this is the empty token.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", &*self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Token {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Token {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.0.to_string()
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_equality_is_by_content() {
        let a = Token::new("points");
        let b = Token::from(String::from("points"));
        assert_eq!(a, b);
        assert_eq!(a, "points");
        assert_ne!(a, Token::new("normals"));
    }

    #[test]
    fn test_token_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(Token::new("points"), 3usize);
        assert_eq!(map.get("points"), Some(&3));
    }

    #[test]
    fn test_empty_token() {
        assert!(Token::default().is_empty());
        assert!(!Token::new("x").is_empty());
    }
}
