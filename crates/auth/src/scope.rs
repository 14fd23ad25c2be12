//! Scopes granted to partner credentials and carried in federation tokens.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "timebanks:read")]
    TimebanksRead,
    #[serde(rename = "members:read")]
    MembersRead,
    #[serde(rename = "listings:read")]
    ListingsRead,
    #[serde(rename = "messages:read")]
    MessagesRead,
    #[serde(rename = "messages:write")]
    MessagesWrite,
    #[serde(rename = "transactions:read")]
    TransactionsRead,
    #[serde(rename = "transactions:write")]
    TransactionsWrite,
}

impl Scope {
    pub const ALL: [Scope; 7] = [
        Scope::TimebanksRead,
        Scope::MembersRead,
        Scope::ListingsRead,
        Scope::MessagesRead,
        Scope::MessagesWrite,
        Scope::TransactionsRead,
        Scope::TransactionsWrite,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::TimebanksRead => "timebanks:read",
            Scope::MembersRead => "members:read",
            Scope::ListingsRead => "listings:read",
            Scope::MessagesRead => "messages:read",
            Scope::MessagesWrite => "messages:write",
            Scope::TransactionsRead => "transactions:read",
            Scope::TransactionsWrite => "transactions:write",
        }
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CredentialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == s)
            .ok_or_else(|| CredentialError::UnknownScope(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Scope::ALL.into_iter().collect()
    }

    /// Parse an OAuth-style space separated list. Unknown entries fail.
    pub fn parse_space_separated(raw: &str) -> Result<Self, CredentialError> {
        raw.split_whitespace().map(str::parse).collect()
    }

    pub fn from_strings<S: AsRef<str>>(items: &[S]) -> Result<Self, CredentialError> {
        items.iter().map(|s| s.as_ref().parse()).collect()
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_subset(&self, other: &ScopeSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|s| s.as_str().to_string()).collect()
    }

    pub fn to_space_separated(&self) -> String {
        self.to_strings().join(" ")
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
