use serde::{Deserialize, Serialize};

use crate::scope::Scope;

/// Conceptual federation API surface and the scope each route demands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FederationRoute {
    ListTimebanks,
    ListMembers,
    GetMember,
    ListListings,
    GetListing,
    SendMessage,
    CreateTransaction,
}

impl FederationRoute {
    pub fn required_scope(self) -> Scope {
        match self {
            FederationRoute::ListTimebanks => Scope::TimebanksRead,
            FederationRoute::ListMembers | FederationRoute::GetMember => Scope::MembersRead,
            FederationRoute::ListListings | FederationRoute::GetListing => Scope::ListingsRead,
            FederationRoute::SendMessage => Scope::MessagesWrite,
            FederationRoute::CreateTransaction => Scope::TransactionsWrite,
        }
    }

    pub fn method_and_path(self) -> (&'static str, &'static str) {
        match self {
            FederationRoute::ListTimebanks => ("GET", "/federation/timebanks"),
            FederationRoute::ListMembers => ("GET", "/federation/members"),
            FederationRoute::GetMember => ("GET", "/federation/members/{id}"),
            FederationRoute::ListListings => ("GET", "/federation/listings"),
            FederationRoute::GetListing => ("GET", "/federation/listings/{id}"),
            FederationRoute::SendMessage => ("POST", "/federation/messages"),
            FederationRoute::CreateTransaction => ("POST", "/federation/transactions"),
        }
    }
}
