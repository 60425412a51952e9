//! Object-level visibility: access predicates and their translation into
//! an index filter.
//!
//! A private object is visible when ANY predicate grants access, so the
//! predicate set is purely additive: authenticating never hides content an
//! anonymous request could see.

use serde_json::json;

use genehub_core::{role_shortname, AuthenticatedUser, PUBLIC_ROLE_SHORTNAME};

use crate::query::QueryNode;

/// Pseudo-role stored on objects an owner shares with their friends.
const FRIENDS_ROLE: &str = "friends";

/// One way a user can be granted visibility of a private object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPredicate {
    /// Object is shared with the public role.
    PublicRole,
    /// Object is shared with a role the user holds (index shortname).
    RoleMembership(String),
    /// Object is owned by the user.
    OwnerUsername(String),
    /// Object is owned by this friend and shared to friends.
    FriendOf(String),
}

/// Build the predicate set for a user (or anonymous when `None`).
///
/// Output order is deterministic for a fixed user snapshot: public role,
/// role memberships in role order, owner, friends in friend order.
pub fn build_predicates(user: Option<&AuthenticatedUser>) -> Vec<AccessPredicate> {
    let mut predicates = vec![AccessPredicate::PublicRole];
    if let Some(user) = user {
        for role in &user.roles {
            let short = role_shortname(role);
            if short != PUBLIC_ROLE_SHORTNAME {
                predicates.push(AccessPredicate::RoleMembership(short));
            }
        }
        predicates.push(AccessPredicate::OwnerUsername(user.username.clone()));
        for friend in &user.friends {
            predicates.push(AccessPredicate::FriendOf(friend.clone()));
        }
    }
    predicates
}

/// Translate a predicate set into one OR filter.
///
/// Role predicates collapse into a single `terms` clause on
/// `role_permission`; ownership becomes a `term` on `username`; friendship
/// becomes owner-and-friends-role. The result is attached as a filter to
/// every index query against permissioned types, and never to gene or
/// dataset queries.
pub fn predicates_to_filter(predicates: &[AccessPredicate]) -> QueryNode {
    let mut roles = Vec::new();
    let mut should = Vec::new();

    for predicate in predicates {
        match predicate {
            AccessPredicate::PublicRole => roles.push(json!(PUBLIC_ROLE_SHORTNAME)),
            AccessPredicate::RoleMembership(short) => roles.push(json!(short)),
            AccessPredicate::OwnerUsername(username) => {
                should.push(QueryNode::term("username", username.as_str()));
            }
            AccessPredicate::FriendOf(friend) => {
                should.push(QueryNode::Bool {
                    must: vec![
                        QueryNode::term("username", friend.as_str()),
                        QueryNode::term("role_permission", FRIENDS_ROLE),
                    ],
                    should: Vec::new(),
                    filter: Vec::new(),
                });
            }
        }
    }

    if !roles.is_empty() {
        should.insert(0, QueryNode::terms("role_permission", roles));
    }

    QueryNode::Bool {
        must: Vec::new(),
        should,
        filter: Vec::new(),
    }
}
