//! Access control injection.
//!
//! A principal sees an entity when it holds a grant on it directly or through
//! any group it belongs to. The restriction is appended once, as the outermost
//! conjunct of the finished clause, so no nested `OR` branch can bypass it.

use super::compile::{CompiledQuery, QueryArg};
use super::operators::ENTITY_ALIAS;

/// Object ids visible to the principal bound to both placeholders.
/// `UNION` keeps an entity granted both ways from being counted twice.
pub const ACCESSIBLE_OBJECTS_SQL: &str = "SELECT access.object_id FROM object_access access \
     JOIN catalog_user account ON account.user_id = access.user_id \
     WHERE account.user_name = ? \
     UNION \
     SELECT access.object_id FROM object_access access \
     JOIN group_membership membership ON membership.group_id = access.user_id \
     JOIN catalog_user account ON account.user_id = membership.user_id \
     WHERE account.user_name = ?";

/// Arguments binding [`ACCESSIBLE_OBJECTS_SQL`] for `principal`.
pub fn access_args(principal: &str) -> [QueryArg; 2] {
    [
        QueryArg::Text(principal.to_string()),
        QueryArg::Text(principal.to_string()),
    ]
}

/// Limit `query` to entities visible to `principal`. `None` is unrestricted.
pub fn restrict(query: CompiledQuery, principal: Option<&str>) -> CompiledQuery {
    let Some(principal) = principal else {
        return query;
    };

    let kind = query.kind();
    let clause = format!(
        "({}) AND {ENTITY_ALIAS}.object_id IN ({ACCESSIBLE_OBJECTS_SQL})",
        query.clause()
    );
    let mut args = query.args().to_vec();
    args.extend(access_args(principal));
    CompiledQuery::from_parts(kind, clause, args)
}
