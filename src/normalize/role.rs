use crate::model::message::Role;

/// Substring synonyms, checked in order after exact matching fails.
const ROLE_SYNONYMS: &[(&str, Role)] = &[
    ("user", Role::User),
    ("human", Role::User),
    ("assistant", Role::Assistant),
    ("ai", Role::Assistant),
    ("system", Role::System),
];

/// Exact, case-insensitive match against the three canonical roles.
pub fn exact_role(raw: &str) -> Option<Role> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "system" => Some(Role::System),
        _ => None,
    }
}

/// Heuristic role inference for loosely labelled exports.
///
/// Exact matches win, then the first synonym contained in the label. Substring matching
/// can misclassify (`"email"` contains `"ai"`); anything unmatched is [`Role::Unknown`].
pub fn infer_role(raw: &str) -> Role {
    if let Some(role) = exact_role(raw) {
        return role;
    }
    let lowered = raw.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return Role::Unknown;
    }
    ROLE_SYNONYMS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, role)| *role)
        .unwrap_or(Role::Unknown)
}
