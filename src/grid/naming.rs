//! Grid procedure naming convention.
//!
//! Fetch procedures are `sp_Grid_{Entity}`; their companions are
//! `sp_Grid_Insert_{Entity}`, `sp_Grid_Update_{Entity}` and
//! `sp_Grid_Delete_{Entity}`.

use std::sync::LazyLock;

use regex::Regex;

pub const FETCH_PREFIX: &str = "sp_Grid_";
pub const INSERT_PREFIX: &str = "sp_Grid_Insert_";
pub const UPDATE_PREFIX: &str = "sp_Grid_Update_";
pub const DELETE_PREFIX: &str = "sp_Grid_Delete_";

/// Synthetic row id column emitted by every fetch procedure.
pub const ROW_ID_FIELD: &str = "Id";

static PROCEDURE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sp_Grid_[a-zA-Z0-9_]+$").expect("valid procedure regex"));

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

pub fn is_valid_procedure_name(name: &str) -> bool {
    PROCEDURE_NAME.is_match(name)
}

pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Procedure-name suffix for a table: anything outside `[A-Za-z0-9_]` becomes `_`.
pub fn entity_suffix(table: &str) -> String {
    table
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub fn fetch_name(entity: &str) -> String {
    format!("{}{}", FETCH_PREFIX, entity)
}

pub fn insert_name(entity: &str) -> String {
    format!("{}{}", INSERT_PREFIX, entity)
}

pub fn update_name(entity: &str) -> String {
    format!("{}{}", UPDATE_PREFIX, entity)
}

pub fn delete_name(entity: &str) -> String {
    format!("{}{}", DELETE_PREFIX, entity)
}

fn entity_of(fetch_procedure: &str) -> Option<&str> {
    fetch_procedure
        .strip_prefix(FETCH_PREFIX)
        .filter(|entity| !entity.is_empty())
}

pub fn derive_update_name(fetch_procedure: &str) -> Option<String> {
    entity_of(fetch_procedure).map(update_name)
}

pub fn derive_insert_name(fetch_procedure: &str) -> Option<String> {
    entity_of(fetch_procedure).map(insert_name)
}

/// Plural-stripping rule: trailing "es", else a trailing "s" (except after
/// "s", "u" or "i"). Irregular plurals come out wrong; [`delete_candidates`]
/// also offers the unmodified entity.
pub fn singularize(entity: &str) -> &str {
    let lower = entity.to_ascii_lowercase();
    if lower.len() > 3 && lower.ends_with("es") {
        &entity[..entity.len() - 2]
    } else if lower.len() > 1
        && lower.ends_with('s')
        && !["ss", "us", "is"].iter().any(|suffix| lower.ends_with(suffix))
    {
        &entity[..entity.len() - 1]
    } else {
        entity
    }
}

/// Delete procedure names to try, most likely first.
pub fn delete_candidates(fetch_procedure: &str) -> Vec<String> {
    let Some(entity) = entity_of(fetch_procedure) else {
        return Vec::new();
    };
    let mut candidates = vec![delete_name(singularize(entity))];
    let exact = delete_name(entity);
    if !candidates.contains(&exact) {
        candidates.push(exact);
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_grid_procedure_names() {
        assert!(is_valid_procedure_name("sp_Grid_Bus"));
        assert!(is_valid_procedure_name("sp_Grid_Transformer_2W"));
        assert!(!is_valid_procedure_name("sp_Grid_"));
        assert!(!is_valid_procedure_name("sp_Grid_Bus; DROP TABLE users"));
        assert!(!is_valid_procedure_name("pg_sleep"));
        assert!(!is_valid_procedure_name("sp_grid_bus"));
    }

    #[test]
    fn derives_update_and_insert_names() {
        assert_eq!(derive_update_name("sp_Grid_Buses").as_deref(), Some("sp_Grid_Update_Buses"));
        assert_eq!(derive_insert_name("sp_Grid_Bus").as_deref(), Some("sp_Grid_Insert_Bus"));
        assert_eq!(derive_update_name("sp_Other"), None);
    }

    #[test]
    fn delete_candidates_try_singular_first() {
        assert_eq!(
            delete_candidates("sp_Grid_Buses"),
            vec!["sp_Grid_Delete_Bus".to_string(), "sp_Grid_Delete_Buses".to_string()]
        );
        assert_eq!(
            delete_candidates("sp_Grid_Employees"),
            vec!["sp_Grid_Delete_Employe".to_string(), "sp_Grid_Delete_Employees".to_string()]
        );
        assert_eq!(
            delete_candidates("sp_Grid_Departments"),
            vec!["sp_Grid_Delete_Department".to_string(), "sp_Grid_Delete_Departments".to_string()]
        );
        assert_eq!(delete_candidates("sp_Grid_Bus"), vec!["sp_Grid_Delete_Bus".to_string()]);
        assert_eq!(delete_candidates("sp_Grid_Class"), vec!["sp_Grid_Delete_Class".to_string()]);
    }

    #[test]
    fn sanitizes_entity_suffix() {
        assert_eq!(entity_suffix("Bus"), "Bus");
        assert_eq!(entity_suffix("line-ratings 2024"), "line_ratings_2024");
    }
}
