//! Insert, update and delete procedure generators.
//!
//! Every generated procedure returns `{success, message, errorCode?}` and maps
//! constraint violations to error codes instead of raising.

use crate::codegen::schema::{ColumnInfo, ResolvedGrid};
use crate::codegen::sql::{
    escape_format, json_text, json_value, qualified_table, quote_ident, quote_literal,
    row_id_expression, row_id_predicate, row_id_split, CastKind,
};
use crate::codegen::{generate, GenerateError, GeneratedProcedure, ProcedureKind};
use crate::grid::naming;

fn exception_block(fallback_code: &str) -> String {
    format!(
        r#"EXCEPTION
    WHEN unique_violation THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'A record with the same value already exists: ' || SQLERRM, 'errorCode', 'DUPLICATE_VALUE');
    WHEN not_null_violation THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'A required field is missing: ' || SQLERRM, 'errorCode', 'REQUIRED_FIELD_MISSING');
    WHEN foreign_key_violation THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'Invalid reference: ' || SQLERRM, 'errorCode', 'INVALID_REFERENCE');
    WHEN OTHERS THEN
        RETURN jsonb_build_object('success', FALSE, 'message', SQLERRM, 'errorCode', '{fallback_code}');"#
    )
}

/// `format()` template rendering one value as a literal cast to the column type.
/// `%L` renders NULL unquoted, so the cast applies to NULL as well.
fn literal_template(column: &ColumnInfo) -> String {
    quote_literal(&format!(
        "%L{}",
        escape_format(&CastKind::for_column(column).cast_suffix())
    ))
}

fn audit_user_expr(column: &ColumnInfo) -> String {
    format!(
        "NULLIF(p_user_id, ''){}",
        CastKind::for_column(column).cast_suffix()
    )
}

pub fn generate_insert_procedure(grid: &ResolvedGrid) -> Result<String, GenerateError> {
    if grid.insertable.is_empty() {
        return Err(GenerateError::NothingToWrite {
            table: grid.table.clone(),
            kind: ProcedureKind::Insert,
        });
    }

    let mut body = String::new();
    for column in &grid.insertable {
        let key = quote_literal(&column.name);
        let template = literal_template(column);
        body.push_str(&format!(
            "    IF p_field_values ? {key} THEN\n        v_columns := v_columns || {ident}::TEXT;\n        v_values := v_values || format({template}, {text});\n    END IF;\n",
            key = key,
            ident = quote_literal(&quote_ident(&column.name)),
            template = template,
            text = json_text("p_field_values", column),
        ));
    }

    let mut audit = String::new();
    if let Some(created_by) = &grid.audit.created_by {
        audit.push_str(&format!(
            "    v_columns := v_columns || {ident}::TEXT;\n    v_values := v_values || format({template}, NULLIF(p_user_id, ''));\n",
            ident = quote_literal(&quote_ident(&created_by.name)),
            template = literal_template(created_by),
        ));
    }
    if let Some(created_at) = &grid.audit.created_at {
        audit.push_str(&format!(
            "    v_columns := v_columns || {ident}::TEXT;\n    v_values := v_values || 'NOW()'::TEXT;\n",
            ident = quote_literal(&quote_ident(&created_at.name)),
        ));
    }

    Ok(format!(
        r#"CREATE OR REPLACE FUNCTION {name}(
    p_field_values JSONB,
    p_user_id TEXT DEFAULT NULL
)
RETURNS JSONB
LANGUAGE plpgsql
AS $function$
DECLARE
    v_columns TEXT[] := ARRAY[]::TEXT[];
    v_values TEXT[] := ARRAY[]::TEXT[];
    v_new_id TEXT;
BEGIN
    IF p_field_values IS NULL OR jsonb_typeof(p_field_values) <> 'object' THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'Field values must be a JSON object', 'errorCode', 'REQUIRED_FIELD_MISSING');
    END IF;

{body}
    IF COALESCE(array_length(v_columns, 1), 0) = 0 THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'No field values supplied', 'errorCode', 'REQUIRED_FIELD_MISSING');
    END IF;

{audit}
    EXECUTE format('INSERT INTO %s (%s) VALUES (%s) RETURNING %s',
        {table},
        array_to_string(v_columns, ', '),
        array_to_string(v_values, ', '),
        {id_expr})
    INTO v_new_id;

    RETURN jsonb_build_object('success', TRUE, 'message', 'Record created successfully', 'id', v_new_id);
{exception}
END;
$function$;"#,
        name = naming::insert_name(&grid.entity),
        body = body,
        audit = audit,
        table = quote_literal(&qualified_table(&grid.schema, &grid.table)),
        id_expr = quote_literal(&row_id_expression(&grid.primary_keys)),
        exception = exception_block("DB_ERROR"),
    ))
}

pub fn generate_update_procedure(grid: &ResolvedGrid) -> Result<String, GenerateError> {
    let mut assignments: Vec<String> = grid
        .editable
        .iter()
        .map(|column| {
            let ident = quote_ident(&column.name);
            format!(
                "        {ident} = CASE WHEN p_changes ? {key} THEN {value} ELSE {ident} END",
                ident = ident,
                key = quote_literal(&column.name),
                value = json_value("p_changes", column),
            )
        })
        .collect();

    if assignments.is_empty() {
        return Err(GenerateError::NothingToWrite {
            table: grid.table.clone(),
            kind: ProcedureKind::Update,
        });
    }

    if let Some(updated_by) = &grid.audit.updated_by {
        let ident = quote_ident(&updated_by.name);
        assignments.push(format!(
            "        {ident} = COALESCE({value}, {ident})",
            ident = ident,
            value = audit_user_expr(updated_by),
        ));
    }
    if let Some(updated_at) = &grid.audit.updated_at {
        assignments.push(format!("        {} = NOW()", quote_ident(&updated_at.name)));
    }

    Ok(format!(
        r#"CREATE OR REPLACE FUNCTION {name}(
    p_id TEXT,
    p_changes JSONB,
    p_user_id TEXT DEFAULT NULL
)
RETURNS JSONB
LANGUAGE plpgsql
AS $function$
DECLARE
    v_parts TEXT[];
    v_count INTEGER;
BEGIN
    IF p_changes IS NULL OR jsonb_typeof(p_changes) <> 'object' THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'Changes must be a JSON object', 'errorCode', 'UPDATE_ERROR');
    END IF;

{split}    UPDATE {table} SET
{assignments}
    WHERE {predicate};

    GET DIAGNOSTICS v_count = ROW_COUNT;
    IF v_count = 0 THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'Record not found', 'errorCode', 'NOT_FOUND');
    END IF;

    RETURN jsonb_build_object('success', TRUE, 'message', 'Record updated successfully', 'rowsAffected', v_count);
{exception}
END;
$function$;"#,
        name = naming::update_name(&grid.entity),
        split = row_id_split(&grid.primary_keys, "p_id", "v_parts"),
        table = qualified_table(&grid.schema, &grid.table),
        assignments = assignments.join(",\n"),
        predicate = row_id_predicate(&grid.primary_keys, "p_id", "v_parts"),
        exception = exception_block("UPDATE_ERROR"),
    ))
}

pub fn generate_delete_procedure(grid: &ResolvedGrid) -> String {
    format!(
        r#"CREATE OR REPLACE FUNCTION {name}(
    p_id TEXT,
    p_user_id TEXT DEFAULT NULL
)
RETURNS JSONB
LANGUAGE plpgsql
AS $function$
DECLARE
    v_parts TEXT[];
    v_count INTEGER;
BEGIN
{split}    DELETE FROM {table}
    WHERE {predicate};

    GET DIAGNOSTICS v_count = ROW_COUNT;
    IF v_count = 0 THEN
        RETURN jsonb_build_object('success', FALSE, 'message', 'Record not found', 'errorCode', 'NOT_FOUND');
    END IF;

    RETURN jsonb_build_object('success', TRUE, 'message', 'Record deleted successfully', 'rowsAffected', v_count);
{exception}
END;
$function$;"#,
        name = naming::delete_name(&grid.entity),
        split = row_id_split(&grid.primary_keys, "p_id", "v_parts"),
        table = qualified_table(&grid.schema, &grid.table),
        predicate = row_id_predicate(&grid.primary_keys, "p_id", "v_parts"),
        exception = exception_block("DELETE_ERROR"),
    )
}

/// Insert, update and delete procedures for a grid. A step that cannot be
/// generated is returned as an error entry rather than aborting the others.
pub fn generate_crud_procedures(grid: &ResolvedGrid) -> Vec<Result<GeneratedProcedure, GenerateError>> {
    [ProcedureKind::Insert, ProcedureKind::Update, ProcedureKind::Delete]
        .into_iter()
        .map(|kind| generate(grid, kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::schema::tests::{acline_table, bus_table, col};
    use crate::codegen::fetch::generate_grid_fetch;
    use crate::codegen::schema::{GridDefinition, TableSchema};

    fn resolve(table: TableSchema) -> ResolvedGrid {
        let definition = GridDefinition {
            table_name: table.name.clone(),
            ..Default::default()
        };
        ResolvedGrid::resolve(&table, &definition).unwrap()
    }

    #[test]
    fn update_leaves_absent_fields_untouched() {
        let sql = generate_update_procedure(&resolve(bus_table())).unwrap();
        assert!(sql.contains(
            r#""Voltage" = CASE WHEN p_changes ? 'Voltage' THEN NULLIF(p_changes ->> 'Voltage', '')::NUMERIC ELSE "Voltage" END"#
        ));
        assert!(sql.contains(
            r#""BusName" = CASE WHEN p_changes ? 'BusName' THEN (p_changes ->> 'BusName') ELSE "BusName" END"#
        ));
        assert!(sql.contains(r#""InService" = CASE WHEN p_changes ? 'InService' THEN NULLIF(p_changes ->> 'InService', '')::BOOLEAN"#));
        // Keys are never reassigned.
        assert!(!sql.contains(r#""BusId" = CASE"#));
    }

    #[test]
    fn update_stamps_audit_columns() {
        let sql = generate_update_procedure(&resolve(bus_table())).unwrap();
        assert!(sql.contains(r#""UpdatedBy" = COALESCE(NULLIF(p_user_id, ''), "UpdatedBy")"#));
        assert!(sql.contains(r#""updated_at" = NOW()"#));
    }

    #[test]
    fn scalar_key_update_matches_whole_id() {
        let sql = generate_update_procedure(&resolve(bus_table())).unwrap();
        assert!(sql.contains(r#"WHERE "BusId"::TEXT = p_id;"#));
        assert!(!sql.contains("string_to_array"));
    }

    #[test]
    fn composite_key_procedures_parse_the_fetch_id() {
        let grid = resolve(acline_table());
        let update = generate_update_procedure(&grid).unwrap();
        let delete = generate_delete_procedure(&grid);
        for sql in [&update, &delete] {
            assert!(sql.contains("v_parts := string_to_array(p_id, '_');"));
            assert!(sql.contains("<> 3 THEN"));
            assert!(sql.contains("'INVALID_KEY_FORMAT'"));
            assert!(sql.contains(
                r#""FromBus"::TEXT = v_parts[1] AND "ToBus"::TEXT = v_parts[2] AND "Circuit"::TEXT = v_parts[3]"#
            ));
        }
        assert!(delete.starts_with("CREATE OR REPLACE FUNCTION sp_Grid_Delete_Acline("));
    }

    #[test]
    fn fetch_id_parts_line_up_with_update_and_delete_keys() {
        let grid = resolve(acline_table());
        let fetch = generate_grid_fetch(&grid);
        let update = generate_update_procedure(&grid).unwrap();
        let delete = generate_delete_procedure(&grid);

        let keys: Vec<String> = grid
            .primary_keys
            .iter()
            .map(|pk| format!("{}::TEXT", quote_ident(&pk.name)))
            .collect();
        assert_eq!(keys.len(), 3);
        // The select list sits inside a quoted literal in the fetch body.
        let id_select = format!("{} AS \"Id\"", keys.join(" || '_' || "));
        assert!(fetch.contains(&id_select.replace('\'', "''")));

        for sql in [&update, &delete] {
            assert!(sql.contains(&format!("array_length(v_parts, 1), 0) <> {} THEN", keys.len())));
            for (position, key) in keys.iter().enumerate() {
                assert!(sql.contains(&format!("{} = v_parts[{}]", key, position + 1)));
            }
        }
    }

    #[test]
    fn every_editable_column_falls_back_to_its_current_value() {
        let grid = resolve(bus_table());
        let sql = generate_update_procedure(&grid).unwrap();
        for column in &grid.editable {
            let ident = quote_ident(&column.name);
            assert!(sql.contains(&format!("{} = CASE WHEN p_changes ? '{}' THEN", ident, column.name)));
            assert!(sql.contains(&format!("ELSE {} END", ident)));
        }
    }

    #[test]
    fn insert_and_update_stamp_the_user_the_same_way() {
        let mut table = bus_table();
        table.columns.push(col("CreatedBy", "uuid", 7));
        table.columns.retain(|c| c.name != "UpdatedBy");
        table.columns.push(col("UpdatedBy", "uuid", 8));
        let grid = resolve(table);
        let created_by = grid.audit.created_by.clone().unwrap();
        let cast = CastKind::for_column(&created_by).cast_suffix();

        let insert = generate_insert_procedure(&grid).unwrap();
        assert!(insert.contains(&format!("format('%L{}', NULLIF(p_user_id, ''))", cast)));
        assert!(!insert.contains("format('%L', p_user_id)"));

        let update = generate_update_procedure(&grid).unwrap();
        assert!(update.contains(&format!(
            r#""UpdatedBy" = COALESCE(NULLIF(p_user_id, ''){}, "UpdatedBy")"#,
            cast
        )));
    }

    #[test]
    fn insert_writes_only_supplied_fields() {
        let sql = generate_insert_procedure(&resolve(bus_table())).unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION sp_Grid_Insert_Bus("));
        assert!(sql.contains("IF p_field_values ? 'Voltage' THEN"));
        assert!(sql.contains(r#"v_columns := v_columns || '"Voltage"'::TEXT;"#));
        assert!(sql.contains("format('%L::NUMERIC', NULLIF(p_field_values ->> 'Voltage', ''))"));
        assert!(sql.contains("format('%L', (p_field_values ->> 'BusName'))"));
        // Serial key left to its default.
        assert!(!sql.contains("IF p_field_values ? 'BusId'"));
        assert!(sql.contains(r#"'"BusId"::TEXT'"#));
    }

    #[test]
    fn error_codes_cover_constraint_violations() {
        let grid = resolve(bus_table());
        let insert = generate_insert_procedure(&grid).unwrap();
        let update = generate_update_procedure(&grid).unwrap();
        let delete = generate_delete_procedure(&grid);
        for code in ["DUPLICATE_VALUE", "REQUIRED_FIELD_MISSING", "INVALID_REFERENCE"] {
            assert!(insert.contains(code) && update.contains(code) && delete.contains(code));
        }
        assert!(insert.contains("'DB_ERROR'"));
        assert!(update.contains("'UPDATE_ERROR'"));
        assert!(delete.contains("'DELETE_ERROR'"));
        assert!(update.contains("'NOT_FOUND'") && delete.contains("'NOT_FOUND'"));
    }

    #[test]
    fn key_only_table_has_no_update_procedure() {
        let table = TableSchema {
            schema: "public".into(),
            name: "Tag".into(),
            columns: vec![col("Code", "text", 1)],
            primary_keys: vec!["Code".into()],
        };
        let grid = resolve(table);
        let results = generate_crud_procedures(&grid);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(GenerateError::NothingToWrite { .. })));
        assert!(results[2].is_ok());
    }
}
