//! `sp_Grid_{Entity}` fetch procedure generator.

use serde_json::{json, Map, Value};

use crate::codegen::schema::ResolvedGrid;
use crate::codegen::sql::{
    escape_format, humanize, qualified_table, quote_ident, quote_literal, row_id_expression, CastKind,
};
use crate::grid::naming;

/// Column descriptors embedded in the fetch envelope.
pub fn column_definitions(grid: &ResolvedGrid) -> Value {
    let sole_id_key = grid.primary_keys.len() == 1 && grid.primary_keys[0].name == naming::ROW_ID_FIELD;
    let id_displayed = sole_id_key && grid.display.iter().any(|c| c.name == naming::ROW_ID_FIELD);

    let mut columns = vec![json!({
        "field": naming::ROW_ID_FIELD,
        "headerName": naming::ROW_ID_FIELD,
        "type": "text",
        "editable": false,
        "isPrimaryKey": true,
        "hidden": !id_displayed,
    })];

    for column in grid.display.iter().filter(|c| c.name != naming::ROW_ID_FIELD) {
        let kind = CastKind::for_column(column);
        columns.push(json!({
            "field": column.name,
            "headerName": humanize(&column.name),
            "type": kind.grid_type(),
            "editable": grid.is_editable(column),
            "isPrimaryKey": grid.is_primary_key(column),
            "hidden": false,
        }));
    }

    Value::Array(columns)
}

/// Column name -> `text|number` map driving the filter-model parser. Also
/// the whitelist for sort and filter identifiers.
pub fn filter_type_map(grid: &ResolvedGrid) -> Value {
    let map: Map<String, Value> = grid
        .filterable()
        .iter()
        .map(|c| (c.name.clone(), Value::from(CastKind::for_column(c).filter_type())))
        .collect();
    Value::Object(map)
}

pub fn generate_grid_fetch(grid: &ResolvedGrid) -> String {
    let name = naming::fetch_name(&grid.entity);
    let table = qualified_table(&grid.schema, &grid.table);
    let id_expr = row_id_expression(&grid.primary_keys);

    let select_columns: Vec<String> = std::iter::once(format!("{} AS {}", id_expr, quote_ident(naming::ROW_ID_FIELD)))
        .chain(
            grid.display
                .iter()
                .filter(|c| c.name != naming::ROW_ID_FIELD)
                .map(|c| quote_ident(&c.name)),
        )
        .collect();

    let search_template = grid
        .display
        .iter()
        .map(|c| format!("{}::TEXT ILIKE %1$L", escape_format(&quote_ident(&c.name))))
        .collect::<Vec<_>>()
        .join(" OR ");

    let default_order = grid
        .primary_keys
        .iter()
        .map(|pk| quote_ident(&pk.name))
        .collect::<Vec<_>>()
        .join(", ");

    let rows_prefix = format!(
        "SELECT COALESCE(jsonb_agg(t), '[]'::JSONB) FROM (SELECT {} FROM {} WHERE TRUE",
        select_columns.join(", "),
        table
    );
    let count_prefix = format!("SELECT COUNT(*) FROM {} WHERE TRUE", table);

    format!(
        r#"CREATE OR REPLACE FUNCTION {name}(
    p_page_number INTEGER DEFAULT 1,
    p_page_size INTEGER DEFAULT 50,
    p_start_row INTEGER DEFAULT NULL,
    p_end_row INTEGER DEFAULT NULL,
    p_sort_column TEXT DEFAULT NULL,
    p_sort_direction TEXT DEFAULT 'ASC',
    p_filter_json JSONB DEFAULT NULL,
    p_search_term TEXT DEFAULT NULL
)
RETURNS JSONB
LANGUAGE plpgsql
AS $function$
DECLARE
    v_types CONSTANT JSONB := {types}::JSONB;
    v_columns CONSTANT JSONB := {columns}::JSONB;
    v_where TEXT := '';
    v_order TEXT;
    v_limit INTEGER;
    v_offset INTEGER;
    v_page INTEGER;
    v_total BIGINT;
    v_rows JSONB;
    v_key TEXT;
    v_filter JSONB;
    v_kind TEXT;
    v_op TEXT;
    v_value TEXT;
    v_value_to TEXT;
    v_clause TEXT;
BEGIN
    IF p_search_term IS NOT NULL AND btrim(p_search_term) <> '' THEN
        v_where := v_where || ' AND (' || format({search}, '%' || btrim(p_search_term) || '%') || ')';
    END IF;

    IF p_filter_json IS NOT NULL AND jsonb_typeof(p_filter_json) = 'object' THEN
        FOR v_key, v_filter IN SELECT key, value FROM jsonb_each(p_filter_json) LOOP
            v_kind := v_types ->> v_key;
            CONTINUE WHEN v_kind IS NULL OR jsonb_typeof(v_filter) <> 'object';

            v_op := COALESCE(v_filter ->> 'type', 'contains');
            v_value := v_filter ->> 'filter';
            v_value_to := v_filter ->> 'filterTo';
            v_clause := NULL;

            IF v_op = 'blank' THEN
                v_clause := format('%I IS NULL', v_key);
            ELSIF v_op = 'notBlank' THEN
                v_clause := format('%I IS NOT NULL', v_key);
            ELSIF v_value IS NULL THEN
                v_clause := NULL;
            ELSIF v_kind = 'number' THEN
                v_clause := CASE v_op
                    WHEN 'equals' THEN format('%I = %L::NUMERIC', v_key, v_value)
                    WHEN 'notEqual' THEN format('%I <> %L::NUMERIC', v_key, v_value)
                    WHEN 'greaterThan' THEN format('%I > %L::NUMERIC', v_key, v_value)
                    WHEN 'greaterThanOrEqual' THEN format('%I >= %L::NUMERIC', v_key, v_value)
                    WHEN 'lessThan' THEN format('%I < %L::NUMERIC', v_key, v_value)
                    WHEN 'lessThanOrEqual' THEN format('%I <= %L::NUMERIC', v_key, v_value)
                    WHEN 'inRange' THEN format('%I BETWEEN %L::NUMERIC AND %L::NUMERIC', v_key, v_value, COALESCE(v_value_to, v_value))
                    ELSE NULL
                END;
            ELSE
                v_clause := CASE v_op
                    WHEN 'contains' THEN format('%I::TEXT ILIKE %L', v_key, '%' || v_value || '%')
                    WHEN 'notContains' THEN format('%I::TEXT NOT ILIKE %L', v_key, '%' || v_value || '%')
                    WHEN 'equals' THEN format('%I::TEXT = %L', v_key, v_value)
                    WHEN 'notEqual' THEN format('%I::TEXT <> %L', v_key, v_value)
                    WHEN 'startsWith' THEN format('%I::TEXT ILIKE %L', v_key, v_value || '%')
                    WHEN 'endsWith' THEN format('%I::TEXT ILIKE %L', v_key, '%' || v_value)
                    ELSE NULL
                END;
            END IF;

            IF v_clause IS NOT NULL THEN
                v_where := v_where || ' AND ' || v_clause;
            END IF;
        END LOOP;
    END IF;

    IF p_sort_column IS NOT NULL AND v_types ? p_sort_column THEN
        v_order := format(' ORDER BY %I %s', p_sort_column,
            CASE WHEN upper(COALESCE(p_sort_direction, 'ASC')) = 'DESC' THEN 'DESC' ELSE 'ASC' END);
    ELSE
        v_order := {default_order};
    END IF;

    IF p_start_row IS NOT NULL AND p_end_row IS NOT NULL THEN
        v_offset := GREATEST(p_start_row, 0);
        v_limit := GREATEST(p_end_row - v_offset, 1);
        v_page := (v_offset / v_limit) + 1;
    ELSE
        v_limit := GREATEST(COALESCE(p_page_size, 50), 1);
        v_page := GREATEST(COALESCE(p_page_number, 1), 1);
        v_offset := (v_page - 1) * v_limit;
    END IF;

    EXECUTE {count_prefix} || v_where INTO v_total;

    EXECUTE {rows_prefix} || v_where || v_order
        || format(' LIMIT %s OFFSET %s) t', v_limit, v_offset)
        INTO v_rows;

    RETURN jsonb_build_object(
        'success', TRUE,
        'rows', v_rows,
        'columns', v_columns,
        'totalCount', v_total,
        'pageNumber', v_page,
        'pageSize', v_limit,
        'totalPages', CEIL(v_total::NUMERIC / v_limit)::INTEGER
    );
EXCEPTION
    WHEN OTHERS THEN
        RETURN jsonb_build_object(
            'success', FALSE,
            'rows', '[]'::JSONB,
            'columns', v_columns,
            'totalCount', 0,
            'pageNumber', COALESCE(p_page_number, 1),
            'pageSize', COALESCE(p_page_size, 50),
            'totalPages', 0,
            'errorCode', 'DB_ERROR',
            'message', SQLERRM
        );
END;
$function$;"#,
        name = name,
        types = quote_literal(&filter_type_map(grid).to_string()),
        columns = quote_literal(&column_definitions(grid).to_string()),
        search = quote_literal(&search_template),
        default_order = quote_literal(&format!(" ORDER BY {}", default_order)),
        count_prefix = quote_literal(&count_prefix),
        rows_prefix = quote_literal(&rows_prefix),
    )
}
