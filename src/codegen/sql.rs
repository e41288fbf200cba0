//! SQL text helpers shared by the procedure generators.

use crate::codegen::schema::ColumnInfo;

/// Separator between primary-key values inside a composite row id.
pub const ROW_ID_SEPARATOR: char = '_';

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escapes `%` so the text can sit inside a `format()` template.
pub fn escape_format(value: &str) -> String {
    value.replace('%', "%%")
}

pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// How a JSON text value is turned into a column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastKind {
    Integer,
    BigInt,
    Numeric,
    Boolean,
    Date,
    Timestamp,
    TimestampTz,
    /// Character types: raw text, empty strings are kept.
    Text,
    /// Anything else, cast to its own (schema-qualified) type.
    Other(String),
}

impl CastKind {
    pub fn for_column(column: &ColumnInfo) -> Self {
        match column.data_type.to_ascii_lowercase().as_str() {
            "integer" | "smallint" => CastKind::Integer,
            "bigint" => CastKind::BigInt,
            "numeric" | "decimal" | "real" | "double precision" | "money" => CastKind::Numeric,
            "boolean" => CastKind::Boolean,
            "date" => CastKind::Date,
            "timestamp without time zone" | "timestamp" => CastKind::Timestamp,
            "timestamp with time zone" => CastKind::TimestampTz,
            "text" | "character varying" | "character" | "varchar" | "char" => CastKind::Text,
            _ => CastKind::Other(format!(
                "{}.{}",
                quote_ident(&column.udt_schema),
                quote_ident(&column.udt_name)
            )),
        }
    }

    pub fn cast_suffix(&self) -> String {
        match self {
            CastKind::Integer => "::INTEGER".to_string(),
            CastKind::BigInt => "::BIGINT".to_string(),
            CastKind::Numeric => "::NUMERIC".to_string(),
            CastKind::Boolean => "::BOOLEAN".to_string(),
            CastKind::Date => "::DATE".to_string(),
            CastKind::Timestamp => "::TIMESTAMP".to_string(),
            CastKind::TimestampTz => "::TIMESTAMPTZ".to_string(),
            CastKind::Text => String::new(),
            CastKind::Other(type_name) => format!("::{}", type_name),
        }
    }

    pub fn blank_is_null(&self) -> bool {
        !matches!(self, CastKind::Text)
    }

    /// Filter family used by the fetch procedure's filter-model parser.
    pub fn filter_type(&self) -> &'static str {
        match self {
            CastKind::Integer | CastKind::BigInt | CastKind::Numeric => "number",
            _ => "text",
        }
    }

    /// Column type reported to the grid.
    pub fn grid_type(&self) -> &'static str {
        match self {
            CastKind::Integer | CastKind::BigInt | CastKind::Numeric => "number",
            CastKind::Boolean => "boolean",
            CastKind::Date => "date",
            CastKind::Timestamp | CastKind::TimestampTz => "dateTime",
            CastKind::Text | CastKind::Other(_) => "text",
        }
    }
}

/// `p_json ->> 'Col'`, with blank handling applied but no cast.
pub fn json_text(json_var: &str, column: &ColumnInfo) -> String {
    let kind = CastKind::for_column(column);
    let raw = format!("{} ->> {}", json_var, quote_literal(&column.name));
    if kind.blank_is_null() {
        format!("NULLIF({}, '')", raw)
    } else {
        format!("({})", raw)
    }
}

/// Typed column value drawn from a JSON object variable.
pub fn json_value(json_var: &str, column: &ColumnInfo) -> String {
    let kind = CastKind::for_column(column);
    format!("{}{}", json_text(json_var, column), kind.cast_suffix())
}

/// Row id expression: primary-key values as text joined by the separator.
pub fn row_id_expression(primary_keys: &[ColumnInfo]) -> String {
    primary_keys
        .iter()
        .map(|pk| format!("{}::TEXT", quote_ident(&pk.name)))
        .collect::<Vec<_>>()
        .join(&format!(" || {} || ", quote_literal(&ROW_ID_SEPARATOR.to_string())))
}

/// WHERE predicate matching a row id. Composite keys are compared position by
/// position against `parts_var`, scalar keys against `id_var` as a whole.
pub fn row_id_predicate(primary_keys: &[ColumnInfo], id_var: &str, parts_var: &str) -> String {
    if primary_keys.len() == 1 {
        return format!("{}::TEXT = {}", quote_ident(&primary_keys[0].name), id_var);
    }
    primary_keys
        .iter()
        .enumerate()
        .map(|(index, pk)| format!("{}::TEXT = {}[{}]", quote_ident(&pk.name), parts_var, index + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// PL/pgSQL guard that splits a composite row id and rejects wrong arity.
/// Empty for scalar keys.
pub fn row_id_split(primary_keys: &[ColumnInfo], id_var: &str, parts_var: &str) -> String {
    if primary_keys.len() < 2 {
        return String::new();
    }
    format!(
        "    {parts} := string_to_array({id}, {sep});\n    IF COALESCE(array_length({parts}, 1), 0) <> {arity} THEN\n        RETURN jsonb_build_object('success', FALSE, 'message', {message}, 'errorCode', 'INVALID_KEY_FORMAT');\n    END IF;\n\n",
        parts = parts_var,
        id = id_var,
        sep = quote_literal(&ROW_ID_SEPARATOR.to_string()),
        arity = primary_keys.len(),
        message = quote_literal(&format!(
            "Row id must contain {} key parts separated by '{}'",
            primary_keys.len(),
            ROW_ID_SEPARATOR
        )),
    )
}

/// "BusName" -> "Bus Name", "line_rating" -> "Line Rating"
pub fn humanize(name: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if ch == '_' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, udt: &str) -> ColumnInfo {
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: udt.to_string(),
            is_nullable: true,
            has_default: false,
            ordinal: 1,
        }
    }

    #[test]
    fn quotes_identifiers_and_literals() {
        assert_eq!(quote_ident("Bus\"Name"), "\"Bus\"\"Name\"");
        assert_eq!(quote_literal("O'Hare"), "'O''Hare'");
        assert_eq!(qualified_table("public", "Bus"), "\"public\".\"Bus\"");
    }

    #[test]
    fn maps_information_schema_types_to_casts() {
        assert_eq!(CastKind::for_column(&column("a", "integer", "int4")).cast_suffix(), "::INTEGER");
        assert_eq!(CastKind::for_column(&column("a", "numeric", "numeric")).cast_suffix(), "::NUMERIC");
        assert_eq!(CastKind::for_column(&column("a", "boolean", "bool")).cast_suffix(), "::BOOLEAN");
        assert_eq!(CastKind::for_column(&column("a", "date", "date")).cast_suffix(), "::DATE");
        assert_eq!(
            CastKind::for_column(&column("a", "timestamp without time zone", "timestamp")).cast_suffix(),
            "::TIMESTAMP"
        );
        assert_eq!(CastKind::for_column(&column("a", "character varying", "varchar")).cast_suffix(), "");
        assert_eq!(
            CastKind::for_column(&column("a", "uuid", "uuid")).cast_suffix(),
            "::\"pg_catalog\".\"uuid\""
        );
    }

    #[test]
    fn blank_strings_become_null_only_for_non_text() {
        let voltage = column("Voltage", "numeric", "numeric");
        let name = column("BusName", "text", "text");
        assert_eq!(
            json_value("p_changes", &voltage),
            "NULLIF(p_changes ->> 'Voltage', '')::NUMERIC"
        );
        assert_eq!(json_value("p_changes", &name), "(p_changes ->> 'BusName')");
    }

    #[test]
    fn row_id_expression_and_predicate_agree_on_key_order() {
        let pks = vec![column("BusId", "integer", "int4"), column("Area", "text", "text")];
        assert_eq!(row_id_expression(&pks), "\"BusId\"::TEXT || '_' || \"Area\"::TEXT");
        assert_eq!(
            row_id_predicate(&pks, "p_id", "v_parts"),
            "\"BusId\"::TEXT = v_parts[1] AND \"Area\"::TEXT = v_parts[2]"
        );
        assert!(row_id_split(&pks, "p_id", "v_parts").contains("<> 2 THEN"));
    }

    #[test]
    fn scalar_keys_compare_the_whole_id() {
        let pks = vec![column("EmployeeId", "integer", "int4")];
        assert_eq!(row_id_expression(&pks), "\"EmployeeId\"::TEXT");
        assert_eq!(row_id_predicate(&pks, "p_id", "v_parts"), "\"EmployeeId\"::TEXT = p_id");
        assert!(row_id_split(&pks, "p_id", "v_parts").is_empty());
    }

    #[test]
    fn humanizes_column_names() {
        assert_eq!(humanize("BusName"), "Bus Name");
        assert_eq!(humanize("line_rating_mva"), "Line Rating Mva");
        assert_eq!(humanize("Id"), "Id");
    }
}
