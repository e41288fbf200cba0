//! Table introspection and grid column resolution.

use sea_orm::{ConnectionTrait, DbBackend, Statement};
use serde::Deserialize;

use crate::codegen::GenerateError;
use crate::grid::naming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub udt_schema: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub has_default: bool,
    pub ordinal: i32,
}

/// A table as seen through `information_schema`, names in their stored case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub primary_keys: Vec<String>,
}

impl TableSchema {
    fn find(&self, requested: &str) -> Option<&ColumnInfo> {
        self.columns
            .iter()
            .find(|c| c.name == requested)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(requested)))
    }
}

/// What the caller asks the scaffolder to build. Empty lists mean "derive".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridDefinition {
    #[serde(default)]
    pub schema_name: Option<String>,
    pub table_name: String,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub display_columns: Vec<String>,
    #[serde(default)]
    pub editable_columns: Vec<String>,
}

impl GridDefinition {
    pub fn schema(&self) -> &str {
        self.schema_name.as_deref().unwrap_or("public")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditColumns {
    pub created_by: Option<ColumnInfo>,
    pub created_at: Option<ColumnInfo>,
    pub updated_by: Option<ColumnInfo>,
    pub updated_at: Option<ColumnInfo>,
}

impl AuditColumns {
    fn detect(columns: &[ColumnInfo]) -> Self {
        let find = |wanted: &str| {
            columns
                .iter()
                .find(|c| c.name.replace('_', "").eq_ignore_ascii_case(wanted))
                .cloned()
        };
        Self {
            created_by: find("createdby"),
            created_at: find("createdat"),
            updated_by: find("updatedby"),
            updated_at: find("updatedat"),
        }
    }

    fn contains(&self, column: &ColumnInfo) -> bool {
        [&self.created_by, &self.created_at, &self.updated_by, &self.updated_at]
            .iter()
            .any(|audit| audit.as_ref().is_some_and(|a| a.name == column.name))
    }
}

/// Everything the generators need, with every column name resolved.
#[derive(Debug, Clone)]
pub struct ResolvedGrid {
    pub schema: String,
    pub table: String,
    /// Suffix used in the `sp_Grid_*` procedure names.
    pub entity: String,
    pub primary_keys: Vec<ColumnInfo>,
    pub display: Vec<ColumnInfo>,
    /// Columns the update procedure may change (never primary keys).
    pub editable: Vec<ColumnInfo>,
    /// Columns the insert procedure accepts from the client.
    pub insertable: Vec<ColumnInfo>,
    pub audit: AuditColumns,
}

impl ResolvedGrid {
    pub fn resolve(table: &TableSchema, definition: &GridDefinition) -> Result<Self, GenerateError> {
        if table.columns.is_empty() {
            return Err(GenerateError::TableNotFound(format!(
                "{}.{}",
                definition.schema(),
                definition.table_name
            )));
        }

        let lookup = |names: &[String]| -> Result<Vec<ColumnInfo>, GenerateError> {
            let mut resolved: Vec<ColumnInfo> = Vec::with_capacity(names.len());
            for name in names {
                let column = table
                    .find(name.trim())
                    .ok_or_else(|| GenerateError::UnknownColumn {
                        table: table.name.clone(),
                        column: name.clone(),
                    })?;
                if !resolved.iter().any(|c| c.name == column.name) {
                    resolved.push(column.clone());
                }
            }
            Ok(resolved)
        };

        let primary_keys = if definition.primary_keys.is_empty() {
            lookup(&table.primary_keys)?
        } else {
            lookup(&definition.primary_keys)?
        };
        if primary_keys.is_empty() {
            return Err(GenerateError::NoPrimaryKey(table.name.clone()));
        }

        let display = if definition.display_columns.is_empty() {
            table.columns.clone()
        } else {
            lookup(&definition.display_columns)?
        };

        let sole_id_key = primary_keys.len() == 1 && primary_keys[0].name == naming::ROW_ID_FIELD;
        if !sole_id_key && display.iter().any(|c| c.name == naming::ROW_ID_FIELD) {
            return Err(GenerateError::ReservedColumn(naming::ROW_ID_FIELD.to_string()));
        }

        let audit = AuditColumns::detect(&table.columns);
        let is_key = |c: &ColumnInfo| primary_keys.iter().any(|pk| pk.name == c.name);

        let requested_editable = if definition.editable_columns.is_empty() {
            table.columns.clone()
        } else {
            lookup(&definition.editable_columns)?
        };
        let editable: Vec<ColumnInfo> = requested_editable
            .into_iter()
            .filter(|c| !is_key(c) && !audit.contains(c))
            .collect();

        // Keys are client-supplied on insert unless the database generates them.
        let mut insertable: Vec<ColumnInfo> = primary_keys
            .iter()
            .filter(|pk| !pk.has_default)
            .cloned()
            .chain(editable.iter().cloned())
            .collect();
        insertable.sort_by_key(|c| c.ordinal);

        Ok(Self {
            schema: table.schema.clone(),
            table: table.name.clone(),
            entity: naming::entity_suffix(&table.name),
            primary_keys,
            display,
            editable,
            insertable,
            audit,
        })
    }

    pub fn is_primary_key(&self, column: &ColumnInfo) -> bool {
        self.primary_keys.iter().any(|pk| pk.name == column.name)
    }

    pub fn is_editable(&self, column: &ColumnInfo) -> bool {
        self.editable.iter().any(|c| c.name == column.name)
    }

    /// Display columns plus any key column not already shown, in table order.
    pub fn filterable(&self) -> Vec<ColumnInfo> {
        let mut columns = self.display.clone();
        for pk in &self.primary_keys {
            if !columns.iter().any(|c| c.name == pk.name) {
                columns.push(pk.clone());
            }
        }
        columns
    }
}

/// Reads column and primary-key metadata for a table. The table name is
/// matched case-insensitively within the schema.
pub async fn introspect_table<C>(db: &C, schema: &str, table: &str) -> Result<TableSchema, GenerateError>
where
    C: ConnectionTrait,
{
    let columns_stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"SELECT c.table_schema::TEXT AS table_schema,
                  c.table_name::TEXT AS table_name,
                  c.column_name::TEXT AS column_name,
                  c.data_type::TEXT AS data_type,
                  c.udt_schema::TEXT AS udt_schema,
                  c.udt_name::TEXT AS udt_name,
                  (c.is_nullable = 'YES') AS is_nullable,
                  (c.column_default IS NOT NULL OR c.is_identity = 'YES') AS has_default,
                  c.ordinal_position::INTEGER AS ordinal_position
           FROM information_schema.columns c
           WHERE lower(c.table_schema) = lower($1) AND lower(c.table_name) = lower($2)
           ORDER BY c.ordinal_position"#,
        [schema.into(), table.into()],
    );

    let rows = db.query_all(columns_stmt).await?;
    let Some(first) = rows.first() else {
        return Err(GenerateError::TableNotFound(format!("{}.{}", schema, table)));
    };
    let table_schema: String = first.try_get("", "table_schema")?;
    let table_name: String = first.try_get("", "table_name")?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        // Same name in two schemas differing only by case: keep the first match.
        let row_table: String = row.try_get("", "table_name")?;
        let row_schema: String = row.try_get("", "table_schema")?;
        if row_table != table_name || row_schema != table_schema {
            continue;
        }
        columns.push(ColumnInfo {
            name: row.try_get("", "column_name")?,
            data_type: row.try_get("", "data_type")?,
            udt_schema: row.try_get("", "udt_schema")?,
            udt_name: row.try_get("", "udt_name")?,
            is_nullable: row.try_get("", "is_nullable")?,
            has_default: row.try_get("", "has_default")?,
            ordinal: row.try_get("", "ordinal_position")?,
        });
    }

    let keys_stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        r#"SELECT kcu.column_name::TEXT AS column_name
           FROM information_schema.table_constraints tc
           JOIN information_schema.key_column_usage kcu
             ON tc.constraint_name = kcu.constraint_name
            AND tc.table_schema = kcu.table_schema
            AND tc.table_name = kcu.table_name
           WHERE tc.constraint_type = 'PRIMARY KEY'
             AND tc.table_schema = $1
             AND tc.table_name = $2
           ORDER BY kcu.ordinal_position"#,
        [table_schema.clone().into(), table_name.clone().into()],
    );
    let primary_keys = db
        .query_all(keys_stmt)
        .await?
        .iter()
        .map(|row| row.try_get::<String>("", "column_name"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TableSchema {
        schema: table_schema,
        name: table_name,
        columns,
        primary_keys,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn col(name: &str, data_type: &str, ordinal: i32) -> ColumnInfo {
        let udt = match data_type {
            "integer" => "int4",
            "numeric" => "numeric",
            "boolean" => "bool",
            "uuid" => "uuid",
            "timestamp with time zone" => "timestamptz",
            _ => "text",
        };
        ColumnInfo {
            name: name.to_string(),
            data_type: data_type.to_string(),
            udt_schema: "pg_catalog".to_string(),
            udt_name: udt.to_string(),
            is_nullable: true,
            has_default: false,
            ordinal,
        }
    }

    pub(crate) fn bus_table() -> TableSchema {
        let mut bus_id = col("BusId", "integer", 1);
        bus_id.has_default = true;
        bus_id.is_nullable = false;
        TableSchema {
            schema: "public".into(),
            name: "Bus".into(),
            columns: vec![
                bus_id,
                col("BusName", "text", 2),
                col("Voltage", "numeric", 3),
                col("InService", "boolean", 4),
                col("UpdatedBy", "text", 5),
                col("updated_at", "timestamp with time zone", 6),
            ],
            primary_keys: vec!["BusId".into()],
        }
    }

    pub(crate) fn acline_table() -> TableSchema {
        TableSchema {
            schema: "public".into(),
            name: "Acline".into(),
            columns: vec![
                col("FromBus", "integer", 1),
                col("ToBus", "integer", 2),
                col("Circuit", "text", 3),
                col("RatingMva", "numeric", 4),
            ],
            primary_keys: vec!["FromBus".into(), "ToBus".into(), "Circuit".into()],
        }
    }

    fn definition(table: &str) -> GridDefinition {
        GridDefinition {
            table_name: table.into(),
            ..Default::default()
        }
    }

    #[test]
    fn derives_keys_and_columns_from_introspection() {
        let grid = ResolvedGrid::resolve(&bus_table(), &definition("bus")).unwrap();
        assert_eq!(grid.table, "Bus");
        assert_eq!(grid.entity, "Bus");
        assert_eq!(grid.primary_keys[0].name, "BusId");
        assert_eq!(grid.display.len(), 6);
        let editable: Vec<&str> = grid.editable.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(editable, vec!["BusName", "Voltage", "InService"]);
        // Serial key is generated by the database.
        assert!(grid.insertable.iter().all(|c| c.name != "BusId"));
        assert_eq!(grid.audit.updated_by.as_ref().unwrap().name, "UpdatedBy");
        assert_eq!(grid.audit.updated_at.as_ref().unwrap().name, "updated_at");
    }

    #[test]
    fn resolves_requested_names_case_insensitively() {
        let def = GridDefinition {
            table_name: "Acline".into(),
            primary_keys: vec!["frombus".into(), "TOBUS".into(), "circuit".into()],
            display_columns: vec!["ratingmva".into()],
            editable_columns: vec!["RatingMva".into(), "FromBus".into()],
            ..Default::default()
        };
        let grid = ResolvedGrid::resolve(&acline_table(), &def).unwrap();
        let keys: Vec<&str> = grid.primary_keys.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(keys, vec!["FromBus", "ToBus", "Circuit"]);
        assert_eq!(grid.editable.len(), 1);
        assert_eq!(grid.insertable.len(), 4);
        assert_eq!(grid.filterable().len(), 4);
    }

    #[test]
    fn rejects_unknown_columns() {
        let def = GridDefinition {
            table_name: "Bus".into(),
            display_columns: vec!["Nope".into()],
            ..Default::default()
        };
        assert!(matches!(
            ResolvedGrid::resolve(&bus_table(), &def),
            Err(GenerateError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn requires_a_primary_key() {
        let mut table = acline_table();
        table.primary_keys.clear();
        assert!(matches!(
            ResolvedGrid::resolve(&table, &definition("Acline")),
            Err(GenerateError::NoPrimaryKey(_))
        ));
    }

    #[test]
    fn reserves_the_synthetic_id_column() {
        let mut table = acline_table();
        table.columns.push(col("Id", "integer", 5));
        assert!(matches!(
            ResolvedGrid::resolve(&table, &definition("Acline")),
            Err(GenerateError::ReservedColumn(_))
        ));
    }
}
