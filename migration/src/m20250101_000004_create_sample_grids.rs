//! Sample tables with generated grid procedures, registry rows and column
//! metadata, so a fresh install has something to browse.

use chrono::Utc;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
};
use serde_json::json;
use uuid::Uuid;

use gridportal::auth::ADMIN_ROLE;
use gridportal::codegen::{GridDefinition, ProcedureKind, Scaffolder};
use gridportal::entities::{column_metadata, stored_procedure_registry};
use gridportal::services::registry::{upsert_registry_entry, Registration};

const SAMPLE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS "Area" (
    "AreaCode" TEXT PRIMARY KEY,
    "AreaName" TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS "Bus" (
    "BusId" SERIAL PRIMARY KEY,
    "BusName" TEXT NOT NULL,
    "Voltage" NUMERIC(8, 2),
    "InService" BOOLEAN NOT NULL DEFAULT TRUE,
    "AreaCode" TEXT REFERENCES "Area" ("AreaCode"),
    "UpdatedBy" TEXT,
    "updated_at" TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS "Acline" (
    "FromBus" INTEGER NOT NULL REFERENCES "Bus" ("BusId") ON DELETE CASCADE,
    "ToBus" INTEGER NOT NULL REFERENCES "Bus" ("BusId") ON DELETE CASCADE,
    "Circuit" TEXT NOT NULL,
    "RatingMva" NUMERIC(10, 2),
    PRIMARY KEY ("FromBus", "ToBus", "Circuit")
);

CREATE TABLE IF NOT EXISTS "Department" (
    "DepartmentId" SERIAL PRIMARY KEY,
    "Name" TEXT NOT NULL UNIQUE,
    "Code" TEXT,
    "IsActive" BOOLEAN NOT NULL DEFAULT TRUE,
    "CreatedBy" TEXT,
    "created_at" TIMESTAMPTZ
);

INSERT INTO "Area" ("AreaCode", "AreaName") VALUES
    ('N', 'North'), ('S', 'South'), ('E', 'East')
ON CONFLICT DO NOTHING;

INSERT INTO "Bus" ("BusName", "Voltage", "AreaCode")
SELECT * FROM (VALUES
    ('Riverside', 132.00, 'N'),
    ('Hillcrest', 132.00, 'N'),
    ('Harbour', 66.00, 'S'),
    ('Eastgate', 33.00, 'E')
) AS v ("BusName", "Voltage", "AreaCode")
WHERE NOT EXISTS (SELECT 1 FROM "Bus");

INSERT INTO "Acline" ("FromBus", "ToBus", "Circuit", "RatingMva")
SELECT f."BusId", t."BusId", '1', 250.00
FROM "Bus" f JOIN "Bus" t ON f."BusName" = 'Riverside' AND t."BusName" = 'Hillcrest'
ON CONFLICT DO NOTHING;

INSERT INTO "Department" ("Name", "Code") VALUES
    ('Operations', 'OPS'), ('Engineering', 'ENG'), ('Human Resources', 'HR')
ON CONFLICT DO NOTHING;
"#;

const DROP_SAMPLE_TABLES: &str = r#"
DROP TABLE IF EXISTS "Acline";
DROP TABLE IF EXISTS "Bus";
DROP TABLE IF EXISTS "Area";
DROP TABLE IF EXISTS "Department";
"#;

struct SampleGrid {
    table: &'static str,
    display_name: &'static str,
    category: &'static str,
    allowed_roles: &'static [&'static str],
}

const SAMPLE_GRIDS: [SampleGrid; 3] = [
    SampleGrid {
        table: "Bus",
        display_name: "Buses",
        category: "Network",
        allowed_roles: &[],
    },
    SampleGrid {
        table: "Acline",
        display_name: "AC Lines",
        category: "Network",
        allowed_roles: &[],
    },
    SampleGrid {
        table: "Department",
        display_name: "Departments",
        category: "Administration",
        allowed_roles: &[ADMIN_ROLE],
    },
];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(SAMPLE_TABLES).await?;
        println!("✅ Sample tables created");

        let scaffolder = Scaffolder::new(db);
        for grid in &SAMPLE_GRIDS {
            let definition = GridDefinition {
                table_name: grid.table.to_string(),
                ..Default::default()
            };
            let report = scaffolder
                .scaffold(&definition, false)
                .await
                .map_err(|e| DbErr::Custom(format!("Scaffolding {} failed: {}", grid.table, e)))?;
            println!("{}", report.summary());

            if !report.fetch_created() {
                return Err(DbErr::Custom(format!("Fetch procedure for {} was not created", grid.table)));
            }

            let registration = Registration {
                display_name: Some(grid.display_name.to_string()),
                category: Some(grid.category.to_string()),
                allowed_roles: grid.allowed_roles.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            };
            upsert_registry_entry(db, &report.fetch_procedure, grid.display_name, &registration).await?;
        }

        seed_column_metadata(db).await?;
        println!("✅ Sample grids registered");
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        let procedures: Vec<String> = SAMPLE_GRIDS
            .iter()
            .flat_map(|grid| ProcedureKind::ALL.map(|kind| kind.procedure_name(grid.table)))
            .collect();

        for procedure in &procedures {
            db.execute_unprepared(&format!("DROP FUNCTION IF EXISTS {}", procedure))
                .await?;
        }

        column_metadata::Entity::delete_many()
            .filter(column_metadata::Column::ProcedureName.is_in(procedures.clone()))
            .exec(db)
            .await?;
        stored_procedure_registry::Entity::delete_many()
            .filter(stored_procedure_registry::Column::ProcedureName.is_in(procedures))
            .exec(db)
            .await?;

        db.execute_unprepared(DROP_SAMPLE_TABLES).await?;
        Ok(())
    }
}

fn metadata(procedure: &str, column: &str, sort_order: i32) -> column_metadata::ActiveModel {
    column_metadata::ActiveModel {
        id: Set(Uuid::new_v4()),
        procedure_name: Set(procedure.to_string()),
        column_name: Set(column.to_string()),
        display_name: Set(None),
        cell_editor: Set(None),
        is_editable: Set(None),
        is_hidden: Set(None),
        sort_order: Set(sort_order),
        dropdown_source: Set(None),
        static_options: Set(None),
        master_table: Set(None),
        value_column: Set(None),
        label_column: Set(None),
        depends_on: Set(None),
        depends_on_column: Set(None),
        link_target_procedure: Set(None),
        link_filter_mapping: Set(None),
        breadcrumb_template: Set(None),
        max_drill_depth: Set(None),
        stateless_drill: Set(false),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
}

async fn seed_column_metadata(db: &impl ConnectionTrait) -> Result<(), DbErr> {
    let mut bus_name = metadata("sp_Grid_Bus", "BusName", 1);
    bus_name.display_name = Set(Some("Substation".to_string()));
    bus_name.link_target_procedure = Set(Some("sp_Grid_Acline".to_string()));
    bus_name.link_filter_mapping = Set(Some(json!({ "BusId": "FromBus" })));
    bus_name.breadcrumb_template = Set(Some("Lines from {BusName}".to_string()));
    bus_name.max_drill_depth = Set(Some(3));

    let mut area = metadata("sp_Grid_Bus", "AreaCode", 4);
    area.display_name = Set(Some("Area".to_string()));
    area.cell_editor = Set(Some("select".to_string()));
    area.dropdown_source = Set(Some("dynamic".to_string()));
    area.master_table = Set(Some("Area".to_string()));
    area.value_column = Set(Some("AreaCode".to_string()));
    area.label_column = Set(Some("AreaName".to_string()));

    let mut code = metadata("sp_Grid_Department", "Code", 2);
    code.cell_editor = Set(Some("select".to_string()));
    code.dropdown_source = Set(Some("static".to_string()));
    code.static_options = Set(Some(json!(["OPS", "ENG", "HR", "FIN"])));

    let rows = [
        ("sp_Grid_Bus", "BusName", bus_name),
        ("sp_Grid_Bus", "AreaCode", area),
        ("sp_Grid_Department", "Code", code),
    ];
    for (procedure, column, row) in rows {
        let exists = column_metadata::Entity::find()
            .filter(column_metadata::Column::ProcedureName.eq(procedure))
            .filter(column_metadata::Column::ColumnName.eq(column))
            .one(db)
            .await?
            .is_some();
        if !exists {
            row.insert(db).await?;
        }
    }
    Ok(())
}
