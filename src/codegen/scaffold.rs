//! Runs generated procedures against a database, one step at a time.

use sea_orm::{ConnectionTrait, Statement};
use serde::Serialize;
use tracing::{info, warn};

use crate::codegen::schema::{introspect_table, GridDefinition, ResolvedGrid};
use crate::codegen::{generate, GenerateError, ProcedureKind};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldStep {
    pub kind: ProcedureKind,
    pub procedure_name: String,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScaffoldReport {
    pub schema_name: String,
    pub table_name: String,
    pub fetch_procedure: String,
    pub steps: Vec<ScaffoldStep>,
    pub registered: bool,
}

impl ScaffoldReport {
    pub fn fetch_created(&self) -> bool {
        self.steps
            .iter()
            .any(|step| step.kind == ProcedureKind::Fetch && step.success)
    }

    /// One line per step, e.g. `fetch sp_Grid_Bus: OK`.
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .steps
            .iter()
            .map(|step| {
                if step.success {
                    format!("{} {}: OK", step.kind, step.procedure_name)
                } else {
                    format!("{} {}: FAILED ({})", step.kind, step.procedure_name, step.message)
                }
            })
            .collect();
        if self.registered {
            lines.push(format!("registry {}: OK", self.fetch_procedure));
        }
        lines.join("\n")
    }
}

pub struct Scaffolder<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> Scaffolder<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    pub async fn resolve(&self, definition: &GridDefinition) -> Result<ResolvedGrid, GenerateError> {
        let table = introspect_table(self.db, definition.schema(), &definition.table_name).await?;
        ResolvedGrid::resolve(&table, definition)
    }

    /// Creates the grid procedures. Each step is independent: a failed step is
    /// recorded and the remaining steps still run. With `dry_run` nothing is
    /// executed and the generated SQL is returned instead.
    pub async fn scaffold(
        &self,
        definition: &GridDefinition,
        dry_run: bool,
    ) -> Result<ScaffoldReport, GenerateError> {
        let grid = self.resolve(definition).await?;
        let mut steps = Vec::new();

        for kind in ProcedureKind::ALL {
            let procedure_name = kind.procedure_name(&grid.entity);

            let procedure = match generate(&grid, kind) {
                Ok(procedure) => procedure,
                Err(e) => {
                    warn!("Skipping {} for {}: {}", kind, grid.table, e);
                    steps.push(ScaffoldStep {
                        kind,
                        procedure_name,
                        success: false,
                        message: e.to_string(),
                        sql: None,
                    });
                    continue;
                }
            };

            if dry_run {
                steps.push(ScaffoldStep {
                    kind,
                    procedure_name,
                    success: true,
                    message: "Generated (dry run)".to_string(),
                    sql: Some(procedure.sql),
                });
                continue;
            }

            let statement = Statement::from_string(self.db.get_database_backend(), procedure.sql);
            match self.db.execute(statement).await {
                Ok(_) => {
                    info!("Created {}", procedure.name);
                    steps.push(ScaffoldStep {
                        kind,
                        procedure_name,
                        success: true,
                        message: "Created".to_string(),
                        sql: None,
                    });
                }
                Err(e) => {
                    warn!("Failed to create {}: {}", procedure.name, e);
                    steps.push(ScaffoldStep {
                        kind,
                        procedure_name,
                        success: false,
                        message: e.to_string(),
                        sql: None,
                    });
                }
            }
        }

        Ok(ScaffoldReport {
            schema_name: grid.schema.clone(),
            table_name: grid.table.clone(),
            fetch_procedure: ProcedureKind::Fetch.procedure_name(&grid.entity),
            steps,
            registered: false,
        })
    }
}
