use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250101_000001_create_identity_tables::User;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoredProcedureRegistry::Table)
                    .if_not_exists()
                    .col(pk_uuid(StoredProcedureRegistry::Id))
                    .col(string(StoredProcedureRegistry::ProcedureName).unique_key())
                    .col(string(StoredProcedureRegistry::DisplayName))
                    .col(string_null(StoredProcedureRegistry::Category))
                    .col(text_null(StoredProcedureRegistry::Description))
                    .col(string_null(StoredProcedureRegistry::DatabaseName))
                    .col(boolean(StoredProcedureRegistry::IsActive).default(true))
                    .col(boolean(StoredProcedureRegistry::RequiresAuth).default(true))
                    .col(json_binary(StoredProcedureRegistry::AllowedRoles).default(Expr::cust("'[]'::jsonb")))
                    .col(integer(StoredProcedureRegistry::DefaultPageSize).default(50))
                    .col(integer(StoredProcedureRegistry::MaxPageSize).default(1000))
                    .col(integer(StoredProcedureRegistry::CacheDurationSeconds).default(0))
                    .col(timestamp_with_time_zone(StoredProcedureRegistry::CreatedAt))
                    .col(timestamp_with_time_zone(StoredProcedureRegistry::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ColumnMetadata::Table)
                    .if_not_exists()
                    .col(pk_uuid(ColumnMetadata::Id))
                    .col(string(ColumnMetadata::ProcedureName))
                    .col(string(ColumnMetadata::ColumnName))
                    .col(string_null(ColumnMetadata::DisplayName))
                    .col(string_null(ColumnMetadata::CellEditor))
                    .col(boolean_null(ColumnMetadata::IsEditable))
                    .col(boolean_null(ColumnMetadata::IsHidden))
                    .col(integer(ColumnMetadata::SortOrder).default(0))
                    .col(string_null(ColumnMetadata::DropdownSource))
                    .col(json_binary_null(ColumnMetadata::StaticOptions))
                    .col(string_null(ColumnMetadata::MasterTable))
                    .col(string_null(ColumnMetadata::ValueColumn))
                    .col(string_null(ColumnMetadata::LabelColumn))
                    .col(string_null(ColumnMetadata::DependsOn))
                    .col(string_null(ColumnMetadata::DependsOnColumn))
                    .col(string_null(ColumnMetadata::LinkTargetProcedure))
                    .col(json_binary_null(ColumnMetadata::LinkFilterMapping))
                    .col(string_null(ColumnMetadata::BreadcrumbTemplate))
                    .col(integer_null(ColumnMetadata::MaxDrillDepth))
                    .col(boolean(ColumnMetadata::StatelessDrill).default(false))
                    .col(timestamp_with_time_zone(ColumnMetadata::CreatedAt))
                    .col(timestamp_with_time_zone(ColumnMetadata::UpdatedAt))
                    .index(
                        Index::create()
                            .name("idx-column-metadata-procedure-column")
                            .col(ColumnMetadata::ProcedureName)
                            .col(ColumnMetadata::ColumnName)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(GridColumnState::Table)
                    .if_not_exists()
                    .col(pk_uuid(GridColumnState::Id))
                    .col(uuid(GridColumnState::UserId))
                    .col(string(GridColumnState::ProcedureName))
                    .col(json_binary(GridColumnState::ColumnState))
                    .col(timestamp_with_time_zone(GridColumnState::CreatedAt))
                    .col(timestamp_with_time_zone(GridColumnState::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-grid-column-state-user")
                            .from(GridColumnState::Table, GridColumnState::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .index(
                        Index::create()
                            .name("idx-grid-column-state-user-procedure")
                            .col(GridColumnState::UserId)
                            .col(GridColumnState::ProcedureName)
                            .unique(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GridColumnState::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ColumnMetadata::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StoredProcedureRegistry::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum StoredProcedureRegistry {
    Table,
    Id,
    ProcedureName,
    DisplayName,
    Category,
    Description,
    DatabaseName,
    IsActive,
    RequiresAuth,
    AllowedRoles,
    DefaultPageSize,
    MaxPageSize,
    CacheDurationSeconds,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ColumnMetadata {
    Table,
    Id,
    ProcedureName,
    ColumnName,
    DisplayName,
    CellEditor,
    IsEditable,
    IsHidden,
    SortOrder,
    DropdownSource,
    StaticOptions,
    MasterTable,
    ValueColumn,
    LabelColumn,
    DependsOn,
    DependsOnColumn,
    LinkTargetProcedure,
    LinkFilterMapping,
    BreadcrumbTemplate,
    MaxDrillDepth,
    StatelessDrill,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum GridColumnState {
    Table,
    Id,
    UserId,
    ProcedureName,
    ColumnState,
    CreatedAt,
    UpdatedAt,
}
