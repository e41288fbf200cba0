use std::env;

use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use gridportal::auth::ADMIN_ROLE;
use gridportal::entities::{role, user};
use gridportal::services::DEFAULT_ROLE;

use crate::seed_helpers::{ensure_role, ensure_user_role};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        println!("🌱 Seeding roles...");
        let admin_role_id = ensure_role(db, ADMIN_ROLE, "Full access, including role management and grid scaffolding").await?;
        ensure_role(db, DEFAULT_ROLE, "Standard portal user").await?;

        // Only seed the admin user when credentials are provided
        let admin_email = match env::var("ADMIN_EMAIL") {
            Ok(email) => email.trim().to_lowercase(),
            Err(_) => {
                println!("⚠️  ADMIN_EMAIL not set, skipping admin user creation");
                return Ok(());
            }
        };
        let admin_password = match env::var("ADMIN_PASSWORD") {
            Ok(password) => password,
            Err(_) => {
                println!("⚠️  ADMIN_PASSWORD not set, skipping admin user creation");
                return Ok(());
            }
        };

        let existing_user = user::Entity::find()
            .filter(user::Column::Email.eq(&admin_email))
            .one(db)
            .await?;

        let admin_id = match existing_user {
            Some(existing) => {
                println!("✅ Admin user already exists");
                existing.id
            }
            None => {
                let password_hash = hash(&admin_password, DEFAULT_COST)
                    .map_err(|e| DbErr::Custom(format!("Failed to hash password: {}", e)))?;

                let admin = user::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    email: Set(admin_email.clone()),
                    password_hash: Set(password_hash),
                    first_name: Set(Some(env::var("ADMIN_FIRST_NAME").unwrap_or_else(|_| "Admin".to_string()))),
                    last_name: Set(Some(env::var("ADMIN_LAST_NAME").unwrap_or_else(|_| "User".to_string()))),
                    is_active: Set(true),
                    refresh_token: Set(None),
                    refresh_token_expires_at: Set(None),
                    created_at: Set(Utc::now().into()),
                    updated_at: Set(Utc::now().into()),
                }
                .insert(db)
                .await?;
                println!("✅ Admin user created: {}", admin_email);
                admin.id
            }
        };

        ensure_user_role(db, admin_id, admin_role_id).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        if let Ok(admin_email) = env::var("ADMIN_EMAIL") {
            user::Entity::delete_many()
                .filter(user::Column::Email.eq(admin_email.trim().to_lowercase()))
                .exec(db)
                .await?;
        }

        role::Entity::delete_many()
            .filter(role::Column::Name.is_in([ADMIN_ROLE, DEFAULT_ROLE]))
            .exec(db)
            .await?;
        Ok(())
    }
}
