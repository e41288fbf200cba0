use chrono::Utc;
use sea_orm_migration::sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use gridportal::entities::{role, user_role};

/// Returns the id of role `name`, creating it when missing.
pub async fn ensure_role(
    db: &impl ConnectionTrait,
    name: &str,
    description: &str,
) -> Result<Uuid, DbErr> {
    if let Some(existing) = role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(existing.id);
    }

    let role = role::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some(description.to_string())),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    println!("✅ Created role: {}", name);
    Ok(role.id)
}

/// Links `user_id` to `role_id` unless the link already exists.
pub async fn ensure_user_role(
    db: &impl ConnectionTrait,
    user_id: Uuid,
    role_id: Uuid,
) -> Result<(), DbErr> {
    let existing = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(user_role::Column::RoleId.eq(role_id))
        .one(db)
        .await?;

    if existing.is_none() {
        user_role::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            role_id: Set(role_id),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;
    }
    Ok(())
}
