use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::JwtService;
use crate::entities::{prelude::*, role, user, user_role};
use crate::error::{AppError, AppResult};

/// Role every self-registered user starts with.
pub const DEFAULT_ROLE: &str = "User";

/// Issued on login and refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: user::Model,
    pub access_token: String,
    pub refresh_token: String,
    pub roles: Vec<String>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    jwt_service: JwtService,
}

impl UserService {
    pub fn new(db: Arc<DatabaseConnection>, jwt_service: JwtService) -> Self {
        Self { db, jwt_service }
    }

    pub async fn register_user(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> AppResult<user::Model> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::BadRequest("A valid email is required".to_string()));
        }
        if password.len() < 8 {
            return Err(AppError::BadRequest(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let tx = self.db.begin().await?;

        if User::find()
            .filter(user::Column::Email.eq(&email))
            .one(&tx)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("User with this email already exists".to_string()));
        }

        let password_hash = hash(password, DEFAULT_COST)?;
        let now = Utc::now();

        let user = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            password_hash: Set(password_hash),
            first_name: Set(first_name),
            last_name: Set(last_name),
            is_active: Set(true),
            refresh_token: Set(None),
            refresh_token_expires_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&tx)
        .await?;

        if let Some(default_role) = Role::find()
            .filter(role::Column::Name.eq(DEFAULT_ROLE))
            .one(&tx)
            .await?
        {
            user_role::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.id),
                role_id: Set(default_role.id),
                created_at: Set(now.into()),
            }
            .insert(&tx)
            .await?;
        }

        tx.commit().await?;

        info!("Registered user {}", user.email);
        Ok(user)
    }

    pub async fn authenticate_user(&self, email: &str, password: &str) -> AppResult<AuthSession> {
        let invalid = || AppError::InvalidCredentials("Invalid email or password".to_string());

        let user = User::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid)?;

        if !user.is_active || !verify(password, &user.password_hash)? {
            return Err(invalid());
        }

        self.issue_session(user).await
    }

    /// Exchanges a valid refresh token for a new session, rotating the token.
    pub async fn refresh_token(&self, refresh_token: &str) -> AppResult<AuthSession> {
        let invalid = || AppError::InvalidCredentials("Invalid or expired refresh token".to_string());

        let user = User::find()
            .filter(user::Column::RefreshToken.eq(refresh_token))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(invalid)?;

        let expired = user
            .refresh_token_expires_at
            .map(|expires_at| expires_at < Utc::now())
            .unwrap_or(true);
        if expired || !user.is_active {
            return Err(invalid());
        }

        self.issue_session(user).await
    }

    async fn issue_session(&self, user: user::Model) -> AppResult<AuthSession> {
        let roles = role_names(self.db.as_ref(), user.id).await?;
        let access_token = self
            .jwt_service
            .generate_token(user.id, &user.email, roles.clone())?;
        let (refresh_token, expires_at) = self.jwt_service.generate_refresh_token();

        let mut active: user::ActiveModel = user.into();
        active.refresh_token = Set(Some(refresh_token.clone()));
        active.refresh_token_expires_at = Set(Some(expires_at.into()));
        active.updated_at = Set(Utc::now().into());
        let user = active.update(self.db.as_ref()).await?;

        Ok(AuthSession {
            user,
            access_token,
            refresh_token,
            roles,
        })
    }

    pub async fn find_user_by_id(&self, user_id: Uuid) -> AppResult<Option<user::Model>> {
        Ok(User::find_by_id(user_id).one(self.db.as_ref()).await?)
    }
}

/// Names of the active roles held by `user_id`.
pub async fn role_names<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<Vec<String>> {
    let roles = Role::find()
        .inner_join(UserRole)
        .filter(user_role::Column::UserId.eq(user_id))
        .filter(role::Column::IsActive.eq(true))
        .all(db)
        .await?;
    Ok(roles.into_iter().map(|role| role.name).collect())
}
