//! User management service

use chrono::{Datelike, Utc};
use std::sync::Arc;

use super::auth::{generate_password, hash_password};
use super::search::{candidate_ids, order_by_rank, page_of};
use crate::{
    config::UsersConfig,
    error::AppResult,
    models::user::{CreatedCredentials, NewUserEntry, UpdateUser, User, UserQuery},
    repository::Repository,
    search::{mirror_index, mirror_reindex, mirror_unindex, SearchIndex},
};

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    index: Arc<dyn SearchIndex>,
    config: UsersConfig,
    max_candidates: usize,
}

impl UsersService {
    pub fn new(
        repository: Repository,
        index: Arc<dyn SearchIndex>,
        config: UsersConfig,
        max_candidates: usize,
    ) -> Self {
        Self {
            repository,
            index,
            config,
            max_candidates,
        }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Search users. With `q`, candidates come from the index and are
    /// re-read from the database; otherwise the database filters apply.
    pub async fn search(
        &self,
        query: &UserQuery,
        with_rights: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<User>, i64)> {
        let text = query.q.as_deref().unwrap_or("");
        if text.trim().is_empty() {
            return self.repository.users.list(query, with_rights, limit, offset).await;
        }

        let ids = candidate_ids(self.index.as_ref(), text, self.max_candidates).await?;
        let mut users = self.repository.users.get_by_ids(&ids).await?;
        users.retain(|user| query.matches(user, with_rights));

        let ranked = order_by_rank(&ids, users, |user| user.id);
        Ok(page_of(ranked, limit, offset))
    }

    /// Create accounts with generated logins and passwords. The plain
    /// passwords are only ever returned here.
    pub async fn create_many(&self, entries: Vec<NewUserEntry>) -> AppResult<Vec<CreatedCredentials>> {
        let mut passwords = Vec::with_capacity(entries.len());
        let mut rows = Vec::with_capacity(entries.len());
        for entry in entries {
            let password = generate_password(self.config.password_length);
            rows.push((entry, hash_password(&password)?));
            passwords.push(password);
        }

        let year = Utc::now().year();
        let users = self
            .repository
            .users
            .create_many(&rows, &self.config.login_prefix, year)
            .await?;

        for user in &users {
            mirror_index(self.index.as_ref(), user).await;
        }

        tracing::info!(count = users.len(), "Users created");

        Ok(users
            .into_iter()
            .zip(passwords)
            .map(|(user, password)| CreatedCredentials {
                id: user.id,
                login: user.login,
                password,
            })
            .collect())
    }

    /// Update user fields
    pub async fn update(&self, id: i32, data: &UpdateUser) -> AppResult<User> {
        let user = self.repository.users.update(id, data).await?;
        if data.touches_index() {
            mirror_reindex(self.index.as_ref(), &user).await;
        }
        Ok(user)
    }

    pub async fn change_password(&self, id: i32, password: &str) -> AppResult<()> {
        let hash = hash_password(password)?;
        self.repository.users.update_password(id, &hash).await?;
        tracing::info!(user_id = id, "Password changed");
        Ok(())
    }

    /// Delete a user who holds no books
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.users.delete(id).await?;
        mirror_unindex(self.index.as_ref(), id).await;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
