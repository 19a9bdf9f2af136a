//! Users repository for database operations

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    error::{AppError, AppResult},
    models::user::{NewUserEntry, Rights, UpdateUser, User, UserQuery},
};

const USER_COLUMNS: &str = "id, login, password, name, middlename, surname, birthdate, \
                            year_of_study, rights, created_at, updated_at";

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by login (authentication)
    pub async fn get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE login = $1",
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if login already exists
    pub async fn login_exists(&self, login: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE login = $1)")
            .bind(login)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Users with the given ids, in no particular order. Unknown ids are skipped.
    pub async fn get_by_ids(&self, ids: &[i32]) -> AppResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery, with_rights: bool) {
        builder.push(" WHERE TRUE");

        let text_filters = [
            ("name", &query.name),
            ("middlename", &query.middlename),
            ("surname", &query.surname),
        ];
        for (column, value) in text_filters {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                builder
                    .push(format!(" AND {} ILIKE ", column))
                    .push_bind(format!("%{}%", value.trim()));
            }
        }

        if let Some(year) = query.year_of_study {
            builder.push(" AND year_of_study = ").push_bind(year);
        }

        if with_rights {
            if let Some(rights) = query.rights {
                builder.push(" AND rights = ").push_bind(rights);
            }
        }
    }

    /// Filtered listing with pagination. `with_rights` enables the rights filter.
    pub async fn list(
        &self,
        query: &UserQuery,
        with_rights: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        Self::push_filters(&mut count, query, with_rights);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM users", USER_COLUMNS));
        Self::push_filters(&mut select, query, with_rights);
        select
            .push(" ORDER BY surname NULLS LAST, name NULLS LAST, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let users = select.build_query_as::<User>().fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    /// All users, for index rebuilds
    pub async fn list_all(&self) -> AppResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Create one account with an explicit login (superuser bootstrap)
    pub async fn create(&self, login: &str, password_hash: &str, rights: Rights) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (login, password, rights) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(login)
        .bind(password_hash)
        .bind(rights)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Login {} already exists", login))
            }
            e => AppError::Database(e),
        })?;

        Ok(user)
    }

    /// Create accounts in a single transaction. Each login is
    /// `{login_prefix}{year}{id}`, so it is set once the id is known.
    /// `entries` pairs each account with its password hash.
    pub async fn create_many(
        &self,
        entries: &[(NewUserEntry, String)],
        login_prefix: &str,
        year: i32,
    ) -> AppResult<Vec<User>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(entries.len());

        for (entry, password_hash) in entries {
            // Placeholder login; unique until replaced below
            let placeholder = format!("pending-{}", uuid::Uuid::new_v4());
            let id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO users (login, password, name, middlename, surname,
                                   birthdate, year_of_study, rights)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(&placeholder)
            .bind(password_hash)
            .bind(&entry.name)
            .bind(&entry.middlename)
            .bind(&entry.surname)
            .bind(entry.birthdate)
            .bind(entry.year_of_study)
            .bind(entry.rights.unwrap_or_default())
            .fetch_one(&mut *tx)
            .await?;

            let user = sqlx::query_as::<_, User>(&format!(
                "UPDATE users SET login = $2 WHERE id = $1 RETURNING {}",
                USER_COLUMNS
            ))
            .bind(id)
            .bind(format!("{}{}{}", login_prefix, year, id))
            .fetch_one(&mut *tx)
            .await?;

            created.push(user);
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Partial update; returns the stored row after the change
    pub async fn update(&self, id: i32, data: &UpdateUser) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                middlename = COALESCE($3, middlename),
                surname = COALESCE($4, surname),
                year_of_study = COALESCE($5, year_of_study),
                birthdate = COALESCE($6, birthdate),
                rights = COALESCE($7, rights),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(&data.name)
        .bind(&data.middlename)
        .bind(&data.surname)
        .bind(data.year_of_study)
        .bind(data.birthdate)
        .bind(data.rights)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET password = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Delete a user holding no books. Checkout history goes with it.
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let found: Option<i32> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if found.is_none() {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM checkouts WHERE user_id = $1 AND returned_at IS NULL)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if active {
            return Err(AppError::BusinessRule(
                "User has not returned all books".to_string(),
            ));
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
