//! Business logic services

pub mod auth;
pub mod catalog;
pub mod checkouts;
pub mod media;
pub mod search;
pub mod users;

use crate::{config::AppConfig, repository::Repository, search::SearchIndexes};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub checkouts: checkouts::CheckoutsService,
    pub search: search::SearchService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository and index handles
    pub fn new(repository: Repository, indexes: SearchIndexes, config: &AppConfig) -> Self {
        let max_candidates = config.search.max_candidates;
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            users: users::UsersService::new(
                repository.clone(),
                indexes.users.clone(),
                config.users.clone(),
                max_candidates,
            ),
            catalog: catalog::CatalogService::new(
                repository.clone(),
                indexes.books.clone(),
                media::MediaStore::new(&config.storage.static_dir),
                max_candidates,
            ),
            checkouts: checkouts::CheckoutsService::new(repository.clone()),
            search: search::SearchService::new(repository.clone(), indexes),
            repository,
        }
    }
}
