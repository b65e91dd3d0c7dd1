//! Business logic services

pub mod audit;
pub mod auth;
pub mod catalog;
pub mod loans;
pub mod members;
pub mod stats;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    pub stats: stats::StatsService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let members = members::MembersService::new(repository.clone(), config.lending.read_timeout());

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            catalog: catalog::CatalogService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), members.clone(), config.lending.clone()),
            members,
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }
}
