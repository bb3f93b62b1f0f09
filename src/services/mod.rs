//! Business logic services

pub mod auth;
pub mod catalog;
pub mod guard;
pub mod ledger;
pub mod libraries;
pub mod session;
pub mod stocking;
pub mod users;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    repository::{LedgerStore, Repository},
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub session: session::SessionManager,
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub catalog: catalog::CatalogService,
    pub libraries: libraries::LibrariesService,
    pub ledger: ledger::InventoryLedger,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let session = session::SessionManager::new(config.auth.clone());
        let store: Arc<dyn LedgerStore> = Arc::new(repository.ledger.clone());
        let ledger = ledger::InventoryLedger::new(store.clone(), config.ledger.clone());
        let stocking = stocking::StockingJob::new(store, config.ledger.stocking_max_copies);

        Self {
            auth: auth::AuthService::new(Arc::new(repository.users.clone()), session.clone()),
            users: users::UsersService::new(repository.clone(), session.clone()),
            catalog: catalog::CatalogService::new(repository.clone(), ledger.clone()),
            libraries: libraries::LibrariesService::new(repository.clone(), stocking),
            ledger,
            session,
            repository,
        }
    }
}
