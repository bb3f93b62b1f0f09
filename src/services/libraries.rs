//! Library management service

use crate::{
    error::AppResult,
    models::library::{CreateLibrary, Library, LibraryQuery, UpdateLibrary},
    repository::Repository,
    services::stocking::StockingJob,
};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct LibrariesService {
    repository: Repository,
    stocking: StockingJob,
}

impl LibrariesService {
    pub fn new(repository: Repository, stocking: StockingJob) -> Self {
        Self { repository, stocking }
    }

    pub async fn list(&self, query: &LibraryQuery) -> AppResult<(Vec<Library>, i64, i64, i64)> {
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = query.offset.unwrap_or(0).max(0);
        let (libraries, total) = self.repository.libraries.list(limit, offset).await?;
        Ok((libraries, total, limit, offset))
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Library> {
        self.repository.libraries.get_by_id(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> AppResult<Library> {
        self.repository.libraries.get_by_name(name.trim()).await
    }

    /// Create a library and stock it with the current catalog in the background
    pub async fn create(&self, data: CreateLibrary) -> AppResult<Library> {
        let library = self.repository.libraries.create(&data).await?;
        tracing::info!(library_id = library.id, name = %library.name, "Library created");
        self.stocking.spawn(library.id);
        Ok(library)
    }

    pub async fn update(&self, id: i32, data: UpdateLibrary) -> AppResult<Library> {
        self.repository.libraries.update(id, &data).await
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.libraries.delete(id).await
    }
}
