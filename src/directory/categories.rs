use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use log::info;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::{Category, SubCategory};
use crate::core::middleware::CurrentUser;
use crate::core::shared::state::AppState;
use crate::store::Directory;
use crate::tickets::ensure_agent;
use crate::tickets::error::TicketError;

const MAX_NAME_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubCategoryRequest {
    pub category_id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSubCategoryRequest {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub description: Option<String>,
}

fn clean_name(name: &str) -> Result<String, TicketError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TicketError::Validation("Name cannot be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(TicketError::Validation(format!(
            "Name cannot exceed {MAX_NAME_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

fn category_not_found(id: Uuid) -> TicketError {
    TicketError::NotFound(format!("Category {id} not found"))
}

fn subcategory_not_found(id: Uuid) -> TicketError {
    TicketError::NotFound(format!("Subcategory {id} not found"))
}

/// Category and subcategory maintenance on top of the directory store.
pub struct CategoryService {
    directory: Arc<dyn Directory>,
}

impl CategoryService {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, TicketError> {
        Ok(self.directory.list_categories().await?)
    }

    pub async fn get_category(&self, id: Uuid) -> Result<Category, TicketError> {
        self.directory
            .get_category(id)
            .await?
            .ok_or_else(|| category_not_found(id))
    }

    pub async fn create_category(&self, req: CreateCategoryRequest) -> Result<Category, TicketError> {
        let category = Category {
            id: Uuid::new_v4(),
            name: clean_name(&req.name)?,
            description: req.description,
        };
        let category = self.directory.insert_category(category).await?;
        info!("Category {} created: {}", category.id, category.name);
        Ok(category)
    }

    /// Only the fields present in `req` change.
    pub async fn update_category(
        &self,
        id: Uuid,
        req: UpdateCategoryRequest,
    ) -> Result<Category, TicketError> {
        let mut category = self.get_category(id).await?;
        if let Some(name) = req.name {
            category.name = clean_name(&name)?;
        }
        if let Some(description) = req.description {
            category.description = Some(description);
        }

        if !self.directory.save_category(&category).await? {
            return Err(category_not_found(id));
        }
        Ok(category)
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), TicketError> {
        if !self.directory.delete_category(id).await? {
            return Err(category_not_found(id));
        }
        info!("Category {id} deleted");
        Ok(())
    }

    pub async fn subcategories_for(&self, category_id: Uuid) -> Result<Vec<SubCategory>, TicketError> {
        self.get_category(category_id).await?;
        Ok(self.directory.subcategories_for(category_id).await?)
    }

    pub async fn get_subcategory(&self, id: Uuid) -> Result<SubCategory, TicketError> {
        self.directory
            .get_subcategory(id)
            .await?
            .ok_or_else(|| subcategory_not_found(id))
    }

    pub async fn create_subcategory(
        &self,
        req: CreateSubCategoryRequest,
    ) -> Result<SubCategory, TicketError> {
        self.require_parent(req.category_id).await?;
        let subcategory = SubCategory {
            id: Uuid::new_v4(),
            category_id: req.category_id,
            name: clean_name(&req.name)?,
            description: req.description,
        };
        let subcategory = self.directory.insert_subcategory(subcategory).await?;
        info!(
            "Subcategory {} created under category {}: {}",
            subcategory.id, subcategory.category_id, subcategory.name
        );
        Ok(subcategory)
    }

    /// Only the fields present in `req` change. A new parent must exist.
    pub async fn update_subcategory(
        &self,
        id: Uuid,
        req: UpdateSubCategoryRequest,
    ) -> Result<SubCategory, TicketError> {
        let mut subcategory = self.get_subcategory(id).await?;
        if let Some(category_id) = req.category_id {
            self.require_parent(category_id).await?;
            subcategory.category_id = category_id;
        }
        if let Some(name) = req.name {
            subcategory.name = clean_name(&name)?;
        }
        if let Some(description) = req.description {
            subcategory.description = Some(description);
        }

        if !self.directory.save_subcategory(&subcategory).await? {
            return Err(subcategory_not_found(id));
        }
        Ok(subcategory)
    }

    pub async fn delete_subcategory(&self, id: Uuid) -> Result<(), TicketError> {
        if !self.directory.delete_subcategory(id).await? {
            return Err(subcategory_not_found(id));
        }
        info!("Subcategory {id} deleted");
        Ok(())
    }

    async fn require_parent(&self, category_id: Uuid) -> Result<(), TicketError> {
        match self.directory.get_category(category_id).await? {
            Some(_) => Ok(()),
            None => Err(TicketError::Validation(format!(
                "Category {category_id} does not exist"
            ))),
        }
    }
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
) -> Result<Json<Vec<Category>>, TicketError> {
    Ok(Json(state.categories.list_categories().await?))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), TicketError> {
    ensure_agent(&user)?;
    let category = state.categories.create_category(req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, TicketError> {
    Ok(Json(state.categories.get_category(id).await?))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, TicketError> {
    ensure_agent(&user)?;
    Ok(Json(state.categories.update_category(id, req).await?))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, TicketError> {
    ensure_agent(&user)?;
    state.categories.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_subcategories(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SubCategory>>, TicketError> {
    Ok(Json(state.categories.subcategories_for(id).await?))
}

pub async fn create_subcategory(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateSubCategoryRequest>,
) -> Result<(StatusCode, Json<SubCategory>), TicketError> {
    ensure_agent(&user)?;
    let subcategory = state.categories.create_subcategory(req).await?;
    Ok((StatusCode::CREATED, Json(subcategory)))
}

pub async fn get_subcategory(
    State(state): State<Arc<AppState>>,
    CurrentUser(_user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SubCategory>, TicketError> {
    Ok(Json(state.categories.get_subcategory(id).await?))
}

pub async fn update_subcategory(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSubCategoryRequest>,
) -> Result<Json<SubCategory>, TicketError> {
    ensure_agent(&user)?;
    Ok(Json(state.categories.update_subcategory(id, req).await?))
}

pub async fn delete_subcategory(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, TicketError> {
    ensure_agent(&user)?;
    state.categories.delete_subcategory(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn configure_categories_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/categories", get(list_categories).post(create_category))
        .route(
            "/api/categories/:id",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/api/categories/:id/subcategories", get(list_subcategories))
        .route("/api/subcategories", post(create_subcategory))
        .route(
            "/api/subcategories/:id",
            get(get_subcategory)
                .put(update_subcategory)
                .delete(delete_subcategory),
        )
}
