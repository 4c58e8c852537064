//! Section CRUD handlers
//!
//! POST /sections, GET /sections, GET /sections/by-code,
//! GET /sections/:id, DELETE /sections/:id

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use geosect_common::{NewSection, Section};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    AppState,
};

/// GET /sections/by-code query
#[derive(Debug, Deserialize)]
pub struct ByCodeQuery {
    pub code: String,
}

/// Names and codes must be non-blank; the spreadsheet codec treats blank
/// cells as missing, so blank values could not survive an export/import.
fn validate(section: &NewSection) -> ApiResult<()> {
    if section.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Section name must not be blank".to_string()));
    }
    for (i, class) in section.geological_classes.iter().enumerate() {
        if class.name.trim().is_empty() || class.code.trim().is_empty() {
            return Err(ApiError::BadRequest(format!(
                "Geological class {} needs both a name and a code",
                i + 1
            )));
        }
    }
    Ok(())
}

/// POST /sections
pub async fn create_section(
    State(state): State<AppState>,
    Json(section): Json<NewSection>,
) -> ApiResult<(StatusCode, Json<Section>)> {
    validate(&section)?;

    let saved = state.store.save(section).await?;
    tracing::info!(
        section_id = saved.id,
        classes = saved.geological_classes.len(),
        "Section created"
    );

    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /sections
pub async fn list_sections(State(state): State<AppState>) -> ApiResult<Json<Vec<Section>>> {
    Ok(Json(state.store.find_all().await?))
}

/// GET /sections/by-code?code=X
pub async fn sections_by_code(
    State(state): State<AppState>,
    Query(query): Query<ByCodeQuery>,
) -> ApiResult<Json<Vec<Section>>> {
    let sections = state.store.find_by_class_code(&query.code).await?;
    tracing::debug!(code = %query.code, matches = sections.len(), "Sections by code");
    Ok(Json(sections))
}

/// GET /sections/:id
pub async fn get_section(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Section>> {
    state
        .store
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Section not found: {}", id)))
}

/// DELETE /sections/:id
pub async fn delete_section(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    if state.store.delete(id).await? {
        tracing::info!(section_id = id, "Section deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Section not found: {}", id)))
    }
}

/// Build section routes
pub fn section_routes() -> Router<AppState> {
    Router::new()
        .route("/sections", get(list_sections).post(create_section))
        .route("/sections/by-code", get(sections_by_code))
        .route("/sections/:id", get(get_section).delete(delete_section))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geosect_common::NewGeologicalClass;

    #[test]
    fn test_validate_rejects_blank_values() {
        assert!(validate(&NewSection::new("  ", vec![])).is_err());
        assert!(validate(&NewSection::new("Ridge", vec![NewGeologicalClass::new("Basalt", "")])).is_err());
        assert!(validate(&NewSection::new("Ridge", vec![NewGeologicalClass::new("Basalt", "B1")])).is_ok());
    }
}
