// Request bodies and their shape checks
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use protoforge_core::sanitize_project_name;

use crate::error::ApiError;

pub const MIN_REQUIREMENTS: usize = 10;
pub const MAX_REQUIREMENTS: usize = 10_000;
pub const MIN_DESCRIPTION: usize = 5;
pub const MAX_DESCRIPTION: usize = 5_000;
pub const LANGUAGES: &[&str] = &[
    "javascript",
    "typescript",
    "python",
    "rust",
    "java",
    "go",
    "html",
    "css",
    "sql",
];

pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

/// JSON body that passed [`Validate`]. Rejects with a 400 envelope.
pub struct Valid<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate().map_err(ApiError::validation)?;
        Ok(Valid(value))
    }
}

// --- Checks ---

fn check_name(name: &str) -> Result<(), String> {
    sanitize_project_name(name)
        .map(|_| ())
        .map_err(|_| "name must contain at least one letter or digit".to_string())
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(format!("{field} must be between {min} and {max} characters (got {len})"))
    }
}

fn check_range(field: &str, value: Option<i64>, min: i64, max: i64) -> Result<(), String> {
    match value {
        Some(v) if !(min..=max).contains(&v) => {
            Err(format!("{field} must be between {min} and {max}"))
        }
        _ => Ok(()),
    }
}

fn check_requirements(value: &str) -> Result<(), String> {
    check_length("requirements", value, MIN_REQUIREMENTS, MAX_REQUIREMENTS)
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct GenerateJdlRequest {
    pub name: String,
    pub requirements: String,
}

impl Validate for GenerateJdlRequest {
    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_requirements(&self.requirements)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateJsonRequest {
    pub name: String,
    pub jdl: Option<String>,
    pub records_per_entity: Option<i64>,
}

impl Validate for GenerateJsonRequest {
    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_range("recordsPerEntity", self.records_per_entity, 1, 100)
    }
}

pub type GeneratePrototypeRequest = GenerateJdlRequest;

#[derive(Debug, Deserialize)]
pub struct GenerateJsonServerRequest {
    pub name: String,
    pub port: Option<i64>,
}

impl Validate for GenerateJsonServerRequest {
    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_range("port", self.port, 1024, 65535)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCrudRequest {
    pub name: String,
    pub api_base_url: Option<String>,
    pub items_per_page: Option<i64>,
}

impl Validate for GenerateCrudRequest {
    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_range("itemsPerPage", self.items_per_page, 1, 100)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateProjectRequest {
    pub name: String,
    pub requirements: String,
    pub records_per_entity: Option<i64>,
    pub port: Option<i64>,
}

impl Validate for GenerateProjectRequest {
    fn validate(&self) -> Result<(), String> {
        check_name(&self.name)?;
        check_requirements(&self.requirements)?;
        check_range("recordsPerEntity", self.records_per_entity, 1, 100)?;
        check_range("port", self.port, 1024, 65535)
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateCodeRequest {
    pub language: String,
    pub description: String,
    pub context: Option<String>,
}

impl Validate for GenerateCodeRequest {
    fn validate(&self) -> Result<(), String> {
        if !LANGUAGES.contains(&self.language.as_str()) {
            return Err(format!("language must be one of: {}", LANGUAGES.join(", ")));
        }
        check_length("description", &self.description, MIN_DESCRIPTION, MAX_DESCRIPTION)
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateJdlRequest {
    pub jdl: String,
}

impl Validate for ValidateJdlRequest {
    fn validate(&self) -> Result<(), String> {
        if self.jdl.trim().is_empty() {
            return Err("jdl must not be empty".to_string());
        }
        Ok(())
    }
}

/// Body of the requirements review endpoint. Only the shape is checked;
/// the length is reported back as an issue instead of rejected.
#[derive(Debug, Deserialize)]
pub struct ReviewRequirementsRequest {
    pub requirements: String,
}

impl Validate for ReviewRequirementsRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct RequirementsRequest {
    pub requirements: String,
}

impl Validate for RequirementsRequest {
    fn validate(&self) -> Result<(), String> {
        check_requirements(&self.requirements)
    }
}
