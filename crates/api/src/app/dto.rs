use std::str::FromStr;

use serde::Deserialize;

use jobboard_auth::Role;
use jobboard_core::{ApplicationStatus, CategoryId, DomainError, IndustryId, JobId};

use crate::app::errors::ApiError;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateIndustryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateIndustryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub description: Option<String>,
    pub industry_id: Option<IndustryId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry_id: Option<IndustryId>,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub title: String,
    /// Defaults to the posting employer's company name
    pub company: Option<String>,
    pub location: String,
    pub wage: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub industry_id: Option<IndustryId>,
    pub category_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub wage: Option<i64>,
    pub description: Option<String>,
    pub industry_id: Option<IndustryId>,
    pub category_id: Option<CategoryId>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateApplicationRequest {
    pub job_id: JobId,
    pub cover_letter: Option<String>,
    pub resume_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateApplicationRequest {
    pub cover_letter: Option<String>,
    pub resume_link: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ApplicationStatus,
}

// -------------------------
// Helpers
// -------------------------

/// Parse a path id (`400 invalid_id` on failure).
pub fn parse_id<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(ApiError::Domain)
}

/// Trimmed, non-empty text.
pub fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Domain(DomainError::validation(format!("{field} must not be empty"))));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_rejects_garbage() {
        let id = JobId::new();
        assert_eq!(parse_id::<JobId>(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_id::<JobId>("not-a-uuid"),
            Err(ApiError::Domain(DomainError::InvalidId(_)))
        ));
    }

    #[test]
    fn required_text_trims() {
        assert_eq!(required_text("name", "  Tech ").unwrap(), "Tech");
        assert!(required_text("name", "   ").is_err());
    }

    #[test]
    fn register_accepts_legacy_user_role() {
        let body: RegisterRequest =
            serde_json::from_str(r#"{"email":"a@b.com","role":"user","first_name":"Ada"}"#).unwrap();
        assert_eq!(body.role, Role::JobSeeker);
    }
}
