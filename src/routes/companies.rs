use axum::extract::{Json, Path, State};
use axum::http::StatusCode;
use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::models::{Company, NewCompany};
use crate::schema::companies;
use crate::state::AppState;
use crate::utils::json::{string_patch, PatchValue};

use super::applications::to_iso;

#[derive(Deserialize)]
pub struct CreateCompanyRequest {
    #[serde(default)]
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
}

#[derive(Serialize)]
pub struct CompanyResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub website: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            id: company.id,
            user_id: company.user_id,
            name: company.name,
            website: company.website,
            description: company.description,
            industry: company.industry,
            created_at: to_iso(company.created_at),
            updated_at: to_iso(company.updated_at),
        }
    }
}

#[derive(AsChangeset, Default)]
#[diesel(table_name = companies)]
struct UpdateCompanyChangeset<'a> {
    name: Option<&'a str>,
    website: Option<Option<&'a str>>,
    description: Option<Option<&'a str>>,
    industry: Option<Option<&'a str>>,
    updated_at: Option<NaiveDateTime>,
}

pub async fn create_company(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateCompanyRequest>,
) -> AppResult<(StatusCode, Json<CompanyResponse>)> {
    if !user.is_recruiter() {
        return Err(AppError::forbidden(
            "only recruiters may create a company profile",
        ));
    }

    if payload.name.trim().is_empty() {
        return Err(AppError::validation(vec![
            "company name is required".to_string()
        ]));
    }

    let mut conn = state.db()?;

    let existing: Option<Uuid> = companies::table
        .filter(companies::user_id.eq(user.user_id))
        .select(companies::id)
        .first(&mut conn)
        .optional()?;
    if existing.is_some() {
        return Err(AppError::conflict(
            "you have already created a company profile",
        ));
    }

    let new_company = NewCompany {
        id: Uuid::new_v4(),
        user_id: user.user_id,
        name: payload.name.trim().to_string(),
        website: normalize(payload.website),
        description: normalize(payload.description),
        industry: normalize(payload.industry),
    };

    match diesel::insert_into(companies::table)
        .values(&new_company)
        .execute(&mut conn)
    {
        Ok(_) => {}
        Err(diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            return Err(AppError::conflict(
                "you have already created a company profile",
            ));
        }
        Err(err) => return Err(AppError::from(err)),
    }

    let company: Company = companies::table.find(new_company.id).first(&mut conn)?;
    Ok((StatusCode::CREATED, Json(CompanyResponse::from(company))))
}

pub async fn list_companies(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<CompanyResponse>>> {
    let mut conn = state.db()?;

    let rows: Vec<Company> = companies::table.order(companies::name.asc()).load(&mut conn)?;

    Ok(Json(rows.into_iter().map(CompanyResponse::from).collect()))
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
) -> AppResult<Json<CompanyResponse>> {
    let mut conn = state.db()?;

    let company: Company = companies::table
        .find(company_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    Ok(Json(CompanyResponse::from(company)))
}

pub async fn update_company(
    State(state): State<AppState>,
    Path(company_id): Path<Uuid>,
    user: AuthenticatedUser,
    Json(body): Json<Value>,
) -> AppResult<Json<CompanyResponse>> {
    let mut conn = state.db()?;

    let company: Company = companies::table
        .find(company_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(AppError::not_found)?;

    if company.user_id != user.user_id {
        return Err(AppError::forbidden(
            "only the owning recruiter may edit this company profile",
        ));
    }

    let name = match string_patch("name", body.get("name")).map_err(AppError::bad_request)? {
        PatchValue::Absent => None,
        PatchValue::Clear => return Err(AppError::bad_request("name cannot be null")),
        PatchValue::Set(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request("name must not be empty"));
            }
            Some(trimmed.to_string())
        }
    };

    let website = nullable(&body, "website")?;
    let description = nullable(&body, "description")?;
    let industry = nullable(&body, "industry")?;

    let changeset = UpdateCompanyChangeset {
        name: name.as_deref(),
        website: website.as_ref().map(|opt| opt.as_ref().map(String::as_str)),
        description: description
            .as_ref()
            .map(|opt| opt.as_ref().map(String::as_str)),
        industry: industry
            .as_ref()
            .map(|opt| opt.as_ref().map(String::as_str)),
        updated_at: Some(Utc::now().naive_utc()),
    };

    diesel::update(companies::table.find(company_id))
        .set(&changeset)
        .execute(&mut conn)?;

    let company: Company = companies::table.find(company_id).first(&mut conn)?;
    Ok(Json(CompanyResponse::from(company)))
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn nullable(body: &Value, field: &str) -> AppResult<Option<Option<String>>> {
    match string_patch(field, body.get(field)).map_err(AppError::bad_request)? {
        PatchValue::Absent => Ok(None),
        PatchValue::Clear => Ok(Some(None)),
        PatchValue::Set(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::bad_request(format!("{field} must not be empty")));
            }
            Ok(Some(Some(trimmed.to_string())))
        }
    }
}
