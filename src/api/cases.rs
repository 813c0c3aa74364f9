// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Chambers

//! Case endpoints: paginated list, create (with number allocation), get,
//! update, soft delete.
//!
//! Tenant scoping is decided by the access guard; handlers only apply the
//! scope it returns. Super admins may act on behalf of a firm by sending
//! the `X-Firm-ID` header.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::auth::{can_access, can_access_case, case_scope, Auth, CaseScope, CurrentUser, Role};
use crate::error::{api_success, api_success_meta, ApiError};
use crate::models::{CaseListQuery, CaseResponse, CreateCaseRequest, UpdateCaseRequest};
use crate::state::AppState;
use crate::storage::{CaseRepository, ClientRepository, StorageError, StoredCase, StoredClient};

/// Super-admin tenant override header.
const FIRM_OVERRIDE_HEADER: &str = "x-firm-id";

const DEFAULT_PAGE_SIZE: usize = 20;
const MAX_PAGE_SIZE: usize = 100;

fn firm_override(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FIRM_OVERRIDE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// The firm a write operates on: super admins must name one explicitly,
/// firm owners always act on their own.
fn effective_firm(current: &CurrentUser, headers: &HeaderMap) -> Result<String, ApiError> {
    if current.role == Role::SuperAdmin {
        return firm_override(headers).ok_or_else(|| {
            ApiError::bad_request("Super admins must set the X-Firm-ID header for this operation")
        });
    }
    current
        .firm_id
        .clone()
        .ok_or_else(|| ApiError::not_found("No firm associated with this account"))
}

/// The requester's own client profile, for CLIENT object checks.
fn own_client(state: &AppState, current: &CurrentUser) -> Result<Option<StoredClient>, ApiError> {
    if current.role != Role::Client {
        return Ok(None);
    }
    Ok(ClientRepository::new(&state.db).find_by_user(&current.user_id)?)
}

fn load_visible_case(
    state: &AppState,
    current: &CurrentUser,
    case_id: &str,
    write: bool,
) -> Result<StoredCase, ApiError> {
    let case = CaseRepository::new(&state.db).get(case_id)?;
    if case.is_deleted {
        return Err(ApiError::not_found(format!("Case {case_id}")));
    }
    let client = own_client(state, current)?;
    if !can_access_case(
        current.role,
        current.firm_id.as_deref(),
        client.as_ref(),
        &case,
        write,
    ) {
        // A case the caller could at least read is denied with 403; a case
        // outside their reach does not exist as far as they can tell.
        let readable = can_access_case(
            current.role,
            current.firm_id.as_deref(),
            client.as_ref(),
            &case,
            false,
        );
        if readable || current.firm_id.as_deref() == Some(case.firm_id.as_str()) {
            return Err(ApiError::forbidden("Insufficient permissions for this operation"));
        }
        return Err(ApiError::not_found(format!("Case {case_id}")));
    }
    Ok(case)
}

#[utoipa::path(
    get,
    path = "/api/cases",
    tag = "Cases",
    security(("bearer" = [])),
    responses((status = 200, body = [CaseResponse]))
)]
pub async fn list_cases(
    State(state): State<AppState>,
    Auth(current): Auth,
    headers: HeaderMap,
    Query(query): Query<CaseListQuery>,
) -> Result<Response, ApiError> {
    let scope = match (current.role, firm_override(&headers)) {
        (Role::SuperAdmin, Some(firm_id)) => CaseScope::Firm(firm_id),
        _ => case_scope(current.role, current.firm_id.as_deref(), &current.user_id),
    };

    let client = own_client(&state, &current)?;
    let cases = CaseRepository::new(&state.db).list()?;
    let search = query.search.as_deref().map(str::to_lowercase);

    let filtered = cases
        .into_iter()
        .filter(|case| match &scope {
            CaseScope::All => true,
            CaseScope::Firm(firm_id) => &case.firm_id == firm_id,
            CaseScope::OwnClient(_) => match (&client, case.client_id.as_deref()) {
                (Some(client), Some(case_client)) => client.id == case_client,
                _ => false,
            },
            CaseScope::Empty => false,
        })
        .filter(|case| query.status.map(|s| case.status == s).unwrap_or(true))
        .filter(|case| query.priority.map(|p| case.priority == p).unwrap_or(true))
        .filter(|case| match &search {
            Some(needle) => {
                case.title.to_lowercase().contains(needle)
                    || case
                        .case_number
                        .as_deref()
                        .map(|n| n.to_lowercase().contains(needle))
                        .unwrap_or(false)
            }
            None => true,
        })
        .collect::<Vec<_>>();

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let count = filtered.len();
    let total_pages = count.div_ceil(page_size).max(1);

    let items = filtered
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .map(CaseResponse::from)
        .collect::<Vec<_>>();

    Ok(api_success_meta(
        "OK",
        json!(items),
        json!({
            "page": page,
            "page_size": page_size,
            "count": count,
            "total_pages": total_pages,
        }),
        StatusCode::OK,
    ))
}

#[utoipa::path(
    post,
    path = "/api/cases",
    request_body = CreateCaseRequest,
    tag = "Cases",
    security(("bearer" = [])),
    responses(
        (status = 201, body = CaseResponse),
        (status = 403, description = "Role may not create cases"),
        (status = 409, description = "Case number already in use")
    )
)]
pub async fn create_case(
    State(state): State<AppState>,
    Auth(current): Auth,
    headers: HeaderMap,
    Json(request): Json<CreateCaseRequest>,
) -> Result<Response, ApiError> {
    if !can_access(current.role, true) {
        return Err(ApiError::forbidden("Insufficient permissions for this operation"));
    }
    let firm_id = effective_firm(&current, &headers)?;

    if request.title.trim().is_empty() {
        return Err(ApiError::field("title", "This field is required."));
    }

    if let Some(client_id) = request.client_id.as_deref() {
        let client = match ClientRepository::new(&state.db).get(client_id) {
            Ok(client) => client,
            Err(StorageError::NotFound(_)) => {
                return Err(ApiError::field("client_id", "Unknown client."))
            }
            Err(e) => return Err(e.into()),
        };
        if client.firm_id != firm_id {
            return Err(ApiError::field("client_id", "Unknown client."));
        }
    }

    let mut case = StoredCase::new(&firm_id, request.title.trim(), &current.user_id);
    case.client_id = request.client_id;
    case.case_type = request.case_type;
    case.case_number = request.case_number;
    case.status = request.status.unwrap_or_default();
    case.priority = request.priority.unwrap_or_default();
    case.description = request.description;
    case.court_name = request.court_name;
    case.judge_name = request.judge_name;
    case.assigned_lead = request.assigned_lead;
    if let Some(open_date) = request.open_date {
        case.open_date = open_date;
    }

    match CaseRepository::new(&state.db).create(&mut case) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::conflict_with(
                "Conflict",
                json!({ "case_number": ["A case with this number already exists."] }),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(api_success(
        "Case created successfully",
        json!(CaseResponse::from(&case)),
        StatusCode::CREATED,
    ))
}

#[utoipa::path(
    get,
    path = "/api/cases/{case_id}",
    params(("case_id" = String, Path, description = "Case id")),
    tag = "Cases",
    security(("bearer" = [])),
    responses(
        (status = 200, body = CaseResponse),
        (status = 404, description = "Unknown or invisible case")
    )
)]
pub async fn get_case(
    State(state): State<AppState>,
    Auth(current): Auth,
    Path(case_id): Path<String>,
) -> Result<Response, ApiError> {
    let case = load_visible_case(&state, &current, &case_id, false)?;
    Ok(api_success("OK", json!(CaseResponse::from(&case)), StatusCode::OK))
}

#[utoipa::path(
    put,
    path = "/api/cases/{case_id}",
    params(("case_id" = String, Path, description = "Case id")),
    request_body = UpdateCaseRequest,
    tag = "Cases",
    security(("bearer" = [])),
    responses(
        (status = 200, body = CaseResponse),
        (status = 409, description = "Case number already in use")
    )
)]
pub async fn update_case(
    State(state): State<AppState>,
    Auth(current): Auth,
    Path(case_id): Path<String>,
    Json(request): Json<UpdateCaseRequest>,
) -> Result<Response, ApiError> {
    let mut case = load_visible_case(&state, &current, &case_id, true)?;

    if let Some(title) = request.title {
        if title.trim().is_empty() {
            return Err(ApiError::field("title", "This field is required."));
        }
        case.title = title.trim().to_string();
    }
    if let Some(client_id) = request.client_id {
        case.client_id = Some(client_id).filter(|v| !v.trim().is_empty());
    }
    if let Some(case_type) = request.case_type {
        case.case_type = Some(case_type).filter(|v| !v.trim().is_empty());
    }
    if let Some(case_number) = request.case_number {
        case.case_number = Some(case_number).filter(|v| !v.trim().is_empty());
    }
    if let Some(status) = request.status {
        case.status = status;
    }
    if let Some(priority) = request.priority {
        case.priority = priority;
    }
    if let Some(description) = request.description {
        case.description = Some(description).filter(|v| !v.trim().is_empty());
    }
    if let Some(court_name) = request.court_name {
        case.court_name = Some(court_name).filter(|v| !v.trim().is_empty());
    }
    if let Some(judge_name) = request.judge_name {
        case.judge_name = Some(judge_name).filter(|v| !v.trim().is_empty());
    }
    if let Some(open_date) = request.open_date {
        case.open_date = open_date;
    }
    if let Some(close_date) = request.close_date {
        case.close_date = Some(close_date);
    }
    if let Some(close_reason) = request.close_reason {
        case.close_reason = Some(close_reason).filter(|v| !v.trim().is_empty());
    }
    if let Some(assigned_lead) = request.assigned_lead {
        case.assigned_lead = Some(assigned_lead).filter(|v| !v.trim().is_empty());
    }
    case.updated_at = Utc::now();

    match CaseRepository::new(&state.db).update(&case) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::conflict_with(
                "Conflict",
                json!({ "case_number": ["A case with this number already exists."] }),
            ));
        }
        Err(e) => return Err(e.into()),
    }

    Ok(api_success(
        "Case updated successfully",
        json!(CaseResponse::from(&case)),
        StatusCode::OK,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/cases/{case_id}",
    params(("case_id" = String, Path, description = "Case id")),
    tag = "Cases",
    security(("bearer" = [])),
    responses((status = 204, description = "Soft deleted"))
)]
pub async fn delete_case(
    State(state): State<AppState>,
    Auth(current): Auth,
    Path(case_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    load_visible_case(&state, &current, &case_id, true)?;
    CaseRepository::new(&state.db).soft_delete(&case_id)?;
    Ok(StatusCode::NO_CONTENT)
}
