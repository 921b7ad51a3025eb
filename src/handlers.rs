use crate::{
    AppState, access,
    auth::{AuthUser, issue_token},
    error::{AppError, AppResult},
    extractors::{ApiJson, ApiQuery},
    models::{
        Folder, FolderRequest, HealthResponse, LoginRequest, LoginResponse, MessageResponse, Note,
        NoteFilter, NoteRequest, Role, SignupRequest, User, UserProfile, normalize_username,
    },
    password::{hash_password, verify_password},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

// --- Public Handlers ---

/// health
///
/// [Public Route] Liveness check for load balancers and the frontend.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// signup
///
/// [Public Route] Creates an account. Usernames are normalized before the uniqueness
/// check; a child must name an existing parent account, a parent never carries a link.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created", body = MessageResponse),
        (status = 409, description = "Username exists"),
        (status = 422, description = "Invalid payload or parent link")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let username = normalize_username(&payload.username);
    if username.is_empty() {
        return Err(AppError::Validation("username must not be empty".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }

    if state.repo.find_user(&username).await?.is_some() {
        return Err(AppError::Conflict("Username exists".to_string()));
    }

    let parent_username = match payload.role {
        Role::Parent => None,
        Role::Child => {
            let parent_username = payload
                .parent_username
                .as_deref()
                .map(normalize_username)
                .filter(|name| !name.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("child must include parent_username".to_string())
                })?;

            match state.repo.find_user(&parent_username).await? {
                Some(parent) if parent.role == Role::Parent => Some(parent_username),
                _ => {
                    return Err(AppError::Validation(
                        "parent_username not found or not a parent".to_string(),
                    ));
                }
            }
        }
    };

    // Argon2 is deliberately slow; keep it off the async workers.
    let password = payload.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {}", e)))??;

    // The repository re-checks uniqueness, which settles concurrent signups.
    let user = state
        .repo
        .create_user(User {
            username,
            password_hash,
            role: payload.role,
            parent_username,
        })
        .await?;

    tracing::info!(username = %user.username, role = %user.role, "user created");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "user created".to_string(),
        }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a bearer token. Unknown usernames and wrong
/// passwords produce the same 401 to avoid user enumeration.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .repo
        .find_user(&normalize_username(&payload.username))
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let password = payload.password;
    let hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {}", e)))?;

    if !valid {
        tracing::debug!(username = %user.username, "login rejected");
        return Err(AppError::InvalidCredentials);
    }

    let access_token = issue_token(&user.username, &state.config)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        role: user.role,
    }))
}

// --- Authenticated Handlers ---

/// get_me
///
/// [Authenticated Route] The caller's profile. Parents also receive the usernames of
/// their linked children.
#[utoipa::path(
    get,
    path = "/me",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Profile", body = UserProfile))
)]
pub async fn get_me(user: AuthUser, State(state): State<AppState>) -> AppResult<Json<UserProfile>> {
    let children = match user.role {
        Role::Parent => state.repo.list_children(&user.username).await?,
        Role::Child => vec![],
    };

    Ok(Json(UserProfile {
        username: user.username,
        role: user.role,
        parent_username: user.parent_username,
        children,
    }))
}

/// create_folder
///
/// [Authenticated Route] Children only.
#[utoipa::path(
    post,
    path = "/folders",
    request_body = FolderRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Folder created", body = Folder),
        (status = 403, description = "Caller is not a child"),
        (status = 422, description = "Blank name")
    )
)]
pub async fn create_folder(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<FolderRequest>,
) -> AppResult<Json<Folder>> {
    access::require_child(&user, "Only children can create folders")?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("folder name must not be empty".to_string()));
    }

    let folder = state.repo.create_folder(&user.username, name).await?;
    Ok(Json(folder))
}

/// list_folders
///
/// [Authenticated Route] A child sees its own folders, a parent those of every linked child.
#[utoipa::path(
    get,
    path = "/folders",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Visible folders", body = [Folder]))
)]
pub async fn list_folders(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Folder>>> {
    let owners = access::visible_owners(&user, state.repo.as_ref()).await?;
    Ok(Json(state.repo.list_folders(&owners).await?))
}

#[utoipa::path(
    get,
    path = "/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Folder", body = Folder),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn get_folder(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Folder>> {
    let id = parse_id(&id, "Folder not found")?;
    let folder = state
        .repo
        .get_folder(id)
        .await?
        .ok_or(AppError::NotFound("Folder not found"))?;
    access::ensure_can_read(&user, &folder.owner_username, state.repo.as_ref()).await?;
    Ok(Json(folder))
}

/// delete_folder
///
/// [Authenticated Route] Owning child only. Notes filed in the folder are kept and
/// become unfiled.
#[utoipa::path(
    delete,
    path = "/folders/{id}",
    params(("id" = Uuid, Path, description = "Folder ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owning child"),
        (status = 404, description = "Folder not found")
    )
)]
pub async fn delete_folder(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "Folder not found")?;
    let folder = state
        .repo
        .get_folder(id)
        .await?
        .ok_or(AppError::NotFound("Folder not found"))?;
    access::ensure_can_write(
        &user,
        &folder.owner_username,
        "Only owning child can delete this folder",
    )?;

    if state.repo.delete_folder(id, &user.username).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        // Removed between the lookup and the delete.
        Err(AppError::NotFound("Folder not found"))
    }
}

/// create_note
///
/// [Authenticated Route] Children only. A `folder_id`, when given, must name one of
/// the caller's folders.
#[utoipa::path(
    post,
    path = "/notes",
    request_body = NoteRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Note created", body = Note),
        (status = 403, description = "Caller is not a child"),
        (status = 422, description = "Invalid payload or folder")
    )
)]
pub async fn create_note(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NoteRequest>,
) -> AppResult<Json<Note>> {
    access::require_child(&user, "Only children can create notes")?;
    ensure_own_folder(&state, &user, payload.folder_id).await?;

    let note = state.repo.create_note(&user.username, payload).await?;
    tracing::debug!(note_id = %note.id, owner = %note.owner_username, "note created");
    Ok(Json(note))
}

/// list_notes
///
/// [Authenticated Route] Visible notes, newest first, optionally narrowed by folder or tag.
#[utoipa::path(
    get,
    path = "/notes",
    params(NoteFilter),
    security(("bearer_auth" = [])),
    responses((status = 200, description = "Visible notes", body = [Note]))
)]
pub async fn list_notes(
    user: AuthUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<NoteFilter>,
) -> AppResult<Json<Vec<Note>>> {
    let owners = access::visible_owners(&user, state.repo.as_ref()).await?;
    Ok(Json(state.repo.list_notes(&owners, &filter).await?))
}

/// get_note
///
/// [Authenticated Route] Readable by the owning child and by that child's parent.
#[utoipa::path(
    get,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Note", body = Note),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn get_note(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Note>> {
    let id = parse_id(&id, "Note not found")?;
    let note = state
        .repo
        .get_note(id)
        .await?
        .ok_or(AppError::NotFound("Note not found"))?;
    access::ensure_can_read(&user, &note.owner_username, state.repo.as_ref()).await?;
    Ok(Json(note))
}

/// update_note
///
/// [Authenticated Route] Owning child only. The body replaces every editable field.
#[utoipa::path(
    put,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    request_body = NoteRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Updated", body = Note),
        (status = 403, description = "Not the owning child"),
        (status = 404, description = "Note not found"),
        (status = 422, description = "Invalid payload or folder")
    )
)]
pub async fn update_note(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<NoteRequest>,
) -> AppResult<Json<Note>> {
    let id = parse_id(&id, "Note not found")?;
    let note = state
        .repo
        .get_note(id)
        .await?
        .ok_or(AppError::NotFound("Note not found"))?;
    access::ensure_can_write(
        &user,
        &note.owner_username,
        "Only owning child can modify this note",
    )?;
    ensure_own_folder(&state, &user, payload.folder_id).await?;

    state
        .repo
        .update_note(id, &user.username, payload)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("Note not found"))
}

#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Note ID")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the owning child"),
        (status = 404, description = "Note not found")
    )
)]
pub async fn delete_note(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = parse_id(&id, "Note not found")?;
    let note = state
        .repo
        .get_note(id)
        .await?
        .ok_or(AppError::NotFound("Note not found"))?;
    access::ensure_can_write(
        &user,
        &note.owner_username,
        "Only owning child can delete this note",
    )?;

    if state.repo.delete_note(id, &user.username).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("Note not found"))
    }
}

/// Ids that are not UUIDs cannot name a stored record, so they read as missing.
fn parse_id(raw: &str, detail: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(detail))
}

async fn ensure_own_folder(
    state: &AppState,
    user: &AuthUser,
    folder_id: Option<Uuid>,
) -> AppResult<()> {
    let Some(folder_id) = folder_id else {
        return Ok(());
    };

    match state.repo.get_folder(folder_id).await? {
        Some(folder) if folder.owner_username == user.username => Ok(()),
        _ => Err(AppError::Validation(
            "folder_id does not name one of your folders".to_string(),
        )),
    }
}
