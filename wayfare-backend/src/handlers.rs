use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use wayfare_entity::place;

use crate::{
    accounts,
    auth::AuthUser,
    coordinator::{CreatePlace, UpdatePlace},
    database::{place_ops, user_ops},
    error::{AppError, Result},
    AppState, AuthResponse, Coordinates, CreatePlaceRequest, LoginRequest, MessageResponse,
    PlaceDto, PlaceResponse, PlacesResponse, SignupRequest, UpdatePlaceRequest, UsersResponse,
};

const MIN_DESCRIPTION_LEN: usize = 5;
const MIN_PASSWORD_LEN: usize = 6;

fn place_dto(place: place::Model) -> PlaceDto {
    PlaceDto {
        id: place.id,
        title: place.title,
        description: place.description,
        image: place.image,
        address: place.address,
        location: Coordinates {
            lat: place.lat,
            lng: place.lng,
        },
        creator: place.creator_id,
    }
}

// Ids that are not UUIDs cannot name a stored record
fn parse_id(raw: &str, not_found: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.to_string()))
}

fn json_body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| {
            tracing::debug!("Rejected request body: {}", rejection);
            AppError::invalid_input()
        })
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn is_valid_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.trim().contains(char::is_whitespace)
        }
        None => false,
    }
}

fn validate_place_text(title: &str, description: &str) -> Result<()> {
    if is_blank(title) || description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        return Err(AppError::invalid_input());
    }
    Ok(())
}

fn validate_create(request: &CreatePlaceRequest) -> Result<()> {
    validate_place_text(&request.title, &request.description)?;
    if is_blank(&request.address) || is_blank(&request.image) {
        return Err(AppError::invalid_input());
    }
    Ok(())
}

fn validate_signup(request: &SignupRequest) -> Result<()> {
    if is_blank(&request.name)
        || !is_valid_email(&request.email)
        || request.password.chars().count() < MIN_PASSWORD_LEN
        || is_blank(&request.image)
    {
        return Err(AppError::invalid_input());
    }
    Ok(())
}

// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "wayfare-backend",
        "timestamp": chrono::Utc::now()
    }))
}

pub async fn get_place_by_id(
    State(state): State<AppState>,
    Path(place_id): Path<String>,
) -> Result<Json<PlaceResponse>> {
    let place_id = parse_id(&place_id, "Could not find place for the provided id.")?;
    let place = place_ops::find_by_id(&state.db, place_id).await?;

    Ok(Json(PlaceResponse {
        place: place_dto(place),
    }))
}

// A user without places is reported as not found
pub async fn get_places_by_user_id(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<PlacesResponse>> {
    let not_found = "Could not find places for the provided user id.";
    let user_id = parse_id(&user_id, not_found)?;

    let places = place_ops::find_all_by_creator(&state.db, user_id).await?;
    if places.is_empty() {
        return Err(AppError::NotFound(not_found.to_string()));
    }

    Ok(Json(PlacesResponse {
        places: places.into_iter().map(place_dto).collect(),
    }))
}

pub async fn create_place(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: std::result::Result<Json<CreatePlaceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PlaceResponse>)> {
    let request = json_body(payload)?;
    validate_create(&request)?;

    let place = state
        .places
        .create(CreatePlace {
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            address: request.address.trim().to_string(),
            image: request.image,
            creator_id: auth.user_id,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceResponse {
            place: place_dto(place),
        }),
    ))
}

pub async fn update_place(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(place_id): Path<String>,
    payload: std::result::Result<Json<UpdatePlaceRequest>, JsonRejection>,
) -> Result<Json<PlaceResponse>> {
    let request = json_body(payload)?;
    validate_place_text(&request.title, &request.description)?;
    let place_id = parse_id(&place_id, "Could not find place for the provided id.")?;

    let place = state
        .places
        .update(UpdatePlace {
            place_id,
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            requester_id: auth.user_id,
        })
        .await?;

    Ok(Json(PlaceResponse {
        place: place_dto(place),
    }))
}

pub async fn delete_place(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(place_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    let place_id = parse_id(&place_id, "Could not find place for the provided id.")?;

    state.places.delete(place_id, auth.user_id).await?;

    Ok(Json(MessageResponse {
        message: "Deleted place.".to_string(),
    }))
}

pub async fn get_users(State(state): State<AppState>) -> Result<Json<UsersResponse>> {
    let users = user_ops::find_all_excluding_secrets(&state.db).await?;

    Ok(Json(UsersResponse { users }))
}

pub async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>)> {
    let request = json_body(payload)?;
    validate_signup(&request)?;

    let response = accounts::signup(&state.db, &state.credentials, request).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>> {
    let request = json_body(payload)?;

    let response = accounts::login(&state.db, &state.credentials, request).await?;

    Ok(Json(response))
}
