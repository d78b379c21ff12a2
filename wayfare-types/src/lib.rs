use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Shared value types
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

// Request types
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreatePlaceRequest {
    pub title: String,
    pub description: String,
    pub address: String,
    /// Relative path of an image that has already been stored
    pub image: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UpdatePlaceRequest {
    pub title: String,
    pub description: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub image: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Response types
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PlaceDto {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: String,
    pub address: String,
    pub location: Coordinates,
    pub creator: Uuid,
}

/// Public view of a user. The password hash never leaves the server.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: String,
    pub places: Vec<Uuid>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PlaceResponse {
    pub place: PlaceDto,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct PlacesResponse {
    pub places: Vec<PlaceDto>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct UsersResponse {
    pub users: Vec<UserDto>,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
    pub token: String,
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct MessageResponse {
    pub message: String,
}
