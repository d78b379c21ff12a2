//! Address-to-coordinates lookup.
//!
//! The lookup itself is an external collaborator behind [`Geocoder`]. Callers
//! go through [`resolve`], which bounds the call with a timeout and turns a
//! failure into an upstream error carrying its own status.

use async_trait::async_trait;
use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;
use wayfare_types::Coordinates;

use crate::error::AppError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeocodeError {
    #[error("Could not find location for the specified address.")]
    AddressNotFound,

    #[error("Geocoding service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn coordinates_for(&self, address: &str) -> Result<Coordinates, GeocodeError>;
}

/// Geocoder that answers every non-blank address with the same coordinates.
///
/// Used when no real geocoding backend is wired in.
#[derive(Clone, Debug)]
pub struct FixedGeocoder {
    coordinates: Coordinates,
}

impl FixedGeocoder {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

impl Default for FixedGeocoder {
    fn default() -> Self {
        Self::new(Coordinates {
            lat: 40.7484474,
            lng: -73.9871516,
        })
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn coordinates_for(&self, address: &str) -> Result<Coordinates, GeocodeError> {
        if address.trim().is_empty() {
            return Err(GeocodeError::AddressNotFound);
        }
        Ok(self.coordinates)
    }
}

impl From<GeocodeError> for AppError {
    fn from(err: GeocodeError) -> Self {
        let status = match err {
            GeocodeError::AddressNotFound => StatusCode::UNPROCESSABLE_ENTITY,
            GeocodeError::Unavailable(_) => StatusCode::BAD_GATEWAY,
        };
        AppError::Upstream {
            status,
            message: err.to_string(),
        }
    }
}

/// Resolve an address, giving up after `timeout`
pub async fn resolve(
    geocoder: &dyn Geocoder,
    address: &str,
    timeout: Duration,
) -> crate::error::Result<Coordinates> {
    match tokio::time::timeout(timeout, geocoder.coordinates_for(address)).await {
        Ok(result) => Ok(result?),
        Err(_) => {
            tracing::warn!("Geocoding timed out after {:?} for {:?}", timeout, address);
            Err(AppError::Upstream {
                status: StatusCode::GATEWAY_TIMEOUT,
                message: "Geocoding service did not respond in time.".to_string(),
            })
        }
    }
}
