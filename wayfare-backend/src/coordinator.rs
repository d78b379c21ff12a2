//! Place lifecycle.
//!
//! A place and its entry in the creator's place set are always written in
//! the same transaction: between transactions, `place.creator_id == user.id`
//! holds exactly when the place id is in that user's place set.

use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wayfare_entity::place;

use crate::{
    database::{place_ops, user_ops, NewPlace},
    error::{AppError, Result},
    geocoding::{self, Geocoder},
    storage::ImageStorage,
};

#[derive(Clone, Debug)]
pub struct CreatePlace {
    pub title: String,
    pub description: String,
    pub address: String,
    pub image: String,
    pub creator_id: Uuid,
}

#[derive(Clone, Debug)]
pub struct UpdatePlace {
    pub place_id: Uuid,
    pub title: String,
    pub description: String,
    pub requester_id: Uuid,
}

#[derive(Clone)]
pub struct PlaceCoordinator {
    db: DatabaseConnection,
    geocoder: Arc<dyn Geocoder>,
    images: ImageStorage,
    geocode_timeout: Duration,
}

impl PlaceCoordinator {
    pub fn new(
        db: DatabaseConnection,
        geocoder: Arc<dyn Geocoder>,
        images: ImageStorage,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            db,
            geocoder,
            images,
            geocode_timeout,
        }
    }

    /// Geocode the address, then insert the place and link it to its creator
    pub async fn create(&self, request: CreatePlace) -> Result<place::Model> {
        let coordinates = geocoding::resolve(
            self.geocoder.as_ref(),
            &request.address,
            self.geocode_timeout,
        )
        .await?;

        let creator = user_ops::find_by_id(&self.db, request.creator_id).await?;

        let new_place = NewPlace {
            title: request.title,
            description: request.description,
            address: request.address,
            coordinates,
            image: request.image,
            creator_id: creator.id,
        };

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| persistence_failure("create place", e.into()))?;

        let outcome = async {
            let place = place_ops::create(&txn, new_place).await?;
            user_ops::add_place(&txn, creator.id, place.id).await?;
            Ok::<_, AppError>(place)
        }
        .await;

        let place = finish(txn, outcome, "create place").await?;

        tracing::info!(
            "📍 Place created: {} by user {} at ({}, {})",
            place.id,
            place.creator_id,
            place.lat,
            place.lng
        );

        Ok(place)
    }

    /// Replace title and description; only the creator may do this
    pub async fn update(&self, request: UpdatePlace) -> Result<place::Model> {
        let place = place_ops::find_by_id(&self.db, request.place_id).await?;

        if !place.is_owned_by(request.requester_id) {
            return Err(AppError::Unauthorized(
                "You are not allowed to edit this place.".to_string(),
            ));
        }

        let updated_place =
            place_ops::update(&self.db, place.id, request.title, request.description)
                .await
                .map_err(|e| match e {
                    err @ AppError::NotFound(_) => err,
                    other => persistence_failure("update place", other),
                })?;

        tracing::info!("✏️  Place updated: {}", updated_place.id);

        Ok(updated_place)
    }

    /// Delete the place and unlink it from its creator; only the creator may do this.
    ///
    /// The image file is removed after commit on a best-effort basis.
    pub async fn delete(&self, place_id: Uuid, requester_id: Uuid) -> Result<()> {
        let (place, creator) = place_ops::find_with_creator(&self.db, place_id).await?;

        if creator.id != requester_id {
            return Err(AppError::Unauthorized(
                "You are not allowed to delete this place.".to_string(),
            ));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| persistence_failure("delete place", e.into()))?;

        let outcome = async {
            // The set entry references the place row, so it goes first
            user_ops::remove_place(&txn, creator.id, place.id).await?;
            place_ops::delete(&txn, place.id).await?;
            Ok::<_, AppError>(())
        }
        .await;

        finish(txn, outcome, "delete place").await?;

        tracing::info!("🗑️  Place deleted: {} (user {})", place.id, creator.id);

        if let Err(e) = self.images.delete_image(&place.image).await {
            tracing::warn!(
                "Failed to delete image for place {}: {} - {}",
                place.id,
                place.image,
                e
            );
        }

        Ok(())
    }
}

/// Commit on success, roll back on failure.
///
/// A record that vanished mid-transaction (a concurrent delete) stays `NotFound`.
async fn finish<T>(txn: DatabaseTransaction, outcome: Result<T>, action: &str) -> Result<T> {
    match outcome {
        Ok(value) => {
            txn.commit()
                .await
                .map_err(|e| persistence_failure(action, e.into()))?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::warn!("Rollback failed during {}: {}", action, rollback_err);
            }
            match e {
                err @ AppError::NotFound(_) => Err(err),
                other => Err(persistence_failure(action, other)),
            }
        }
    }
}

fn persistence_failure(action: &str, cause: AppError) -> AppError {
    tracing::error!("Failed to {}: {}", action, cause);
    AppError::Persistence(format!("Could not {}, please try again later.", action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{setup_database, NewUser};
    use crate::geocoding::{FixedGeocoder, GeocodeError};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait};
    use std::collections::HashSet;
    use tempfile::TempDir;
    use wayfare_entity::{prelude::*, user};
    use wayfare_types::Coordinates;

    struct NowhereGeocoder;

    #[async_trait]
    impl Geocoder for NowhereGeocoder {
        async fn coordinates_for(
            &self,
            _address: &str,
        ) -> std::result::Result<Coordinates, GeocodeError> {
            Err(GeocodeError::AddressNotFound)
        }
    }

    struct Fixture {
        db: DatabaseConnection,
        coordinator: PlaceCoordinator,
        uploads: TempDir,
    }

    async fn fixture_with(geocoder: Arc<dyn Geocoder>) -> Fixture {
        let db = setup_database("sqlite::memory:").await.unwrap();
        let uploads = TempDir::new().unwrap();
        let coordinator = PlaceCoordinator::new(
            db.clone(),
            geocoder,
            ImageStorage::new(uploads.path()),
            Duration::from_secs(1),
        );
        Fixture {
            db,
            coordinator,
            uploads,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(FixedGeocoder::default())).await
    }

    async fn add_user(db: &DatabaseConnection, email: &str) -> user::Model {
        user_ops::create(
            db,
            NewUser {
                name: "Max".to_string(),
                email: email.to_string(),
                password_hash: "$argon2id$placeholder".to_string(),
                image: "images/max.png".to_string(),
            },
        )
        .await
        .unwrap()
    }

    fn create_request(creator_id: Uuid) -> CreatePlace {
        CreatePlace {
            title: "Empire State Building".to_string(),
            description: "One of the most famous sky scrapers in the world".to_string(),
            address: "20 W 34th St, New York, NY 10001".to_string(),
            image: "images/esb.jpg".to_string(),
            creator_id,
        }
    }

    /// Every place is in exactly its creator's set, and every set entry is a live place
    async fn assert_links_consistent(db: &DatabaseConnection) {
        let places: HashSet<(Uuid, Uuid)> = Place::find()
            .all(db)
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.creator_id, p.id))
            .collect();
        let links: HashSet<(Uuid, Uuid)> = UserPlace::find()
            .all(db)
            .await
            .unwrap()
            .into_iter()
            .map(|l| (l.user_id, l.place_id))
            .collect();

        assert_eq!(places, links);
    }

    #[tokio::test]
    async fn test_create_links_place_to_creator() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;

        let place = f.coordinator.create(create_request(user.id)).await.unwrap();

        assert_eq!(place.creator_id, user.id);
        assert_eq!(place.lat, 40.7484474);
        assert_eq!(
            user_ops::place_ids(&f.db, user.id).await.unwrap(),
            vec![place.id]
        );
        assert_links_consistent(&f.db).await;
    }

    #[tokio::test]
    async fn test_create_for_unknown_creator() {
        let f = fixture().await;

        let err = f
            .coordinator
            .create(create_request(Uuid::new_v4()))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(Place::find().count(&f.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_geocoding_failure_mutates_nothing() {
        let f = fixture_with(Arc::new(NowhereGeocoder)).await;
        let user = add_user(&f.db, "a@x.com").await;

        let err = f
            .coordinator
            .create(create_request(user.id))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(matches!(err, AppError::Upstream { .. }));
        assert_eq!(Place::find().count(&f.db).await.unwrap(), 0);
        assert_eq!(UserPlace::find().count(&f.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_rolls_back_when_link_fails() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;

        // The place insert succeeds, the place-set write cannot
        f.db.execute_unprepared("DROP TABLE user_places")
            .await
            .unwrap();

        let err = f
            .coordinator
            .create(create_request(user.id))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(Place::find().count(&f.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_by_owner() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;
        let place = f.coordinator.create(create_request(user.id)).await.unwrap();

        let updated = f
            .coordinator
            .update(UpdatePlace {
                place_id: place.id,
                title: "ESB".to_string(),
                description: "Still tall".to_string(),
                requester_id: user.id,
            })
            .await
            .unwrap();

        assert_eq!(updated.title, "ESB");
        assert_eq!(updated.description, "Still tall");
        assert_eq!(updated.address, place.address);
    }

    #[tokio::test]
    async fn test_update_by_stranger_changes_nothing() {
        let f = fixture().await;
        let owner = add_user(&f.db, "a@x.com").await;
        let stranger = add_user(&f.db, "b@x.com").await;
        let place = f.coordinator.create(create_request(owner.id)).await.unwrap();

        let err = f
            .coordinator
            .update(UpdatePlace {
                place_id: place.id,
                title: "Mine now".to_string(),
                description: "Definitely mine".to_string(),
                requester_id: stranger.id,
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(place_ops::find_by_id(&f.db, place.id).await.unwrap(), place);
    }

    #[tokio::test]
    async fn test_update_missing_place() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;

        let err = f
            .coordinator
            .update(UpdatePlace {
                place_id: Uuid::new_v4(),
                title: "t".to_string(),
                description: "descr".to_string(),
                requester_id: user.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_by_stranger_changes_nothing() {
        let f = fixture().await;
        let owner = add_user(&f.db, "a@x.com").await;
        let stranger = add_user(&f.db, "b@x.com").await;
        let place = f.coordinator.create(create_request(owner.id)).await.unwrap();

        let err = f
            .coordinator
            .delete(place.id, stranger.id)
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(place_ops::find_by_id(&f.db, place.id).await.unwrap(), place);
        assert_links_consistent(&f.db).await;
    }

    #[tokio::test]
    async fn test_delete_unlinks_and_removes_image() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;
        let place = f.coordinator.create(create_request(user.id)).await.unwrap();
        let other = f.coordinator.create(create_request(user.id)).await.unwrap();

        let image = f.uploads.path().join("images/esb.jpg");
        std::fs::create_dir_all(image.parent().unwrap()).unwrap();
        std::fs::write(&image, b"jpeg").unwrap();

        f.coordinator.delete(place.id, user.id).await.unwrap();

        assert!(matches!(
            place_ops::find_by_id(&f.db, place.id).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            user_ops::place_ids(&f.db, user.id).await.unwrap(),
            vec![other.id]
        );
        assert!(!image.exists());
        assert_links_consistent(&f.db).await;
    }

    #[tokio::test]
    async fn test_delete_survives_image_failure() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;
        let mut request = create_request(user.id);
        request.image = "../outside.jpg".to_string();
        let place = f.coordinator.create(request).await.unwrap();

        f.coordinator.delete(place.id, user.id).await.unwrap();

        assert_eq!(Place::find().count(&f.db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_rolls_back_when_place_delete_fails() {
        let f = fixture().await;
        let owner = add_user(&f.db, "a@x.com").await;
        let other = add_user(&f.db, "b@x.com").await;
        let place = f.coordinator.create(create_request(owner.id)).await.unwrap();

        // A second set entry keeps the place row referenced after the
        // creator's entry is removed, so the place delete fails
        user_ops::add_place(&f.db, other.id, place.id).await.unwrap();

        let err = f.coordinator.delete(place.id, owner.id).await.unwrap_err();

        assert!(matches!(err, AppError::Persistence(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(place_ops::find_by_id(&f.db, place.id).await.unwrap(), place);
        assert_eq!(
            user_ops::place_ids(&f.db, owner.id).await.unwrap(),
            vec![place.id]
        );
    }

    #[tokio::test]
    async fn test_vanished_record_stays_not_found_after_rollback() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;
        let place = f.coordinator.create(create_request(user.id)).await.unwrap();

        // The losing side of two racing deletes: its own unlink ran, then the
        // place was already gone
        let txn = f.db.begin().await.unwrap();
        user_ops::remove_place(&txn, user.id, place.id).await.unwrap();
        let outcome: Result<()> = Err(AppError::NotFound("Place not found".to_string()));

        let err = finish(txn, outcome, "delete place").await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            user_ops::place_ids(&f.db, user.id).await.unwrap(),
            vec![place.id]
        );
    }

    #[tokio::test]
    async fn test_delete_missing_place() {
        let f = fixture().await;
        let user = add_user(&f.db, "a@x.com").await;

        let err = f
            .coordinator
            .delete(Uuid::new_v4(), user.id)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_links_stay_consistent_across_users() {
        let f = fixture().await;
        let a = add_user(&f.db, "a@x.com").await;
        let b = add_user(&f.db, "b@x.com").await;

        let a1 = f.coordinator.create(create_request(a.id)).await.unwrap();
        f.coordinator.create(create_request(a.id)).await.unwrap();
        let b1 = f.coordinator.create(create_request(b.id)).await.unwrap();
        assert_links_consistent(&f.db).await;

        f.coordinator.delete(a1.id, a.id).await.unwrap();
        f.coordinator.delete(b1.id, b.id).await.unwrap();
        assert_links_consistent(&f.db).await;

        assert_eq!(user_ops::place_ids(&f.db, a.id).await.unwrap().len(), 1);
        assert!(user_ops::place_ids(&f.db, b.id).await.unwrap().is_empty());
    }
}
