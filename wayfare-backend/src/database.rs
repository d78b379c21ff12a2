use crate::error::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use wayfare_migration::{Migrator, MigratorTrait};

// An in-memory database lives only as long as its single connection
const IN_MEMORY_CONNECTION_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 365);

pub fn connect_options(database_url: &str) -> ConnectOptions {
    let mut opt = ConnectOptions::new(database_url.to_string());
    if database_url.contains(":memory:") {
        // Every pooled connection would open its own empty in-memory database,
        // and a recycled connection would come back empty
        opt.max_connections(1)
            .min_connections(1)
            .idle_timeout(IN_MEMORY_CONNECTION_LIFETIME)
            .max_lifetime(IN_MEMORY_CONNECTION_LIFETIME);
    } else {
        opt.max_connections(100)
            .min_connections(5)
            .connect_timeout(Duration::from_secs(8))
            .acquire_timeout(Duration::from_secs(8))
            .idle_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(8));
    }
    opt.sqlx_logging(true);
    opt
}

pub async fn setup_database(database_url: &str) -> Result<DatabaseConnection> {
    tracing::info!("🔗 Connecting to database: {}", database_url);

    // Connect to database
    let db = Database::connect(connect_options(database_url)).await?;

    // Run migrations
    tracing::info!("🔄 Running database migrations...");
    Migrator::up(&db, None).await?;
    tracing::info!("✅ Migrations completed successfully");

    Ok(db)
}

/// Fields of a user about to be registered
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub image: String,
}

/// Fields of a place about to be created
#[derive(Clone, Debug)]
pub struct NewPlace {
    pub title: String,
    pub description: String,
    pub address: String,
    pub coordinates: wayfare_types::Coordinates,
    pub image: String,
    pub creator_id: uuid::Uuid,
}

// User record operations. Every function accepts either the pooled
// connection or an open transaction.
pub mod user_ops {
    use super::*;
    use crate::error::AppError;
    use sea_orm::*;
    use std::collections::HashMap;
    use uuid::Uuid;
    use wayfare_entity::{prelude::*, user, user_place};
    use wayfare_types::UserDto;

    #[derive(Debug, FromQueryResult)]
    struct PublicUserRow {
        id: Uuid,
        name: String,
        email: String,
        image: String,
    }

    fn user_not_found() -> AppError {
        AppError::NotFound("Could not find user for the provided id.".to_string())
    }

    pub async fn find_by_id<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<user::Model> {
        User::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(user_not_found)
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        conn: &C,
        email: &str,
    ) -> Result<Option<user::Model>> {
        let user = User::find()
            .filter(user::Column::Email.eq(email))
            .one(conn)
            .await?;

        Ok(user)
    }

    /// List every user with their place ids, without reading the password column
    pub async fn find_all_excluding_secrets<C: ConnectionTrait>(conn: &C) -> Result<Vec<UserDto>> {
        let rows = User::find()
            .select_only()
            .columns([
                user::Column::Id,
                user::Column::Name,
                user::Column::Email,
                user::Column::Image,
            ])
            .order_by_asc(user::Column::CreatedAt)
            .into_model::<PublicUserRow>()
            .all(conn)
            .await?;

        let mut places: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for link in UserPlace::find().all(conn).await? {
            places.entry(link.user_id).or_default().push(link.place_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| UserDto {
                places: places.remove(&row.id).unwrap_or_default(),
                id: row.id,
                name: row.name,
                email: row.email,
                image: row.image,
            })
            .collect())
    }

    pub async fn create<C: ConnectionTrait>(conn: &C, new_user: NewUser) -> Result<user::Model> {
        let user_model = user::ActiveModel {
            name: Set(new_user.name),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            image: Set(new_user.image),
            ..user::ActiveModel::new()
        };

        user_model.insert(conn).await.map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict("User exists already, please login instead.".to_string())
            }
            _ => AppError::Database(e),
        })
    }

    /// Ids of the places in the user's place set
    pub async fn place_ids<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<Vec<Uuid>> {
        let links = UserPlace::find()
            .filter(user_place::Column::UserId.eq(user_id))
            .all(conn)
            .await?;

        Ok(links.into_iter().map(|link| link.place_id).collect())
    }

    pub async fn add_place<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        place_id: Uuid,
    ) -> Result<()> {
        find_by_id(conn, user_id).await?;

        let link = user_place::ActiveModel {
            user_id: Set(user_id),
            place_id: Set(place_id),
        };
        UserPlace::insert(link).exec_without_returning(conn).await?;

        Ok(())
    }

    pub async fn remove_place<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
        place_id: Uuid,
    ) -> Result<()> {
        find_by_id(conn, user_id).await?;

        UserPlace::delete_many()
            .filter(user_place::Column::UserId.eq(user_id))
            .filter(user_place::Column::PlaceId.eq(place_id))
            .exec(conn)
            .await?;

        Ok(())
    }
}

// Place record operations
pub mod place_ops {
    use super::*;
    use crate::error::AppError;
    use sea_orm::*;
    use uuid::Uuid;
    use wayfare_entity::{place, prelude::*, user};

    fn place_not_found() -> AppError {
        AppError::NotFound("Could not find place for the provided id.".to_string())
    }

    pub async fn find_by_id<C: ConnectionTrait>(conn: &C, place_id: Uuid) -> Result<place::Model> {
        Place::find_by_id(place_id)
            .one(conn)
            .await?
            .ok_or_else(place_not_found)
    }

    /// Load a place together with the user who created it
    pub async fn find_with_creator<C: ConnectionTrait>(
        conn: &C,
        place_id: Uuid,
    ) -> Result<(place::Model, user::Model)> {
        let (place, creator) = Place::find_by_id(place_id)
            .find_also_related(User)
            .one(conn)
            .await?
            .ok_or_else(place_not_found)?;

        let creator = creator.ok_or_else(|| {
            AppError::NotFound("Could not find the creator of this place.".to_string())
        })?;

        Ok((place, creator))
    }

    /// Places created by the user, oldest first; empty when there are none
    pub async fn find_all_by_creator<C: ConnectionTrait>(
        conn: &C,
        user_id: Uuid,
    ) -> Result<Vec<place::Model>> {
        let places = Place::find()
            .filter(place::Column::CreatorId.eq(user_id))
            .order_by_asc(place::Column::CreatedAt)
            .all(conn)
            .await?;

        Ok(places)
    }

    pub async fn create<C: ConnectionTrait>(conn: &C, new_place: NewPlace) -> Result<place::Model> {
        let place_model = place::ActiveModel {
            title: Set(new_place.title),
            description: Set(new_place.description),
            address: Set(new_place.address),
            lat: Set(new_place.coordinates.lat),
            lng: Set(new_place.coordinates.lng),
            image: Set(new_place.image),
            creator_id: Set(new_place.creator_id),
            ..place::ActiveModel::new()
        };

        let place = place_model.insert(conn).await?;
        Ok(place)
    }

    /// Replace the title and description of a place, leaving every other field alone
    pub async fn update<C: ConnectionTrait>(
        conn: &C,
        place_id: Uuid,
        title: String,
        description: String,
    ) -> Result<place::Model> {
        let place = find_by_id(conn, place_id).await?;

        let mut place: place::ActiveModel = place.into();
        place.title = Set(title);
        place.description = Set(description);
        let updated_place = place.update(conn).await?;

        Ok(updated_place)
    }

    pub async fn delete<C: ConnectionTrait>(conn: &C, place_id: Uuid) -> Result<()> {
        let result = Place::delete_by_id(place_id).exec(conn).await?;

        if result.rows_affected == 0 {
            return Err(place_not_found());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use sea_orm::{EntityTrait, PaginatorTrait, TransactionTrait};
    use uuid::Uuid;
    use wayfare_entity::prelude::*;
    use wayfare_types::Coordinates;

    async fn test_db() -> DatabaseConnection {
        setup_database("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_in_memory_connection_is_never_recycled() {
        let opt = connect_options("sqlite::memory:");

        assert_eq!(opt.get_max_connections(), Some(1));
        assert_eq!(opt.get_min_connections(), Some(1));
        assert!(opt.get_max_lifetime().unwrap() >= Duration::from_secs(60 * 60 * 24));
        assert!(opt.get_idle_timeout().unwrap() >= Duration::from_secs(60 * 60 * 24));
    }

    #[test]
    fn test_file_database_uses_pool_settings() {
        let opt = connect_options("sqlite://wayfare.db?mode=rwc");

        assert_eq!(opt.get_max_connections(), Some(100));
        assert_eq!(opt.get_max_lifetime(), Some(Duration::from_secs(8)));
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$not-a-real-hash".to_string(),
            image: "uploads/images/ada.png".to_string(),
        }
    }

    fn new_place(creator_id: Uuid) -> NewPlace {
        NewPlace {
            title: "Empire State Building".to_string(),
            description: "One of the most famous sky scrapers in the world".to_string(),
            address: "20 W 34th St, New York, NY 10001".to_string(),
            coordinates: Coordinates {
                lat: 40.7484474,
                lng: -73.9871516,
            },
            image: "uploads/images/esb.jpg".to_string(),
            creator_id,
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let db = test_db().await;

        user_ops::create(&db, new_user("a@x.com")).await.unwrap();
        let err = user_ops::create(&db, new_user("a@x.com")).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(User::find().count(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();

        let found = user_ops::find_by_email(&db, "a@x.com").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
        assert!(user_ops::find_by_email(&db, "b@x.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_listing_omits_password_hash() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();

        let users = user_ops::find_all_excluding_secrets(&db).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, user.id);
        assert!(users[0].places.is_empty());

        let json = serde_json::to_string(&users).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }

    #[tokio::test]
    async fn test_place_set_requires_existing_user() {
        let db = test_db().await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            user_ops::add_place(&db, missing, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            user_ops::remove_place(&db, missing, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_place_set_inside_transaction() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();

        let txn = db.begin().await.unwrap();
        let place = place_ops::create(&txn, new_place(user.id)).await.unwrap();
        user_ops::add_place(&txn, user.id, place.id).await.unwrap();
        txn.commit().await.unwrap();

        assert_eq!(
            user_ops::place_ids(&db, user.id).await.unwrap(),
            vec![place.id]
        );

        let txn = db.begin().await.unwrap();
        user_ops::remove_place(&txn, user.id, place.id).await.unwrap();
        place_ops::delete(&txn, place.id).await.unwrap();
        txn.commit().await.unwrap();

        assert!(user_ops::place_ids(&db, user.id).await.unwrap().is_empty());
        assert!(matches!(
            place_ops::find_by_id(&db, place.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_touches_only_title_and_description() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();
        let place = place_ops::create(&db, new_place(user.id)).await.unwrap();

        let updated = place_ops::update(
            &db,
            place.id,
            "Chrysler Building".to_string(),
            "Art deco landmark".to_string(),
        )
        .await
        .unwrap();

        assert_eq!(updated.title, "Chrysler Building");
        assert_eq!(updated.description, "Art deco landmark");
        assert_eq!(updated.address, place.address);
        assert_eq!(updated.lat, place.lat);
        assert_eq!(updated.image, place.image);
        assert_eq!(updated.creator_id, place.creator_id);

        assert!(matches!(
            place_ops::update(&db, Uuid::new_v4(), "t".into(), "d".into()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_all_by_creator_empty_is_ok() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();

        assert!(place_ops::find_all_by_creator(&db, user.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_find_with_creator() {
        let db = test_db().await;
        let user = user_ops::create(&db, new_user("a@x.com")).await.unwrap();
        let place = place_ops::create(&db, new_place(user.id)).await.unwrap();

        let (found, creator) = place_ops::find_with_creator(&db, place.id).await.unwrap();
        assert_eq!(found.id, place.id);
        assert_eq!(creator.id, user.id);
    }
}
