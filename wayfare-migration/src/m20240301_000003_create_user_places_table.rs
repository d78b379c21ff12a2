use sea_orm_migration::prelude::*;

use super::m20240301_000001_create_users_table::Users;
use super::m20240301_000002_create_places_table::Places;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserPlaces::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserPlaces::UserId).uuid().not_null())
                    .col(ColumnDef::new(UserPlaces::PlaceId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(UserPlaces::UserId)
                            .col(UserPlaces::PlaceId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_places-user_id")
                            .from(UserPlaces::Table, UserPlaces::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_places-place_id")
                            .from(UserPlaces::Table, UserPlaces::PlaceId)
                            .to(Places::Table, Places::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserPlaces::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum UserPlaces {
    Table,
    UserId,
    PlaceId,
}
