pub use super::place::Entity as Place;
pub use super::user::Entity as User;
pub use super::user_place::Entity as UserPlace;
