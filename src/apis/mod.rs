pub mod steam_reviews;
pub mod steam_store;
