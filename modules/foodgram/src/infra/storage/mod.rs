pub mod entity;
pub mod migrations;
pub mod recipe_query;
pub mod sea_orm_repo;

pub use migrations::Migrator;
pub use sea_orm_repo::SeaOrmRepository;
