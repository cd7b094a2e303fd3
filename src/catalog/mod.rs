pub mod indices;
pub mod schema;
pub mod tables;
