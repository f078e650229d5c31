pub mod ast;
pub mod catalog;
pub mod executor;
pub mod index;
pub mod predicate;
pub mod schema;
pub mod table;
pub mod types;
