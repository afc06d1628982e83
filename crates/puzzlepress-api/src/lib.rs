pub mod auth;
pub mod blog;
pub mod dashboard;
pub mod error;
pub mod extract;
pub mod items;
pub mod middleware;
pub mod puzzles;
pub mod routes;

pub use routes::router;
