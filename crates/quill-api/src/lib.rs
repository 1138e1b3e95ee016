pub mod admin;
pub mod ai;
pub mod auth;
pub mod comments;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod posts;
pub mod routes;
pub mod state;
pub mod tags;
pub mod uploads;
pub mod users;
pub mod views;

pub use routes::router;
