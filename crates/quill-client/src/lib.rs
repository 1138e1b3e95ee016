pub mod client;
pub mod error;
pub mod session;

pub use client::{ApiClient, CoverImage, PostDraft};
pub use error::{ClientError, ClientResult};
pub use session::Session;
