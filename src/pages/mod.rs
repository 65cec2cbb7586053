//! # Pages Module
//!
//! Server-rendered sign-in, sign-up and home pages, and the `/api/tracks`
//! catalog proxy used by the home page.

pub mod handlers;
pub mod routes;
pub mod templates;

#[cfg(test)]
mod tests;

pub use routes::pages_routes;
