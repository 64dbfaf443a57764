//! # HTTP Request Handlers
//!
//! One module per resource. Handlers return [`AppResult`](crate::error::AppResult)
//! and leave response shaping of failures to the error responder.
//!
//! ## Available Handlers
//!
//! - **Authentication** (`auth`) - Signup, login, logout and the password flows
//! - **Users** (`users`) - Self-service account endpoints and admin account management
//! - **Tours** (`tours`) - Tour CRUD, statistics and geo queries
//! - **Reviews** (`reviews`) - Reviews, also nested under a tour
//! - **Bookings** (`bookings`) - Booking administration
//! - **Views** (`views`) - Server-rendered pages
//! - **Health Check** (`health_check`) - Liveness probe
//!
//! `factory` holds the list/read/delete operations shared by the resources.

mod auth;
mod bookings;
pub mod factory;
mod health_check;
mod reviews;
mod tours;
mod users;
mod views;

pub use auth::*;
pub use bookings::*;
pub use health_check::*;
pub use reviews::*;
pub use tours::*;
pub use users::*;
pub use views::*;
