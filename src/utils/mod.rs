//! # Utility Modules
//!
//! This module contains utility functions, constants, and validators used
//! throughout the Natours application.
//!
//! ## Available Utilities
//!
//! - **Constants** (`constant`) - Application-wide configuration constants
//! - **HTML** (`html`) - Email bodies and server-rendered pages
//! - **Query** (`query`) - Query-string driven filtering, sorting, projection and paging
//! - **Secrets** (`secret`) - Secret loading from files or environment
//! - **Validators** (`validator`) - Input parsing helpers

pub mod constant;
pub mod html;
pub mod query;
pub mod secret;
pub mod validator;
