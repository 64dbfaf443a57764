//! # Business Logic Services
//!
//! This module contains the core business logic services for the Natours application.
//! Services encapsulate domain-specific functionality and provide clean interfaces
//! for use by HTTP handlers and middleware.
//!
//! ## Available Services
//!
//! - **Email** (`email`) - Email delivery service with multiple implementations
//! - **JWT** (`jwt`) - JSON Web Token signing and verification
//! - **Password** (`password`) - Argon2id credential hashing
//! - **Rating** (`rating`) - Tour rating aggregate maintenance

pub mod email;
pub mod jwt;
pub mod password;
pub mod rating;
