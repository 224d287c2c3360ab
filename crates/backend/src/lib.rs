//! Client for the moments REST backend.
//!
//! The backend is a thin CRUD service over a document store. This crate
//! only covers the video endpoints the upload pipeline needs.

pub mod client;

pub use client::{Client, Error};
