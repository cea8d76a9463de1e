//! Core data models for the flyer board service.
//!
//! Every record is stored as a schemaless [`document::Document`] inside a
//! named collection. The typed views in `upload` and `contact` are decoded
//! from those documents and serialize as the JSON clients consume.

pub mod contact;
pub mod document;
pub mod upload;
