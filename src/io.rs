//! Loading of matrix descriptions and writing of backend manifests.
pub mod description;
pub mod manifest;
