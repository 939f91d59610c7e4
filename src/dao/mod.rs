/// Song library persistence backends.
pub mod catalog_store;
/// Database model definitions.
pub mod models;
/// External video catalog search.
pub mod video_search;
