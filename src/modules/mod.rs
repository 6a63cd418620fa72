pub mod notify;
pub mod render;
pub mod sources;
