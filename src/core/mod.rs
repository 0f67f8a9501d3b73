pub mod engine;
pub mod events;
pub mod model;
pub mod reducer;
pub mod store;
pub mod view;
