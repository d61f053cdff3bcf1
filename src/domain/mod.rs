pub mod diff;
pub mod events;
pub mod models;
pub mod state;

#[cfg(test)]
pub(crate) mod fixtures;
