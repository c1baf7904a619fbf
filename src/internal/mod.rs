// Internal utilities shared across modules

pub mod error;
