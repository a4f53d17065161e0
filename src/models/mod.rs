pub mod friend;
#[cfg(test)]
pub mod memory;
pub mod store;
pub mod user;
pub mod validation;
