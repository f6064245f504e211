pub mod grid;
pub mod password;
pub mod random;
pub mod token;
pub mod wheel;
