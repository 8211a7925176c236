pub mod constants;
pub mod generation;
pub mod heroes;
pub mod rate_limit;
pub mod validation;
pub mod wheel;
