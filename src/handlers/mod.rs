mod fallback;
pub mod csrf;
pub mod spa;
pub mod users;

pub use fallback::not_found;
