pub mod context;
pub mod user_id;

pub use user_id::CurrentUser;
