pub mod authenticated_user;
pub mod rate_limit;
pub mod session_claims;

pub use authenticated_user::*;
pub use rate_limit::*;
pub use session_claims::*;
