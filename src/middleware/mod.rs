pub mod identity;
pub mod response;

pub use identity::{identity_middleware, Identity, IdentityHeaders};
pub use response::{ApiResponse, ApiResult, FileResponse};
