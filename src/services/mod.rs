//! Services layer - Business logic
//!
//! Services own the rules; repositories only persist. Each service has its
//! own error enum that the API layer maps onto HTTP responses.

pub mod blog;
pub mod classifier;
pub mod lifecycle;
pub mod media;
pub mod password;
pub mod rate_limiter;
pub mod user;

pub use blog::{BlogService, BlogServiceError, BlogStats, StatusCounts, HOME_LATEST_COUNT};
pub use classifier::{CategoryClassifier, ClassifierError, DisabledClassifier, OpenAiClassifier};
pub use lifecycle::PermissionDenied;
pub use media::{media_url, MediaError, MediaKind, MediaStore};
pub use password::{hash_password, verify_password};
pub use rate_limiter::LoginRateLimiter;
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
