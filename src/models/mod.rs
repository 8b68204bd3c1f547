//! Data models
//!
//! Database entities (User, Session, Blog) plus the input, filter and
//! pagination types the services accept.

mod blog;
mod session;
mod user;

pub use blog::{
    Blog, BlogAction, BlogCategory, BlogFilter, BlogStatus, CreateBlogInput, ListParams,
    PagedResult, UpdateBlogInput,
};
pub use session::Session;
pub use user::{Actor, Capability, UpdateProfileInput, User, UserRole};
