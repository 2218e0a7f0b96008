pub mod admission;
pub mod client_ip;
pub mod rate_limiting;

pub use admission::{AdmissionGateway, AdmissionPolicy, SESSION_COOKIE_NAME};
pub use rate_limiting::{
    MemoryRateLimitStore,
    RateLimitStore,
    RateLimiter,
    RedisRateLimitStore,
    start_memory_store_cleanup_task,
};
