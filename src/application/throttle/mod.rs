//! Gateway request throttling: one serialized, rate-limited broker channel.

pub mod retry;
pub mod throttler;
pub mod window;

pub use retry::RetryPolicy;
pub use throttler::{GatewayThrottler, Lane, PendingCall, ThrottleHandle, ThrottlerConfig};
pub use window::RateWindow;
