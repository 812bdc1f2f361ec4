use std::sync::Arc;

use sqlx::PgPool;

use crate::checkin::{QrEncoder, SessionRegistry};
use crate::config::Config;
use crate::rate_limit::{CheckInRateLimiter, LoginRateLimiter};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub sessions: SessionRegistry,
    pub qr_encoder: Arc<dyn QrEncoder>,
    pub checkin_limiter: CheckInRateLimiter,
    pub login_limiter: LoginRateLimiter,
}
