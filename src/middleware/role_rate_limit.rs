use axum::http::Request;
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::KeyExtractor, GovernorError, GovernorLayer,
};
use uuid::Uuid;

use crate::middleware::rate_limit::rate_limit_error_handler;
use crate::utils::jwt::Claims;

/// Keys requests by the authenticated user id set by `auth_middleware`.
#[derive(Debug, Clone, Copy)]
pub struct UserIdExtractor;

impl KeyExtractor for UserIdExtractor {
    type Key = Uuid;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        req.extensions()
            .get::<Claims>()
            .map(|claims| claims.sub)
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RoleGovernorLayer = GovernorLayer<
    UserIdExtractor,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
    axum::body::Body,
>;

/// Roles that get a per-user limiter. Admin routes rely on the global one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitedRole {
    Driver,
    Passenger,
}

impl RateLimitedRole {
    /// (milliseconds per token, burst)
    fn quota(self) -> (u64, u32) {
        match self {
            // 500 per minute
            RateLimitedRole::Driver => (120, 500),
            // 100 per minute; scans and wallet calls share this budget
            RateLimitedRole::Passenger => (600, 100),
        }
    }
}

/// Create a GovernorLayer for a specific role. Must sit inside `auth_middleware`.
pub fn create_role_governor(role: RateLimitedRole) -> RoleGovernorLayer {
    let (per_ms, burst) = role.quota();

    let config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(burst)
            .key_extractor(UserIdExtractor)
            .finish()
            .expect("rate limit period and burst are non-zero"),
    );

    GovernorLayer::new(config).error_handler(rate_limit_error_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;

    #[test]
    fn test_extracts_user_id_from_claims() {
        let user_id = Uuid::new_v4();
        let mut request = Request::new(());
        request.extensions_mut().insert(Claims {
            sub: user_id,
            email: "p@example.com".to_string(),
            role: UserRole::Passenger,
            exp: 0,
            iat: 0,
        });

        assert_eq!(UserIdExtractor.extract(&request).unwrap(), user_id);
    }

    #[test]
    fn test_unauthenticated_request_has_no_key() {
        let request = Request::new(());
        assert!(matches!(
            UserIdExtractor.extract(&request),
            Err(GovernorError::UnableToExtractKey)
        ));
    }
}
