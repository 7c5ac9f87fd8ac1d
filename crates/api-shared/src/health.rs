use crate::dto::HealthRes;

/// Simple health service for liveness checks
///
/// Health is answered without authentication and without touching the file store, so it
/// stays cheap enough for load balancer probes.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn new() -> Self {
        Self
    }

    /// Static method to check health without creating an instance
    ///
    /// # Returns
    /// A `HealthRes` indicating the service is healthy.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "attic is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health_reports_ok() {
        let res = HealthService::check_health();

        assert!(res.ok);
        assert_eq!(res.message, "attic is alive");
    }
}
