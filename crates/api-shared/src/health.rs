use crate::dto::HealthRes;

/// Liveness check behind `GET /health`.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "HIP tools are alive".into(),
        }
    }
}
