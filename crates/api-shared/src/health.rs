use crate::dto::HealthRes;

/// Health service shared by the API surfaces.
#[derive(Clone, Default)]
pub struct HealthService;

impl HealthService {
    /// Static health check; does not require an instance.
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "MediRx is alive".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_health() {
        let res = HealthService::check_health();
        assert!(res.ok);
        assert_eq!(res.message, "MediRx is alive");
    }
}
