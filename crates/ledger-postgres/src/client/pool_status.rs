use serde::Serialize;

/// Connection pool status snapshot.
///
/// Captured from the pool at a single point in time; used by the saturation
/// pre-check in [`PgClient::get_connection`] and exposed to health endpoints.
///
/// [`PgClient::get_connection`]: crate::PgClient::get_connection
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    /// Maximum number of connections in the pool
    pub max_size: usize,
    /// Current number of connections in the pool
    pub size: usize,
    /// Number of available connections
    pub available: usize,
    /// Number of callers waiting for connections
    pub waiting: usize,
}

impl PoolStatus {
    /// Returns the utilization of the pool (0.0 to 1.0).
    #[inline]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            0.0
        } else {
            (self.size - self.available) as f64 / self.max_size as f64
        }
    }

    /// Returns whether another caller may enter the wait queue.
    ///
    /// The wait queue is bounded by the configured `max_waiting`; once it is
    /// full, acquisitions are refused instead of queued.
    #[inline]
    pub fn has_wait_capacity(&self, max_waiting: usize) -> bool {
        self.waiting < max_waiting
    }

    /// Returns whether the pool is under pressure (high utilization or waiting callers).
    #[inline]
    pub fn is_under_pressure(&self) -> bool {
        self.waiting > 0 || self.utilization() > 0.8
    }
}

impl From<deadpool::Status> for PoolStatus {
    fn from(status: deadpool::Status) -> Self {
        Self {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
            waiting: status.waiting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization_counts_borrowed_connections() {
        let status = PoolStatus {
            max_size: 10,
            size: 8,
            available: 2,
            waiting: 0,
        };

        // (8 - 2) / 10 = 0.6
        assert_eq!(status.utilization(), 0.6);
    }

    #[test]
    fn test_wait_capacity_respects_limit() {
        let status = PoolStatus {
            max_size: 10,
            size: 10,
            available: 0,
            waiting: 5,
        };

        assert!(!status.has_wait_capacity(5));
        assert!(status.has_wait_capacity(6));
    }

    #[test]
    fn test_pressure_detection() {
        let waiting = PoolStatus {
            max_size: 10,
            size: 5,
            available: 3,
            waiting: 2,
        };
        assert!(waiting.is_under_pressure());

        let normal = PoolStatus {
            max_size: 10,
            size: 5,
            available: 5,
            waiting: 0,
        };
        assert!(!normal.is_under_pressure());
    }
}
