//! Shared domain enumerations.

use serde::{Deserialize, Serialize};

/// Background job namespaces. Each namespace is served by its own worker pool,
/// which is how fan-out traffic gets routed away from the main queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    FanoutMain,
    FanoutBatch,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::FanoutMain => "fanout_main",
            JobType::FanoutBatch => "fanout_batch",
        }
    }
}

impl TryFrom<&str> for JobType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "fanout_main" => Ok(JobType::FanoutMain),
            "fanout_batch" => Ok(JobType::FanoutBatch),
            _ => Err(()),
        }
    }
}

/// Which follow-graph storage layout serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphBackend {
    /// Single `friendships` table, one row per edge.
    Relational,
    /// Denormalized `follower_edges` / `following_edges` tables keyed by user.
    EdgeStore,
}

impl GraphBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphBackend::Relational => "relational",
            GraphBackend::EdgeStore => "edge_store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_names_round_trip() {
        for job_type in [JobType::FanoutMain, JobType::FanoutBatch] {
            assert_eq!(JobType::try_from(job_type.as_str()), Ok(job_type));
        }
        assert!(JobType::try_from("render_post").is_err());
    }
}
