use serde::{Deserialize, Serialize};

use crate::auth::Identity;

/// Point-in-time view of the dispatcher, served by `GET /api/ws/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub total_connections: usize,
    pub total_topics: usize,
    pub per_topic: Vec<TopicStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicStats {
    pub topic_key: String,
    pub member_count: usize,
    pub members: Vec<Identity>,
}
