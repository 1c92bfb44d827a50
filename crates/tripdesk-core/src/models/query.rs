use serde::{Deserialize, Serialize};

/// Pipeline status of a travel enquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    #[default]
    New,
    Contacted,
    Quoted,
    Booked,
    Lost,
    #[serde(other)]
    Unknown,
}

impl QueryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            QueryStatus::New => "New",
            QueryStatus::Contacted => "Contacted",
            QueryStatus::Quoted => "Quoted",
            QueryStatus::Booked => "Booked",
            QueryStatus::Lost => "Lost",
            QueryStatus::Unknown => "-",
        }
    }

    /// Whether the enquiry still needs work from an agent.
    pub fn is_open(&self) -> bool {
        matches!(self, QueryStatus::New | QueryStatus::Contacted | QueryStatus::Quoted)
    }
}

/// A customer enquiry row from `/queries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: i64,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub travellers: Option<u32>,
    #[serde(default)]
    pub travel_date: Option<String>,
    #[serde(default)]
    pub status: QueryStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Query {
    pub fn display_name(&self) -> String {
        self.customer_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Query #{}", self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queries() {
        let json = r#"[
            {"id": 1, "customer_name": "Meera Iyer", "destination": "Bali", "travellers": 2, "status": "quoted"},
            {"id": 2, "status": "on_hold"},
            {"id": 3}
        ]"#;
        let queries: Vec<Query> = serde_json::from_str(json).expect("Failed to parse queries JSON");

        assert_eq!(queries[0].display_name(), "Meera Iyer");
        assert_eq!(queries[0].status, QueryStatus::Quoted);
        assert!(queries[0].status.is_open());
        assert_eq!(queries[1].status, QueryStatus::Unknown);
        assert_eq!(queries[2].status, QueryStatus::New);
        assert_eq!(queries[2].display_name(), "Query #3");
    }

    #[test]
    fn test_closed_statuses() {
        assert!(!QueryStatus::Booked.is_open());
        assert!(!QueryStatus::Lost.is_open());
        assert_eq!(QueryStatus::Booked.label(), "Booked");
    }
}
