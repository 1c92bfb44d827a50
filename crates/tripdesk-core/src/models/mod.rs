//! Data models for CRM records served through the sync layer.
//!
//! The cache itself stores untyped JSON; these types are for views that want
//! typed access via `ResourceBinding::data_as`.
//!
//! - `Query`: an incoming travel enquiry and its pipeline status
//! - `TravelPackage`: a sellable package with pricing
//! - `Hotel`: a partner property

pub mod catalog;
pub mod query;

pub use catalog::{Hotel, TravelPackage};
pub use query::{Query, QueryStatus};

/// Well-known resource keys exposed by the backend.
pub mod resources {
    pub const QUERIES: &str = "/queries";
    pub const PACKAGES: &str = "/packages";
    pub const HOTELS: &str = "/hotels";
    pub const DESTINATIONS: &str = "/destinations";
    pub const CUSTOMERS: &str = "/customers";

    /// Collections every dashboard page needs; warmed after sign-in.
    pub const DASHBOARD: &[&str] = &[QUERIES, PACKAGES, HOTELS, DESTINATIONS, CUSTOMERS];
}
