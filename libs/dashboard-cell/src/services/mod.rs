pub mod activity;
pub mod overview;

pub use overview::DashboardService;
