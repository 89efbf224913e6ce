// Maintenance module - periodic jobs and when they run.

pub mod maintenance_service;
pub mod schedule;

pub use maintenance_service::MaintenanceService;
