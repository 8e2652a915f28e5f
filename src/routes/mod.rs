pub mod admin;
pub mod chat;
pub mod consultations;
pub mod cycle;
pub mod cycle_stats;
pub mod insights;
pub mod reminders;
pub mod reports;
pub mod symptoms;
pub mod users;
