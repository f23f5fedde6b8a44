// One module per resource; routing lives in app.rs
pub mod achievements;
pub mod attachments;
pub mod health;
pub mod notifications;
pub mod reports;
