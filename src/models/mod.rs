pub mod analytics;
pub mod field;
pub mod form;
pub mod notification;
pub mod submission;
