pub mod catalog;
pub mod exam;
pub mod hint;
pub mod question;
pub mod submission;
