pub mod exam_service;
pub mod grading_service;
pub mod health_service;
pub mod hint_service;
pub mod inference_service;
pub mod question_service;
pub mod scoring;
