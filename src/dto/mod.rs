pub mod catalog_dto;
pub mod exam_dto;
