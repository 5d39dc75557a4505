pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use memory::MemoryExamStore;
pub use postgres::PgExamStore;
pub use store::{AnswerRecord, ExamStore, RecordedAnswer};
