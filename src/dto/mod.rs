pub mod chat_dto;
pub mod engine_dto;
pub mod payment_dto;
pub mod run_dto;
pub mod voice_dto;
