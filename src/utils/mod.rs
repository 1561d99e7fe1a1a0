pub mod callback_token;
pub mod signature;
