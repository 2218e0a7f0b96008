pub mod session_token;
pub mod token_codec;
