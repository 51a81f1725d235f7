// Services module - Business logic

pub mod attendance;
pub mod check_in;
pub mod organizer_key;
pub mod qr_generator;
pub mod registration;
pub mod token;
pub mod token_reissue;
