// Models module - Database entity representations

pub mod event;
pub mod registration;
pub mod student;

pub use event::Event;
pub use registration::{EventRegistration, RegistrationWithEvent, RegistrationWithStudent};
pub use student::{Student, StudentId};
