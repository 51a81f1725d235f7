use std::sync::Arc;

use crate::services::{organizer_key::OrganizerKey, qr_generator::TokenEncoder};
use crate::store::RecordStore;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub encoder: TokenEncoder,
    pub organizer_key: OrganizerKey,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        encoder: TokenEncoder,
        organizer_key: OrganizerKey,
    ) -> Self {
        Self {
            store,
            encoder,
            organizer_key,
        }
    }
}
