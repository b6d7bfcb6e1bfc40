pub mod claims;
pub mod delivery;
pub mod document;
pub mod event;
pub mod fcm;
pub mod health;
pub mod linking;
pub mod profile;
pub mod response;
pub mod retry;
pub mod status;
