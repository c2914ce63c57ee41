//! Bearer credential lifecycle during an upload

pub mod refresher;

pub use refresher::CredentialRefresher;
