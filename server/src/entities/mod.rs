//! Host-side tables: the authorizable `users` model and its sessions.

pub mod sessions;
pub mod users;
