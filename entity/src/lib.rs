//! Role and permission models shared by the authorization core and the
//! migrations. The table names below are the defaults; resolvers read rows
//! from whatever tables the permissions config names.

pub mod permissions;
pub mod roles;
