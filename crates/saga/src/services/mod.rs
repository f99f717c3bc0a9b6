//! External collaborator contracts: payment gateway, notification
//! dispatch, and downstream event emission.

pub mod events;
pub mod gateway;
pub mod notify;
