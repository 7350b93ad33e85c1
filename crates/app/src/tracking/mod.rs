//! Tracking subsystem: the per-session loop plus the shared hand-offs the
//! HTTP layer reads from.

pub(crate) mod annotation;
pub(crate) mod controller;
pub(crate) mod hub;
pub(crate) mod session;
pub(crate) mod slot;
#[cfg(test)]
pub(crate) mod testing;

pub(crate) use controller::{DefaultSessionFactory, SessionController, SessionError};
