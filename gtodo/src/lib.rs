//! gtodo - an offline-first task list over a Git hosting service's issue tracker.
//!
//! Issues are tasks, labels are tags and a repository is a task list. Remote
//! pages are fetched by [`mediator::SyncMediator`] and cached in a local
//! [`storage::Storage`], which the list reads through [`local::LocalPageSource`].

pub mod config;
pub mod controller;
pub mod error;
pub mod local;
pub mod mediator;
pub mod query;
pub mod remote;
pub mod storage;
pub mod types;
