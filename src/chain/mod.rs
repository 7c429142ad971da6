// src/chain/mod.rs

//! Task chaining.
//!
//! - [`controller`] holds [`TaskChain`], the public submission surface and
//!   the submission algorithm.
//! - [`state`] is the Chain State arena of groups, mutated only under the
//!   controller's lock.
//! - [`unit`] defines scheduled units, their handles and the action wrapper.
//! - [`latch`] is the release-once trigger shared by a cohort's members.

pub mod controller;
pub mod latch;
pub mod state;
pub mod unit;

pub use controller::TaskChain;
pub use latch::Latch;
pub use state::GroupId;
pub use unit::{Action, UnitHandle, UnitId, UnitState};
