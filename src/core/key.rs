//! Key trait identifying the states of a machine.
//!
//! A machine is agnostic of what its states are named by: any value that
//! can be compared, hashed and cloned cheaply works as a key, from a plain
//! string name to a small integer code or a dedicated enum.

use std::fmt::Debug;
use std::hash::Hash;

/// Trait for values that identify a state within a machine.
///
/// Blanket-implemented for every type with total equality and stable
/// hashing, so callers never implement it by hand.
///
/// # Required Traits
///
/// - `Eq` + `Hash`: Keys index the machine's state table
/// - `Clone`: Keys are handed back by `get_state` and kept as save slots
/// - `Debug`: Keys appear in diagnostic logs
/// - `Send` + `Sync`: Keys are shared with the scheduling task
///
/// # Example
///
/// ```rust
/// use tickstate::core::StateKey;
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug)]
/// enum Phase {
///     Idle,
///     Busy,
/// }
///
/// fn assert_key<K: StateKey>() {}
///
/// assert_key::<Phase>();
/// assert_key::<&'static str>();
/// assert_key::<String>();
/// assert_key::<i32>();
/// ```
pub trait StateKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> StateKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}
