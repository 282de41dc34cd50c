//! # Role Policy
//!
//! Static, table-driven permission checks for simulated actor categories.
//!
//! Every skill execution, state read, and state mutation is checked against
//! the role table **outside the generation loop**, so a proposal cannot
//! talk its way past the table. An actor category absent from the table
//! fails closed on every check.

pub mod roles;

pub use roles::{
    default_role_table, PermissionResult, RoleEnforcer, RolePermissions, RoleTable,
};
