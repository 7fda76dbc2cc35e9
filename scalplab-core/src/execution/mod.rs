//! Execution model: commission and protective-order fill resolution.

pub mod cost_model;
pub mod path_policy;

pub use cost_model::CommissionModel;
pub use path_policy::{protective_exit, IntrabarPolicy, ProtectiveFill};
