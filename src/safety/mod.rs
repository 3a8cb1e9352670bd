//! Safety policies for executing AI-suggested code.

pub mod command_policy;

pub use command_policy::{
    CommandPolicy, CommandPolicyKind, DEFAULT_ALLOWED_COMMANDS, PrefixAllowlist, TokenAllowlist,
    dangerous_env_vars,
};
