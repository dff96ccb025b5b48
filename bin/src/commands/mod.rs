//! CLI command implementations.

pub(crate) mod export;
pub(crate) mod reset;
pub(crate) mod run;
pub(crate) mod status;
pub(crate) mod worker;
