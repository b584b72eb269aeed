/*!
# CLI module
Command line interface functionality that is specific to kbreview.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The add and remove CLI subcommands, which share the call description
pub mod call;
/// The query CLI subcommand
pub mod query;
