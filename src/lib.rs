/*!
# kbreview
A knowledge base of reviewer-classified variant calls.
Calls are keyed by site and callset, stored through a pluggable `KnowledgeBaseStore`, and served back by region through an interval index.
*/

/// Command line interface functionality
pub mod cli;
/// Knowledge base connection configuration
pub mod config;
/// Contains various shared data types
pub mod data_types;
/// Per-chromosome overlap index over stored calls
pub mod interval_index;
/// Public add/remove/query API
pub mod knowledge_base;
/// Adapter serving calls in the external variant shape
pub mod review_source;
/// Storage backends
pub mod store;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
