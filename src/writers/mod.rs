/*!
# Writers module
Contains the logic for writing query results out of the knowledge base.
*/
/// Generates the TSV/CSV table of calls or consensus sites
pub mod variant_table;
