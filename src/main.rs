
use log::{LevelFilter, debug, error, info, warn};
use std::time::Instant;

use kbreview::cli::call::{CallSettings, check_call_settings};
use kbreview::cli::core::{Commands, get_cli};
use kbreview::cli::query::{QuerySettings, check_query_settings};
use kbreview::data_types::variant_record::VariantRecord;
use kbreview::knowledge_base::KnowledgeBaseError;
use kbreview::review_source::VariantReviewSource;
use kbreview::writers::variant_table::VariantTableWriter;

/// Sets up logging before we check the other settings
fn init_logging(verbosity: u8) {
    let filter_level: LevelFilter = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();
}

/// Failure of a sub-command. The cause has already been logged, only the exit code is left.
/// Sub-commands return this instead of exiting so the knowledge base handle is dropped, and its store lock released, before the process ends.
type RunResult = Result<(), exitcode::ExitCode>;

/// Shared start of add/remove: checks settings, opens the knowledge base, and builds the record
fn prepare_call(settings: CallSettings, sub_command: &str) -> Result<(VariantReviewSource, VariantRecord), exitcode::ExitCode> {
    init_logging(settings.verbosity);
    let settings = check_call_settings(settings, sub_command)
        .map_err(|e| {
            error!("Error while verifying settings: {e:#}");
            exitcode::CONFIG
        })?;

    let record = settings.to_record()
        .map_err(|e| {
            error!("Error while building call: {e:#}");
            exitcode::DATAERR
        })?;

    info!("Opening knowledge base...");
    let source = VariantReviewSource::new(&settings.config_fn)
        .map_err(|e| {
            error!("Error while opening knowledge base: {e:#}");
            exitcode::IOERR
        })?;
    Ok((source, record))
}

fn run_add(settings: CallSettings) -> RunResult {
    let start_time = Instant::now();
    let (source, record) = prepare_call(settings, "add")?;

    source.knowledge_base().add_call(&record)
        .map_err(|e| {
            error!("Error while adding call: {e:#}");
            exitcode::IOERR
        })?;
    info!("Added call with truth status {}.", record.truth_status());
    info!("Add completed in {} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_remove(settings: CallSettings) -> RunResult {
    let start_time = Instant::now();
    let (source, record) = prepare_call(settings, "remove")?;

    let outcome = source.knowledge_base().remove_call(&record)
        .map_err(|e| {
            error!("Error while removing call: {e:#}");
            exitcode::IOERR
        })?;

    info!("Removed {} documents.", outcome.removed_count());
    if !outcome.is_clean() {
        for (document_id, e) in outcome.errors().iter() {
            error!("Failed to remove document {document_id} ({}): {}", e.kind(), e.message());
        }
        error!("{} documents could not be removed.", outcome.error_count());
        return Err(exitcode::IOERR);
    }
    if outcome.removed_count() == 0 {
        warn!("No matching call was found, nothing was removed.");
    }
    info!("Remove completed in {} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn run_query(settings: QuerySettings) -> RunResult {
    let start_time = Instant::now();
    init_logging(settings.verbosity);
    let settings = check_query_settings(settings)
        .map_err(|e| {
            error!("Error while verifying settings: {e:#}");
            exitcode::CONFIG
        })?;

    info!("Opening knowledge base...");
    let source = VariantReviewSource::new(&settings.config_fn)
        .map_err(|e| {
            error!("Error while opening knowledge base: {e:#}");
            exitcode::IOERR
        })?;

    let mut writer = VariantTableWriter::new(settings.output_fn.as_deref())
        .map_err(|e| {
            error!("Error while opening output table: {e:#}");
            exitcode::IOERR
        })?;

    let knowledge_base = source.knowledge_base();
    let query_error = |e: KnowledgeBaseError| {
        error!("Error while querying knowledge base: {e:#}");
        exitcode::IOERR
    };
    let write_result = if settings.consensus {
        let sites = knowledge_base.consensus_in_interval(&settings.chrom, settings.start, settings.end)
            .map_err(query_error)?;
        sites.iter().try_for_each(|site| writer.write_consensus(site))
    } else {
        let records = knowledge_base.get_variants_in_interval(&settings.chrom, settings.start, settings.end)
            .map_err(query_error)?;
        records.into_iter().try_for_each(|record| writer.write_variant(&record))
    };
    write_result.map_err(|e| {
        error!("Error while writing output table: {e:#}");
        exitcode::IOERR
    })?;

    let row_count = writer.finish()
        .map_err(|e| {
            error!("Error while flushing output table: {e:#}");
            exitcode::IOERR
        })?;
    debug!("Wrote {row_count} rows.");
    info!("Query completed in {} seconds.", start_time.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    let cli = get_cli();
    let result = match cli.command {
        Commands::Add(settings) => run_add(*settings),
        Commands::Remove(settings) => run_remove(*settings),
        Commands::Query(settings) => run_query(*settings)
    };

    // every handle is out of scope by now
    if let Err(code) = result {
        std::process::exit(code);
    }
    info!("Process finished successfully.");
}
