//! Default command: look up every number in the input file.

use std::path::Path;
use std::sync::Arc;

use console::style;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::icons::{dim_arrow, error, success, warn as warn_icon};
use crate::cli::progress::lookup_progress;
use crate::cli::shutdown::{cancel_on_signal, EXIT_INTERRUPTED};
use didrep::config::Settings;
use didrep::http_client::HttpClient;
use didrep::input::read_numbers;
use didrep::rate_limit::RateLimiter;
use didrep::scrape::{Coordinator, FetchWorker, FieldExtractor, RunContext, RunOutcome};
use didrep::storage::CsvOutput;

pub async fn cmd_scrape(settings: &Settings) -> anyhow::Result<i32> {
    let warnings = settings.validate()?;
    for warning in &warnings {
        warn!("Config warning: {}", warning);
    }

    info!(
        "Starting lookups: {} concurrent, {} req/s, batch size {}, {} retries",
        settings.concurrent_requests,
        settings.requests_per_second,
        settings.batch_size,
        settings.max_retries
    );

    let input = match read_numbers(&settings.input_file) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("{} {}", error(), e);
            return Ok(1);
        }
    };

    let mut ctx = RunContext::new();
    ctx.stats.skipped_invalid = input.rejected as u64;

    if input.numbers.is_empty() {
        warn!("No valid phone numbers to process");
        return Ok(0);
    }

    let extractor = Arc::new(FieldExtractor::new(&settings.selectors)?);
    let client = HttpClient::builder()
        .compression(settings.use_compression)
        .pool_limit(settings.connection_limit)
        .proxies(settings.active_proxies())
        .build()?;
    let limiter = RateLimiter::new(settings.requests_per_second)?;
    let gate = Arc::new(Semaphore::new(settings.concurrent_requests));

    let worker = FetchWorker::new(
        Arc::new(client),
        limiter,
        gate,
        settings.identity_generator(),
        extractor,
        settings.lookup_endpoint()?,
        settings.worker_config(),
    );

    let cancel = CancellationToken::new();
    cancel_on_signal(cancel.clone());

    let coordinator = Coordinator::new(
        worker,
        CsvOutput::new(&settings.output_file),
        settings.coordinator_config(),
        cancel,
    )
    .with_progress(lookup_progress(input.numbers.len() as u64));

    let outcome = coordinator.run(&input.numbers, &mut ctx).await;
    print_summary(&ctx, input.numbers.len(), &settings.output_file, outcome);

    if !ctx.buffer.is_empty() {
        eprintln!(
            "{} {} results could not be written to {}",
            error(),
            ctx.buffer.len(),
            settings.output_file.display()
        );
        return Ok(1);
    }

    Ok(match outcome {
        RunOutcome::Completed => 0,
        RunOutcome::Cancelled => EXIT_INTERRUPTED,
    })
}

fn print_summary(ctx: &RunContext, total: usize, output: &Path, outcome: RunOutcome) {
    let stats = &ctx.stats;
    let throughput = stats.throughput();

    println!();
    match outcome {
        RunOutcome::Completed => println!("{} Run complete", success()),
        RunOutcome::Cancelled => println!("{} Run interrupted", warn_icon()),
    }
    println!(
        "  {} Elapsed: {:.1}s",
        dim_arrow(),
        stats.elapsed().as_secs_f64()
    );
    println!("  {} Processed: {}/{}", dim_arrow(), stats.total, total);
    println!(
        "  {} Successful: {}",
        dim_arrow(),
        style(stats.succeeded).green()
    );
    println!("  {} Not found: {}", dim_arrow(), stats.not_found);
    println!("  {} Failed: {}", dim_arrow(), style(stats.failed).red());
    println!("  {} Rate limited: {}", dim_arrow(), stats.rate_limited);
    println!("  {} Skipped invalid: {}", dim_arrow(), stats.skipped_invalid);
    println!("  {} Success rate: {:.1}%", dim_arrow(), stats.success_rate());
    println!(
        "  {} Throughput: {:.2}/s ({:.1}/min)",
        dim_arrow(),
        throughput,
        throughput * 60.0
    );
    println!("  {} Output: {}", dim_arrow(), output.display());
}
