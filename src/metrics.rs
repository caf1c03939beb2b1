use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::models::QuoteSource;

/// Install the Prometheus recorder and register all application metrics.
/// With `listen` set, the exporter also serves the scrape endpoint there.
pub fn init_metrics(listen: Option<SocketAddr>) -> anyhow::Result<()> {
    match listen {
        Some(addr) => {
            PrometheusBuilder::new().with_http_listener(addr).install()?;
            tracing::info!(%addr, "Prometheus exporter listening");
        }
        None => {
            PrometheusBuilder::new().install_recorder()?;
        }
    }

    // Pre-register counters so they appear even before the first increment.
    for source in [QuoteSource::Contract, QuoteSource::Fallback] {
        counter!("quotes_total", "source" => source.as_str()).absolute(0);
    }
    counter!("quote_failures_total").absolute(0);
    counter!("history_builds_total").absolute(0);
    counter!("history_synthetic_total").absolute(0);
    counter!("stale_results_discarded_total").absolute(0);
    counter!("trades_submitted_total").absolute(0);
    counter!("trades_confirmed_total").absolute(0);
    counter!("trades_unverified_total").absolute(0);
    counter!("trades_failed_total").absolute(0);

    Ok(())
}
