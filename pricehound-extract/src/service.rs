use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use pricehound_common::SessionFactory;
use tracing::{error, warn};

use crate::pipeline::{ExtractionPipeline, ExtractionReport};
use crate::recorder::{ResultRecorder, RunOutput};
use crate::{panic_message, PipelineError};

/// The invocation entry point: one ticker in, one [`RunOutput`] out.
pub struct PriceService {
    sessions: Arc<dyn SessionFactory>,
    pipeline: ExtractionPipeline,
    recorder: ResultRecorder,
}

impl PriceService {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        pipeline: ExtractionPipeline,
        recorder: ResultRecorder,
    ) -> Self {
        Self {
            sessions,
            pipeline,
            recorder,
        }
    }

    /// Never returns `Err` and never unwinds into the caller.
    pub async fn run(&self, ticker: &str) -> RunOutput {
        let outcome = AssertUnwindSafe(self.run_detailed(ticker))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Aborted(panic_message(&*panic))));

        match outcome {
            Ok(report) => RunOutput::from(&report),
            Err(err) => {
                error!(ticker, error = %err, "service.run.failed");
                RunOutput::Error(err.to_string())
            }
        }
    }

    /// Open a session, extract, release the session, then record.
    ///
    /// The session is closed on every path once it was opened, including a
    /// panic inside the pipeline or a collaborator. A panicking factory or
    /// extraction surfaces as [`PipelineError::Aborted`].
    pub async fn run_detailed(&self, ticker: &str) -> Result<ExtractionReport, PipelineError> {
        let opened = AssertUnwindSafe(self.sessions.open())
            .catch_unwind()
            .await
            .map_err(|panic| PipelineError::Aborted(panic_message(&*panic)))?;
        let mut session =
            opened.map_err(|e| PipelineError::SessionUnavailable(format!("{e:#}")))?;

        let outcome = AssertUnwindSafe(self.pipeline.extract(ticker, session.as_mut()))
            .catch_unwind()
            .await;

        match AssertUnwindSafe(session.close()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(ticker, error = %err, "service.session.close_failed"),
            Err(panic) => warn!(
                ticker,
                error = %panic_message(&*panic),
                "service.session.close_panicked"
            ),
        }

        let report = outcome.map_err(|panic| PipelineError::Aborted(panic_message(&*panic)))?;
        self.recorder.record(ticker, &report.price).await;
        Ok(report)
    }
}
