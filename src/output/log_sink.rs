use crate::model::{RunResult, UrlCheckRecord, Verdict};
use crate::output::traits::{ResultSink, SinkResult};

/// Renders every delivered record as a log line
pub struct LogSink {
    website: String,
}

impl LogSink {
    pub fn new(website: impl Into<String>) -> Self {
        Self {
            website: website.into(),
        }
    }
}

impl ResultSink for LogSink {
    fn deliver(&self, record: &UrlCheckRecord) -> SinkResult<()> {
        let tier = record.tier.map(|t| t.as_str()).unwrap_or("none");
        match (record.verdict, &record.error) {
            (Some(Verdict::Unknown), Some(error)) | (None, Some(error)) => tracing::warn!(
                "[{}] #{} {} -> unknown via {} ({})",
                self.website,
                record.position + 1,
                record.url,
                tier,
                error
            ),
            (verdict, _) => tracing::info!(
                "[{}] #{} {} -> {} via {}",
                self.website,
                record.position + 1,
                record.url,
                verdict.unwrap_or(Verdict::Unknown),
                tier
            ),
        }
        Ok(())
    }

    fn finish(&self, result: &RunResult) -> SinkResult<()> {
        tracing::info!(
            "[{}] finished {}: {:.1}% indexed",
            self.website,
            result.status,
            result.indexed_rate()
        );
        Ok(())
    }
}
