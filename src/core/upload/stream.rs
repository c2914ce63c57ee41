//! Incremental JSON summary writer
//!
//! Writes `{"records": [` up front, one element per completed delivery, and
//! the counts tail once every lane has settled:
//!
//! ```text
//! {"records": [{...},{...}],"created":1,"skipped":1,"errors":0,"success":1}
//! ```

use super::summary::{DeliveryOutcome, UploadResult};
use crate::domain::Result;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Serialize)]
struct SummaryTail {
    created: usize,
    skipped: usize,
    errors: usize,
    success: u8,
    #[serde(skip_serializing_if = "is_zero")]
    rejected: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

pub struct SummaryWriter<W> {
    out: W,
    written: usize,
    started: bool,
}

impl<W: AsyncWrite + Unpin + Send> SummaryWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            started: false,
        }
    }

    /// Whether any byte has been written
    pub fn started(&self) -> bool {
        self.started
    }

    pub async fn begin(&mut self) -> Result<()> {
        if !self.started {
            self.out.write_all(b"{\"records\": [").await?;
            self.out.flush().await?;
            self.started = true;
        }
        Ok(())
    }

    pub async fn write_record(&mut self, outcome: &DeliveryOutcome) -> Result<()> {
        self.begin().await?;
        let mut element = Vec::with_capacity(128);
        if self.written > 0 {
            element.push(b',');
        }
        serde_json::to_writer(&mut element, outcome)?;
        self.out.write_all(&element).await?;
        self.out.flush().await?;
        self.written += 1;
        Ok(())
    }

    /// Writes the counts tail and returns the underlying writer
    pub async fn finish(mut self, result: &UploadResult) -> Result<W> {
        self.begin().await?;
        let tail = serde_json::to_string(&SummaryTail {
            created: result.created,
            skipped: result.skipped,
            errors: result.errors,
            success: u8::from(result.success()),
            rejected: result.rejected.len(),
        })?;
        // tail is an object; splice its members after the array
        self.out.write_all(b"],").await?;
        self.out
            .write_all(tail.trim_start_matches('{').as_bytes())
            .await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        Ok(self.out)
    }
}
