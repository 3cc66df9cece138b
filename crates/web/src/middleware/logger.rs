use async_trait::async_trait;
use tracing::info;

use super::{BoxError, Middleware, Next};
use crate::{Request, Response};

/// Logs one line per exchange once the rest of the chain returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

pub fn logger() -> Logger {
    Logger
}

#[async_trait]
impl Middleware for Logger {
    async fn run(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<(), BoxError> {
        let method = req.method().clone();
        let path = req.original_path().to_string();
        let result = next.proceed(req, res).await;

        let elapsed = req.received().elapsed();
        match &result {
            Ok(()) => info!(%method, %path, status = res.status_code().as_u16(), ?elapsed, "request served"),
            Err(e) => info!(%method, %path, status = res.status_code().as_u16(), ?elapsed, cause = %e, "request failed"),
        }
        result
    }
}
