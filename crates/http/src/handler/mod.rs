//! The seam between the connection pipeline and request processing.

use std::sync::Arc;

use async_trait::async_trait;

use crate::connection::ResponseWriter;
use crate::protocol::{HttpError, Request};

/// Processes one request by writing its response.
///
/// The handler may read as much of the request body as it likes; the connection drains the
/// rest afterwards. Returning `Ok(())` with the response unwritten is answered with 500, as is
/// an error raised before the response head went out. An error after that aborts the connection.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError>;
}

#[async_trait]
impl<H> Handler for Arc<H>
where
    H: Handler + ?Sized,
{
    async fn call(&self, request: &mut Request<'_>, writer: &mut ResponseWriter<'_>) -> Result<(), HttpError> {
        self.as_ref().call(request, writer).await
    }
}
