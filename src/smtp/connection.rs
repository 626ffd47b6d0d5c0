use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// The byte stream of one accepted connection, exclusively owned by its
/// session.
pub struct Connection<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> {
    stream: Stream,
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send + Sync> Connection<Stream> {
    pub(crate) fn new(stream: Stream) -> Self {
        Self { stream }
    }

    pub(crate) async fn send<S: core::fmt::Display + Send + Sync>(
        &mut self,
        response: &S,
    ) -> anyhow::Result<()> {
        self.stream
            .write_all(format!("{response}\r\n").as_bytes())
            .await?;
        self.stream.flush().await?;

        Ok(())
    }

    pub(crate) async fn receive(&mut self, buf: &mut [u8]) -> anyhow::Result<usize> {
        Ok(self.stream.read(buf).await?)
    }

    /// Flushes and shuts the stream down. Failures are irrelevant at this
    /// point; the peer may already be gone.
    pub(crate) async fn close(&mut self) {
        let _ = self.stream.shutdown().await;
    }
}
